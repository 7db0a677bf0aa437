//! Child Registry
//!
//! Each process keeps one record per child it started and has not yet
//! waited for. A record holds the receiving half of the child's exit
//! signal; the child holds the sending half in its own PCB.
//!
//! Records are created before the child loads and removed when the load
//! fails, at the first wait, or when the parent exits. So a record past
//! `execute` always belongs to a loaded child, and a second wait on the
//! same pid finds no record. A child that outlives its parent publishes
//! its status to nobody.

use alloc::collections::BTreeMap;
use core::fmt;

use spin::Mutex;

use super::Pid;
use crate::sync::oneshot::Receiver;

/// Reasons a wait returns without a status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// Not a child of the caller, or already waited for.
    NotChild,
}

impl fmt::Display for WaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotChild => write!(f, "not a child of this process"),
        }
    }
}

/// The children of one process.
pub struct Children {
    records: Mutex<BTreeMap<Pid, Receiver<i32>>>,
}

impl Children {
    /// An empty registry.
    pub const fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
        }
    }

    /// Track a newly spawned child.
    pub(crate) fn register(&self, pid: Pid, exit: Receiver<i32>) {
        self.records.lock().insert(pid, exit);
    }

    /// Forget a child.
    pub(crate) fn remove(&self, pid: Pid) {
        self.records.lock().remove(&pid);
    }

    /// Whether `pid` is a child that has not been waited for.
    pub fn contains(&self, pid: Pid) -> bool {
        self.records.lock().contains_key(&pid)
    }

    /// Number of tracked children.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Whether no children are tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait for child `pid` to exit and return its status.
    ///
    /// The record is taken out before blocking, so the registry lock is not
    /// held while asleep and a repeated wait fails at once. A child that
    /// vanished without publishing a status reports -1.
    pub fn wait(&self, pid: Pid) -> Result<i32, WaitError> {
        let exit = self.records.lock().remove(&pid).ok_or(WaitError::NotChild)?;
        Ok(exit.recv().unwrap_or(-1))
    }

    /// Drop every record.
    pub fn clear(&self) {
        let orphans = core::mem::take(&mut *self.records.lock());
        if !orphans.is_empty() {
            log::trace!("[PROCESS] discarding {} child records", orphans.len());
        }
    }
}

impl Default for Children {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Children {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.records.lock().keys()).finish()
    }
}
