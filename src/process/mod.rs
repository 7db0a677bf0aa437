//! User Processes
//!
//! A process is a user address space plus the kernel-side bookkeeping
//! that goes with it, hosted by exactly one kernel thread.
//!
//! # Ownership
//! - The hosting thread owns its [`Process`] through a [`ProcessSlot`]
//! - A process owns its address space, open files, executable handle and
//!   the registry of its children
//! - Only the hosting thread destroys its process, in
//!   [`Kernel::exit_process`](crate::Kernel::exit_process)
//!
//! # Lifecycle
//! ```text
//!   Loading ──load ok──▶ Running ──exit──▶ Exiting
//!      │                                     ▲
//!      └──────────────load failed────────────┘
//! ```

pub mod children;
pub mod lifecycle;

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt;

use crate::fs::{FdTable, File};
use crate::mm::AddressSpace;
use crate::sched::Tid;
use crate::sync::oneshot::Sender;

pub use children::{Children, WaitError};
pub use lifecycle::ExecError;

/// Process identifier: the id of the hosting thread.
pub type Pid = Tid;

/// Longest process name kept, in bytes.
pub const NAME_MAX: usize = 15;

/// Where a process is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Being loaded; user code has not run.
    Loading,
    /// User code has been entered.
    Running,
    /// Tearing down.
    Exiting,
}

/// Process control block.
pub struct Process {
    pid: Pid,
    name: String,
    pub(crate) state: ProcessState,
    pub(crate) exit_status: Option<i32>,
    pub(crate) address_space: Option<AddressSpace>,
    pub(crate) files: FdTable,
    pub(crate) executable: Option<Box<dyn File>>,
    pub(crate) children: Children,
    pub(crate) exit_signal: Option<Sender<i32>>,
}

impl Process {
    /// A process with no address space yet.
    pub fn new(pid: Pid, name: &str, max_open_files: usize) -> Self {
        Self {
            pid,
            name: String::from(truncate(name, NAME_MAX)),
            state: ProcessState::Loading,
            exit_status: None,
            address_space: None,
            files: FdTable::new(max_open_files),
            executable: None,
            children: Children::new(),
            exit_signal: None,
        }
    }

    /// Process id.
    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Display name, at most [`NAME_MAX`] bytes.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Exit status, once the process has exited.
    pub fn exit_status(&self) -> Option<i32> {
        self.exit_status
    }

    /// The installed address space.
    pub fn address_space(&self) -> Option<&AddressSpace> {
        self.address_space.as_ref()
    }

    /// Children started by this process and not yet waited for.
    pub fn children(&self) -> &Children {
        &self.children
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("exit_status", &self.exit_status)
            .field("address_space", &self.address_space)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

/// A thread's process pointer.
///
/// Empty for pure kernel threads and after the process is destroyed.
#[derive(Debug, Default)]
pub struct ProcessSlot(Option<Box<Process>>);

impl ProcessSlot {
    /// Slot of a kernel thread.
    pub const fn empty() -> Self {
        Self(None)
    }

    /// Slot holding `process`.
    pub fn new(process: Box<Process>) -> Self {
        Self(Some(process))
    }

    /// The hosted process.
    pub fn get(&self) -> Option<&Process> {
        self.0.as_deref()
    }

    /// The hosted process, mutably.
    pub fn get_mut(&mut self) -> Option<&mut Process> {
        self.0.as_deref_mut()
    }

    /// Detach the process from the thread.
    pub fn take(&mut self) -> Option<Box<Process>> {
        self.0.take()
    }

    /// Whether no process is attached.
    pub fn is_empty(&self) -> bool {
        self.0.is_none()
    }
}

/// Longest prefix of `s` that is at most `max` bytes and ends on a char
/// boundary.
pub(crate) fn truncate(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
