//! Scheduler Interface
//!
//! The thread scheduler, context switch, and power control live outside
//! this crate. The process manager reaches them only through the traits
//! below.

use alloc::boxed::Box;
use core::fmt;

use crate::mm::PhysAddr;
use crate::process::ProcessSlot;
use crate::trap::UserContext;

/// Default priority for threads hosting user processes.
pub const PRI_DEFAULT: u8 = 31;

/// Identifier of a kernel thread.
///
/// A user process is identified by the id of the thread hosting it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[repr(transparent)]
pub struct Tid(pub i32);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Code run by a newly spawned thread.
pub type ThreadEntry = Box<dyn FnOnce() + Send + 'static>;

/// Interrupt enable state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrLevel {
    /// Interrupts enabled.
    On,
    /// Interrupts disabled.
    Off,
}

/// Error returned when a thread cannot be created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// No memory for the thread's control block or kernel stack.
    OutOfMemory,
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory => write!(f, "out of memory for new thread"),
        }
    }
}

/// Preemptive kernel thread scheduler.
pub trait Scheduler: Send + Sync {
    /// Create a thread that runs `entry`. It may run (and finish) before
    /// this returns.
    fn spawn(&self, name: &str, priority: u8, entry: ThreadEntry) -> Result<Tid, SpawnError>;

    /// Id of the running thread.
    fn current(&self) -> Tid;

    /// Put the running thread to sleep until another thread calls
    /// [`unblock`](Self::unblock) on it.
    ///
    /// A wakeup delivered before the thread blocks is not lost: the next
    /// `block` returns at once. Callers re-check their condition after
    /// waking.
    fn block(&self);

    /// Wake thread `tid`, or make its next [`block`](Self::block) return
    /// immediately.
    fn unblock(&self, tid: Tid);

    /// Terminate the running thread.
    fn exit_thread(&self) -> !;

    /// Load a page-table root into the MMU, or the kernel-only root when
    /// `None`.
    fn activate_address_space(&self, root: Option<PhysAddr>);

    /// Hand the running thread over to user mode.
    ///
    /// The thread keeps `slot` as its process pointer and resumes at
    /// `context` exactly as if returning from an interrupt. Traps taken
    /// later from user mode come back through
    /// [`Kernel::syscall`](crate::Kernel::syscall) with the same slot.
    fn enter_user(&self, slot: ProcessSlot, context: UserContext) -> !;

    /// Disable interrupts, returning the previous level.
    fn intr_disable(&self) -> IntrLevel;

    /// Restore a previously saved interrupt level.
    fn intr_set_level(&self, level: IntrLevel);
}

/// Machine power control.
pub trait Shutdown: Send + Sync {
    /// Power off the machine.
    fn power_off(&self) -> !;
}
