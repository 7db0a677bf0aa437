//! Process Manager Context
//!
//! [`Kernel`] ties the collaborating subsystems together and is the entry
//! point for everything the trap path delivers: system calls and user
//! page faults.
//!
//! # Locking
//! - The filesystem sits behind a sleeping lock that serializes every
//!   filesystem and file operation
//! - Each process's child registry has its own lock
//! - No lock is held while a thread blocks on a one-shot
//! - Frames are never freed with interrupts off: the frame pool's spinlock
//!   may be held by a preempted thread

use alloc::sync::Arc;

use crate::drivers::Console;
use crate::fs::FileSystem;
use crate::mm::{FrameAllocator, VirtAddr, PAGE_SIZE};
use crate::process::ProcessSlot;
use crate::sched::{Scheduler, Shutdown, PRI_DEFAULT};
use crate::sync::SleepLock;
use crate::syscall::{self, Outcome, Syscall};
use crate::trap::{FaultInfo, FaultMode, TrapFrame};

/// Tunable limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    /// Size of each process's descriptor table, console slots included.
    pub max_open_files: usize,
    /// Most arguments a command line may have, program name included.
    pub max_args: usize,
    /// Longest string accepted from user space, terminator included.
    pub max_user_string: usize,
    /// Priority of process threads.
    pub default_priority: u8,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            max_args: 128,
            max_user_string: PAGE_SIZE,
            default_priority: PRI_DEFAULT,
        }
    }
}

/// Services the process manager runs on.
#[derive(Clone)]
pub struct Platform {
    /// Root filesystem.
    pub fs: Arc<dyn FileSystem>,
    /// Thread scheduler.
    pub scheduler: Arc<dyn Scheduler>,
    /// Keyboard and display.
    pub console: Arc<dyn Console>,
    /// Source of user page frames.
    pub frames: Arc<dyn FrameAllocator>,
    /// Power control for `halt`.
    pub power: Arc<dyn Shutdown>,
}

/// The user-process manager.
pub struct Kernel {
    fs: SleepLock<Arc<dyn FileSystem>>,
    scheduler: Arc<dyn Scheduler>,
    console: Arc<dyn Console>,
    frames: Arc<dyn FrameAllocator>,
    power: Arc<dyn Shutdown>,
    config: KernelConfig,
}

impl Kernel {
    /// Create the process manager.
    pub fn new(platform: Platform, config: KernelConfig) -> Arc<Self> {
        log::info!(
            "[PROCESS] manager up: {} fds/process, {} args max",
            config.max_open_files,
            config.max_args
        );
        Arc::new(Self {
            fs: SleepLock::new(platform.fs, Arc::clone(&platform.scheduler)),
            scheduler: platform.scheduler,
            console: platform.console,
            frames: platform.frames,
            power: platform.power,
            config,
        })
    }

    /// Active limits.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// The thread scheduler.
    pub fn scheduler(&self) -> &dyn Scheduler {
        &*self.scheduler
    }

    /// A shared handle to the thread scheduler.
    pub fn shared_scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.scheduler)
    }

    /// The console.
    pub fn console(&self) -> &dyn Console {
        &*self.console
    }

    /// The user frame allocator.
    pub fn frames(&self) -> Arc<dyn FrameAllocator> {
        Arc::clone(&self.frames)
    }

    /// Run `f` with exclusive access to the filesystem.
    ///
    /// Contending threads sleep until the lock is free. Not reentrant:
    /// `f` must not call `with_fs` again.
    pub fn with_fs<R>(&self, f: impl FnOnce(&dyn FileSystem) -> R) -> R {
        let fs = self.fs.lock();
        f(&**fs)
    }

    /// Handle a system call trap from the process in `slot`.
    ///
    /// Returns with the result in `frame.eax`, or not at all if the call
    /// ends the process or the machine.
    pub fn syscall(self: &Arc<Self>, slot: &mut ProcessSlot, frame: &mut TrapFrame) {
        let Some(process) = slot.get_mut() else {
            log::error!("[SYSCALL] trap from a thread with no process");
            return;
        };

        let esp = VirtAddr::new(frame.esp as usize);
        let call = process
            .address_space()
            .ok_or(syscall::UserFault::Unmapped(esp))
            .and_then(|space| Syscall::decode(space, esp));
        let result = call.and_then(|call| syscall::dispatch(self, process, call));

        match result {
            Ok(Outcome::Return(value)) => frame.eax = value as u32,
            Ok(Outcome::Void) => {}
            Ok(Outcome::Exit(status)) => self.exit_process(slot, status),
            Ok(Outcome::Halt) => {
                log::info!("[SYSCALL] halt");
                self.power.power_off()
            }
            Err(fault) => {
                log::debug!("[SYSCALL] killing process: {}", fault);
                self.exit_process(slot, -1)
            }
        }
    }

    /// Handle a page fault.
    ///
    /// A fault raised by user code kills the process with status -1. The
    /// kernel never faults on user memory it has validated, so a kernel-mode
    /// fault is a bug.
    pub fn user_fault(&self, slot: &mut ProcessSlot, info: FaultInfo) -> ! {
        match info.mode {
            FaultMode::User => {
                log::debug!(
                    "[PROCESS] page fault at {} ({} {} page)",
                    info.address,
                    if info.write { "writing" } else { "reading" },
                    if info.present { "protected" } else { "unmapped" }
                );
                self.exit_process(slot, -1)
            }
            FaultMode::Kernel => panic!("kernel page fault at {}", info.address),
        }
    }
}

impl core::fmt::Debug for Kernel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Kernel")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
