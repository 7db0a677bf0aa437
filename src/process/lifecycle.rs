//! Process Lifecycle
//!
//! Starting, waiting for, and tearing down user processes.
//!
//! # Exec Handshake
//! ```text
//!   parent                               child thread
//!   execute() ── spawn ───────────────▶  start_process()
//!      │                                   load image
//!      ◀────────── load signal (bool) ─────┤
//!   return pid / error                     enter user mode
//!      ...                                 ...
//!   wait() ◀────── exit signal (i32) ───── exit_process()
//! ```
//!
//! # Teardown Order
//! The address space is detached and the kernel-only space activated
//! before the old page tables are freed, and the PCB is detached from the
//! thread before it is freed. Detaching happens with interrupts off so a
//! timer interrupt never switches to a half-destroyed process; freeing
//! happens after they are back on.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use super::{truncate, Children, Pid, Process, ProcessSlot, ProcessState};
use crate::console_println;
use crate::kernel::Kernel;
use crate::loader::{self, LoadedImage};
use crate::mm::PAGE_SIZE;
use crate::sched::SpawnError;
use crate::sync::oneshot::{self, Sender};
use crate::sync::InterruptsOff;
use crate::trap::UserContext;

/// Reasons a program could not be started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// The command line has no program name.
    EmptyCommand,
    /// No thread could be created.
    Spawn(SpawnError),
    /// The child failed to load its image.
    LoadFailed,
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyCommand => write!(f, "empty command line"),
            Self::Spawn(e) => write!(f, "spawn failed: {}", e),
            Self::LoadFailed => write!(f, "load failed"),
        }
    }
}

/// The child's ends of the exec and exit handshakes.
struct ParentLink {
    loaded: Sender<bool>,
    exit: Sender<i32>,
}

/// Split a command line on spaces, collapsing runs. Words past
/// `max_args` are dropped.
fn tokenize(cmd_line: &str, max_args: usize) -> Vec<&str> {
    cmd_line
        .split(' ')
        .filter(|s| !s.is_empty())
        .take(max_args)
        .collect()
}

impl Kernel {
    /// Start `cmd_line` as a child tracked in `children`.
    ///
    /// Blocks until the child has finished loading. Returns the child's
    /// pid, or an error if it could not be started; a child that failed
    /// to load is not left in `children`.
    pub fn execute(self: &Arc<Self>, children: &Children, cmd_line: &str) -> Result<Pid, ExecError> {
        let cmd_line = truncate(cmd_line, PAGE_SIZE - 1);
        let name = cmd_line
            .split(' ')
            .find(|s| !s.is_empty())
            .ok_or(ExecError::EmptyCommand)?;

        let (loaded_tx, loaded_rx) = oneshot::channel(self.shared_scheduler());
        let (exit_tx, exit_rx) = oneshot::channel(self.shared_scheduler());
        let link = ParentLink {
            loaded: loaded_tx,
            exit: exit_tx,
        };

        let kernel = Arc::clone(self);
        let command = String::from(cmd_line);
        let pid = self
            .scheduler()
            .spawn(
                truncate(name, super::NAME_MAX),
                self.config().default_priority,
                Box::new(move || {
                    kernel.start_process(command, link);
                }),
            )
            .map_err(ExecError::Spawn)?;

        children.register(pid, exit_rx);
        match loaded_rx.recv() {
            Some(true) => {
                log::debug!("[PROCESS] started {} as pid {}", name, pid);
                Ok(pid)
            }
            _ => {
                children.remove(pid);
                Err(ExecError::LoadFailed)
            }
        }
    }

    /// Body of a freshly spawned process thread.
    fn start_process(self: Arc<Self>, command: String, link: ParentLink) -> ! {
        let ParentLink { loaded, exit } = link;
        let pid = self.scheduler().current();

        let (mut slot, result) = {
            let argv = tokenize(&command, self.config().max_args);
            let name = command.split(' ').find(|s| !s.is_empty()).unwrap_or("");

            let mut process = Box::new(Process::new(pid, name, self.config().max_open_files));
            process.exit_signal = Some(exit);
            let slot = ProcessSlot::new(process);

            let frames = self.frames();
            let result = self.with_fs(|fs| loader::load(fs, frames, &argv));
            if let Err(e) = &result {
                if let Some(msg) = e.diagnostic() {
                    console_println!(self.console(), "load: {}: {}", name, msg);
                }
            }
            (slot, result)
        };
        drop(command);

        match result {
            Ok(image) => {
                let context = self.install(&mut slot, image);
                let _ = loaded.send(true);
                self.scheduler().enter_user(slot, context)
            }
            Err(_) => {
                let _ = loaded.send(false);
                self.exit_process(&mut slot, -1)
            }
        }
    }

    /// Attach a loaded image to the process in `slot` and activate it.
    fn install(&self, slot: &mut ProcessSlot, image: LoadedImage) -> UserContext {
        let LoadedImage {
            address_space,
            entry,
            stack_pointer,
            executable,
        } = image;

        if let Some(process) = slot.get_mut() {
            process.executable = Some(executable);
            {
                let _intr = InterruptsOff::new(self.scheduler());
                process.address_space = Some(address_space);
            }
            process.state = ProcessState::Running;
        }
        self.activate(slot);
        UserContext::new(entry, stack_pointer)
    }

    /// Wait for child `pid` of the process owning `children`.
    ///
    /// Returns the child's exit status, or -1 if `pid` is not a child or
    /// has already been waited for.
    pub fn wait(&self, children: &Children, pid: Pid) -> i32 {
        children.wait(pid).unwrap_or_else(|e| {
            log::debug!("[PROCESS] wait({}): {}", pid, e);
            -1
        })
    }

    /// Terminate the process hosted by the current thread.
    ///
    /// Publishes `status` to the parent, releases every resource the
    /// process holds, and exits the thread.
    pub fn exit_process(&self, slot: &mut ProcessSlot, status: i32) -> ! {
        if let Some(process) = slot.get_mut() {
            process.exit_status = Some(status);
            if process.state == ProcessState::Running {
                console_println!(self.console(), "{}: exit({})", process.name(), status);
            }
            process.state = ProcessState::Exiting;
            log::debug!("[PROCESS] pid {} exiting with {}", process.pid(), status);

            if let Some(signal) = process.exit_signal.take() {
                let _ = signal.send(status);
            }

            let executable = process.executable.take();
            let files: Vec<_> = process.files.drain().collect();
            self.with_fs(|_| {
                if let Some(mut executable) = executable {
                    executable.allow_write();
                }
                drop(files);
            });

            process.children.clear();

            let space = {
                let _intr = InterruptsOff::new(self.scheduler());
                let space = process.address_space.take();
                self.scheduler().activate_address_space(None);
                space
            };
            // Freeing takes the frame pool lock, so interrupts must be on.
            drop(space);
        }

        let pcb = {
            let _intr = InterruptsOff::new(self.scheduler());
            slot.take()
        };
        drop(pcb);
        self.scheduler().exit_thread()
    }

    /// Switch the MMU to the address space of the process in `slot`.
    ///
    /// Called on every switch to a thread. Threads without a process, or
    /// whose process has no address space, run on the kernel-only tables.
    pub fn activate(&self, slot: &ProcessSlot) {
        let root = slot
            .get()
            .and_then(Process::address_space)
            .map(|space| space.root());
        self.scheduler().activate_address_space(root);
    }

    /// Run `cmd_line` as the initial process and wait for it.
    ///
    /// Called from a kernel thread without a process of its own.
    pub fn run(self: &Arc<Self>, cmd_line: &str) -> Result<i32, ExecError> {
        let children = Children::new();
        let pid = self.execute(&children, cmd_line)?;
        Ok(self.wait(&children, pid))
    }
}
