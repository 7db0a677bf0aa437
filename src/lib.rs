//! PantherOS User Programs
//!
//! The user-process core of the kernel: loading ELF executables into
//! isolated address spaces, running them as processes, and serving their
//! system calls.
//!
//! # Security Features
//! - Memory safety via Rust's ownership model
//! - Every user pointer validated against the caller's own page tables
//! - Zeroed frames for every user page
//! - Executables write-protected while they run
//! - A misbehaving process can only kill itself
//!
//! # Architecture
//! - Target: 32-bit x86 user ABI (`int 0x30` system calls)
//! - Threads, trap entry, the filesystem and the console are supplied by
//!   the embedding kernel through the traits in [`sched`], [`fs`] and
//!   [`drivers`]
//! - Entry points: [`Kernel::run`] at boot, [`Kernel::syscall`] and
//!   [`Kernel::user_fault`] from the trap path, [`Kernel::activate`] on
//!   every thread switch

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

extern crate alloc;

pub mod drivers;
pub mod fs;
pub mod kernel;
pub mod loader;
pub mod mm;
pub mod process;
pub mod sched;
pub mod sync;
pub mod syscall;
pub mod trap;

#[cfg(test)]
mod testing;

pub use kernel::{Kernel, KernelConfig, Platform};
pub use process::{ExecError, Pid, Process, ProcessSlot};
