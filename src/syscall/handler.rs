//! System Call Handler
//!
//! Implements the individual system calls on behalf of one process.
//!
//! # Security Considerations
//! - Every user pointer is validated against the caller's page tables
//!   before it is read or written
//! - Buffers are copied through kernel memory; the filesystem never sees
//!   a user address
//! - Invalid descriptors and non-UTF-8 paths fail the call; invalid
//!   pointers terminate the caller

use alloc::sync::Arc;
use alloc::vec;
use alloc::vec::Vec;

use super::abi::Syscall;
use super::validate::{self, Access, UserFault};
use crate::fs::{Fd, File};
use crate::kernel::Kernel;
use crate::mm::{AddressSpace, VirtAddr};
use crate::process::Process;

/// What the trap path does after a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Resume the caller with this value in `eax`.
    Return(i32),
    /// Resume the caller without touching `eax`.
    Void,
    /// Terminate the caller with this status.
    Exit(i32),
    /// Power off.
    Halt,
}

impl Outcome {
    fn boolean(value: bool) -> Self {
        Self::Return(value as i32)
    }
}

/// Execute `call` for `process`.
///
/// A `UserFault` means the caller passed something it had no right to
/// and must be killed.
pub fn dispatch(
    kernel: &Arc<Kernel>,
    process: &mut Process,
    call: Syscall,
) -> Result<Outcome, UserFault> {
    #[cfg(feature = "trace-syscalls")]
    log::trace!("[SYSCALL] pid {}: {:?}", process.pid(), call);

    match call {
        Syscall::Halt => Ok(Outcome::Halt),
        Syscall::Exit { status } => Ok(Outcome::Exit(status)),
        Syscall::Exec { cmd_line } => sys_exec(kernel, process, cmd_line),
        Syscall::Wait { pid } => Ok(Outcome::Return(kernel.wait(&process.children, pid))),
        Syscall::Create { path, initial_size } => {
            let Some(path) = user_path(kernel, process, path)? else {
                return Ok(Outcome::boolean(false));
            };
            Ok(Outcome::boolean(
                kernel.with_fs(|fs| fs.create(&path, initial_size)),
            ))
        }
        Syscall::Remove { path } => {
            let Some(path) = user_path(kernel, process, path)? else {
                return Ok(Outcome::boolean(false));
            };
            Ok(Outcome::boolean(kernel.with_fs(|fs| fs.remove(&path))))
        }
        Syscall::Open { path } => sys_open(kernel, process, path),
        Syscall::Filesize { fd } => Ok(Outcome::Return(
            with_file(kernel, process, fd, |file| file.length() as i32).unwrap_or(-1),
        )),
        Syscall::Read { fd, buffer, size } => sys_read(kernel, process, fd, buffer, size),
        Syscall::Write { fd, buffer, size } => sys_write(kernel, process, fd, buffer, size),
        Syscall::Seek { fd, position } => {
            let _ = with_file(kernel, process, fd, |file| file.seek(position));
            Ok(Outcome::Void)
        }
        Syscall::Tell { fd } => Ok(Outcome::Return(
            with_file(kernel, process, fd, |file| file.tell() as i32).unwrap_or(-1),
        )),
        Syscall::Close { fd } => {
            if let Some(file) = Fd::new(fd).and_then(|fd| process.files.remove(fd).ok()) {
                kernel.with_fs(|_| drop(file));
            }
            Ok(Outcome::Void)
        }
        Syscall::Practice { value } => Ok(Outcome::Return(value.wrapping_add(1))),
    }
}

fn space(process: &Process, addr: VirtAddr) -> Result<&AddressSpace, UserFault> {
    process.address_space().ok_or(UserFault::Unmapped(addr))
}

fn space_mut(process: &mut Process, addr: VirtAddr) -> Result<&mut AddressSpace, UserFault> {
    process
        .address_space
        .as_mut()
        .ok_or(UserFault::Unmapped(addr))
}

/// Copy in a NUL-terminated string. `None` if it is not UTF-8.
fn user_string(
    kernel: &Kernel,
    process: &Process,
    addr: VirtAddr,
) -> Result<Option<alloc::string::String>, UserFault> {
    let bytes = validate::copy_in_string(
        space(process, addr)?,
        addr,
        kernel.config().max_user_string,
    )?;
    Ok(alloc::string::String::from_utf8(bytes).ok())
}

fn user_path(
    kernel: &Kernel,
    process: &Process,
    addr: VirtAddr,
) -> Result<Option<alloc::string::String>, UserFault> {
    let path = user_string(kernel, process, addr)?;
    if path.is_none() {
        log::debug!("[SYSCALL] pid {}: path is not UTF-8", process.pid());
    }
    Ok(path)
}

/// Run `f` on an open file under the filesystem lock.
fn with_file<R>(
    kernel: &Kernel,
    process: &mut Process,
    fd: i32,
    f: impl FnOnce(&mut dyn File) -> R,
) -> Option<R> {
    let file = process.files.get_mut(Fd::new(fd)?).ok()?;
    Some(kernel.with_fs(|_| f(file)))
}

fn sys_exec(
    kernel: &Arc<Kernel>,
    process: &mut Process,
    cmd_line: VirtAddr,
) -> Result<Outcome, UserFault> {
    let Some(cmd_line) = user_string(kernel, process, cmd_line)? else {
        return Ok(Outcome::Return(-1));
    };
    let pid = match kernel.execute(&process.children, &cmd_line) {
        Ok(pid) => pid.0,
        Err(e) => {
            log::debug!("[SYSCALL] exec {:?}: {}", cmd_line, e);
            -1
        }
    };
    Ok(Outcome::Return(pid))
}

fn sys_open(kernel: &Kernel, process: &mut Process, path: VirtAddr) -> Result<Outcome, UserFault> {
    let Some(path) = user_path(kernel, process, path)? else {
        return Ok(Outcome::Return(-1));
    };
    let files = &mut process.files;
    let fd = kernel.with_fs(|fs| {
        let file = fs.open(&path)?;
        // A full table hands the file back; dropping it here closes it
        // under the lock.
        files.insert(file).ok()
    });
    Ok(Outcome::Return(fd.map_or(-1, Fd::as_i32)))
}

fn sys_read(
    kernel: &Kernel,
    process: &mut Process,
    fd: i32,
    buffer: VirtAddr,
    size: u32,
) -> Result<Outcome, UserFault> {
    let size = size as usize;
    validate::range_ok(space(process, buffer)?, buffer, size, Access::Write)?;

    let data = match Fd::new(fd) {
        Some(Fd::STDIN) => {
            let console = kernel.console();
            (0..size).map(|_| console.getc()).collect::<Vec<u8>>()
        }
        Some(Fd::STDOUT) | None => return Ok(Outcome::Return(-1)),
        Some(_) => {
            let mut buf = vec![0u8; size];
            let Some(n) = with_file(kernel, process, fd, |file| file.read(&mut buf)) else {
                return Ok(Outcome::Return(-1));
            };
            buf.truncate(n);
            buf
        }
    };

    validate::copy_to_user(space_mut(process, buffer)?, buffer, &data)?;
    Ok(Outcome::Return(data.len() as i32))
}

fn sys_write(
    kernel: &Kernel,
    process: &mut Process,
    fd: i32,
    buffer: VirtAddr,
    size: u32,
) -> Result<Outcome, UserFault> {
    let data = validate::copy_from_user(space(process, buffer)?, buffer, size as usize)?;

    let written = match Fd::new(fd) {
        Some(Fd::STDOUT) => {
            kernel.console().putbuf(&data);
            data.len() as i32
        }
        Some(Fd::STDIN) | None => -1,
        Some(_) => with_file(kernel, process, fd, |file| file.write(&data) as i32).unwrap_or(-1),
    };
    Ok(Outcome::Return(written))
}
