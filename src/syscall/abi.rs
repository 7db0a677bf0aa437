//! System Call ABI
//!
//! User code traps with `int 0x30` after pushing the arguments and then
//! the call number. At the trap the user stack looks like:
//!
//! ```text
//!   esp + 12 ─▶ arg 2
//!   esp +  8 ─▶ arg 1
//!   esp +  4 ─▶ arg 0
//!   esp      ─▶ call number
//! ```
//!
//! Each word is validated and copied before it is interpreted; a call
//! only reads as many words as it takes.

use super::validate::{read_u32, UserFault};
use crate::mm::{AddressSpace, VirtAddr};
use crate::sched::Tid;

/// System call numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SyscallNumber {
    /// Power off the machine.
    Halt = 0,
    /// Terminate the calling process.
    Exit = 1,
    /// Start a child process.
    Exec = 2,
    /// Wait for a child process.
    Wait = 3,
    /// Create a file.
    Create = 4,
    /// Delete a file.
    Remove = 5,
    /// Open a file.
    Open = 6,
    /// Size of an open file.
    Filesize = 7,
    /// Read from a descriptor.
    Read = 8,
    /// Write to a descriptor.
    Write = 9,
    /// Move a file position.
    Seek = 10,
    /// Report a file position.
    Tell = 11,
    /// Close a descriptor.
    Close = 12,
    /// Return the argument plus one.
    Practice = 13,
}

impl TryFrom<u32> for SyscallNumber {
    type Error = UserFault;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Halt,
            1 => Self::Exit,
            2 => Self::Exec,
            3 => Self::Wait,
            4 => Self::Create,
            5 => Self::Remove,
            6 => Self::Open,
            7 => Self::Filesize,
            8 => Self::Read,
            9 => Self::Write,
            10 => Self::Seek,
            11 => Self::Tell,
            12 => Self::Close,
            13 => Self::Practice,
            _ => return Err(UserFault::UnknownSyscall(value)),
        })
    }
}

/// A decoded system call with its arguments.
///
/// Pointer arguments are still unvalidated user addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Halt,
    Exit { status: i32 },
    Exec { cmd_line: VirtAddr },
    Wait { pid: Tid },
    Create { path: VirtAddr, initial_size: u32 },
    Remove { path: VirtAddr },
    Open { path: VirtAddr },
    Filesize { fd: i32 },
    Read { fd: i32, buffer: VirtAddr, size: u32 },
    Write { fd: i32, buffer: VirtAddr, size: u32 },
    Seek { fd: i32, position: u32 },
    Tell { fd: i32 },
    Close { fd: i32 },
    Practice { value: i32 },
}

/// Reads call words off a user stack.
struct SyscallArgs<'a> {
    space: &'a AddressSpace,
    esp: VirtAddr,
}

impl SyscallArgs<'_> {
    fn word(&self, index: usize) -> Result<u32, UserFault> {
        let addr = self
            .esp
            .checked_add(index * 4)
            .ok_or(UserFault::KernelAddress(self.esp))?;
        read_u32(self.space, addr)
    }

    fn number(&self) -> Result<SyscallNumber, UserFault> {
        SyscallNumber::try_from(self.word(0)?)
    }

    /// Argument `i`, counting from 0.
    fn arg(&self, i: usize) -> Result<u32, UserFault> {
        self.word(i + 1)
    }

    fn int(&self, i: usize) -> Result<i32, UserFault> {
        Ok(self.arg(i)? as i32)
    }

    fn ptr(&self, i: usize) -> Result<VirtAddr, UserFault> {
        Ok(VirtAddr::new(self.arg(i)? as usize))
    }
}

impl Syscall {
    /// Decode the call at user stack pointer `esp`.
    pub fn decode(space: &AddressSpace, esp: VirtAddr) -> Result<Self, UserFault> {
        let args = SyscallArgs { space, esp };
        Ok(match args.number()? {
            SyscallNumber::Halt => Self::Halt,
            SyscallNumber::Exit => Self::Exit { status: args.int(0)? },
            SyscallNumber::Exec => Self::Exec {
                cmd_line: args.ptr(0)?,
            },
            SyscallNumber::Wait => Self::Wait {
                pid: Tid(args.int(0)?),
            },
            SyscallNumber::Create => Self::Create {
                path: args.ptr(0)?,
                initial_size: args.arg(1)?,
            },
            SyscallNumber::Remove => Self::Remove { path: args.ptr(0)? },
            SyscallNumber::Open => Self::Open { path: args.ptr(0)? },
            SyscallNumber::Filesize => Self::Filesize { fd: args.int(0)? },
            SyscallNumber::Read => Self::Read {
                fd: args.int(0)?,
                buffer: args.ptr(1)?,
                size: args.arg(2)?,
            },
            SyscallNumber::Write => Self::Write {
                fd: args.int(0)?,
                buffer: args.ptr(1)?,
                size: args.arg(2)?,
            },
            SyscallNumber::Seek => Self::Seek {
                fd: args.int(0)?,
                position: args.arg(1)?,
            },
            SyscallNumber::Tell => Self::Tell { fd: args.int(0)? },
            SyscallNumber::Close => Self::Close { fd: args.int(0)? },
            SyscallNumber::Practice => Self::Practice { value: args.int(0)? },
        })
    }

    /// The call's number.
    pub fn number(&self) -> SyscallNumber {
        match self {
            Self::Halt => SyscallNumber::Halt,
            Self::Exit { .. } => SyscallNumber::Exit,
            Self::Exec { .. } => SyscallNumber::Exec,
            Self::Wait { .. } => SyscallNumber::Wait,
            Self::Create { .. } => SyscallNumber::Create,
            Self::Remove { .. } => SyscallNumber::Remove,
            Self::Open { .. } => SyscallNumber::Open,
            Self::Filesize { .. } => SyscallNumber::Filesize,
            Self::Read { .. } => SyscallNumber::Read,
            Self::Write { .. } => SyscallNumber::Write,
            Self::Seek { .. } => SyscallNumber::Seek,
            Self::Tell { .. } => SyscallNumber::Tell,
            Self::Close { .. } => SyscallNumber::Close,
            Self::Practice { .. } => SyscallNumber::Practice,
        }
    }
}
