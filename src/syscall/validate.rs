//! User Memory Validation
//!
//! Every pointer a process hands to the kernel is checked against that
//! process's own page tables before the kernel touches the memory behind it.
//!
//! # Security Principles
//! - Validate ALL inputs before use
//! - Fail-secure: deny by default
//! - Prevent common vulnerabilities:
//!   - Kernel memory disclosure (addresses at or above `USER_TOP` rejected)
//!   - Null pointer dereference (explicit checks)
//!   - Wrap-around (range ends computed with checked arithmetic)
//!   - TOCTOU races (data is copied into kernel buffers, never borrowed)
//!
//! A failed check is a [`UserFault`]. The dispatcher answers every fault by
//! terminating the offending process with status -1.

use alloc::vec::Vec;
use core::fmt;

use crate::mm::{AddressSpace, PageFlags, VirtAddr, PAGE_SIZE};

/// Kind of access the kernel is about to perform on user memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// The kernel reads from the buffer.
    Read,
    /// The kernel writes into the buffer.
    Write,
}

/// A user-supplied value the kernel refused to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFault {
    /// Pointer was null.
    NullPointer,
    /// Pointer at or above the user/kernel boundary.
    KernelAddress(VirtAddr),
    /// No page mapped at this address.
    Unmapped(VirtAddr),
    /// Write access to a read-only page.
    ReadOnly(VirtAddr),
    /// System call number outside the table.
    UnknownSyscall(u32),
    /// String had no terminator within the length limit.
    StringTooLong,
}

impl fmt::Display for UserFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NullPointer => write!(f, "null pointer"),
            Self::KernelAddress(va) => write!(f, "kernel address {}", va),
            Self::Unmapped(va) => write!(f, "unmapped address {}", va),
            Self::ReadOnly(va) => write!(f, "write to read-only page at {}", va),
            Self::UnknownSyscall(nr) => write!(f, "unknown system call {}", nr),
            Self::StringTooLong => write!(f, "unterminated string"),
        }
    }
}

/// Check a single user address.
pub fn pointer_ok(space: &AddressSpace, addr: VirtAddr, access: Access) -> Result<(), UserFault> {
    if addr.as_usize() == 0 {
        return Err(UserFault::NullPointer);
    }
    if addr.is_kernel() {
        return Err(UserFault::KernelAddress(addr));
    }
    let page = space.translate(addr).ok_or(UserFault::Unmapped(addr))?;
    if access == Access::Write && !page.flags.contains(PageFlags::WRITABLE) {
        return Err(UserFault::ReadOnly(addr));
    }
    Ok(())
}

/// Check every byte of `[addr, addr + len)`.
///
/// A zero-length range is always valid, whatever `addr` is.
pub fn range_ok(
    space: &AddressSpace,
    addr: VirtAddr,
    len: usize,
    access: Access,
) -> Result<(), UserFault> {
    if len == 0 {
        return Ok(());
    }
    let last = addr
        .checked_add(len - 1)
        .ok_or(UserFault::KernelAddress(addr))?;
    if last.is_kernel() {
        return Err(UserFault::KernelAddress(last));
    }

    // One check per page; the first uses `addr` itself so a null start is
    // reported as such.
    pointer_ok(space, addr, access)?;
    let mut page = addr.align_down().as_usize() + PAGE_SIZE;
    while page <= last.as_usize() {
        pointer_ok(space, VirtAddr::new(page), access)?;
        page += PAGE_SIZE;
    }
    Ok(())
}

/// Read a 32-bit little-endian word from user memory.
pub fn read_u32(space: &AddressSpace, addr: VirtAddr) -> Result<u32, UserFault> {
    let mut word = [0u8; 4];
    range_ok(space, addr, word.len(), Access::Read)?;
    space
        .read_bytes(addr, &mut word)
        .map_err(|_| UserFault::Unmapped(addr))?;
    Ok(u32::from_le_bytes(word))
}

/// Copy `len` bytes out of user memory into a kernel buffer.
pub fn copy_from_user(
    space: &AddressSpace,
    addr: VirtAddr,
    len: usize,
) -> Result<Vec<u8>, UserFault> {
    range_ok(space, addr, len, Access::Read)?;
    let mut buf = alloc::vec![0u8; len];
    if len > 0 {
        space
            .read_bytes(addr, &mut buf)
            .map_err(|_| UserFault::Unmapped(addr))?;
    }
    Ok(buf)
}

/// Copy a kernel buffer into writable user memory.
pub fn copy_to_user(space: &mut AddressSpace, addr: VirtAddr, data: &[u8]) -> Result<(), UserFault> {
    range_ok(space, addr, data.len(), Access::Write)?;
    if !data.is_empty() {
        space
            .write_bytes(addr, data)
            .map_err(|_| UserFault::Unmapped(addr))?;
    }
    Ok(())
}

/// Copy a NUL-terminated string out of user memory.
///
/// Every byte is validated before it is read, so a string running off the
/// end of its mapping faults instead of reading past it. `max_len` bounds
/// the string including its terminator. The terminator is not returned.
pub fn copy_in_string(
    space: &AddressSpace,
    addr: VirtAddr,
    max_len: usize,
) -> Result<Vec<u8>, UserFault> {
    let mut out = Vec::new();
    for i in 0..max_len {
        let va = addr.checked_add(i).ok_or(UserFault::KernelAddress(addr))?;
        pointer_ok(space, va, Access::Read)?;
        let mut byte = [0u8; 1];
        space
            .read_bytes(va, &mut byte)
            .map_err(|_| UserFault::Unmapped(va))?;
        if byte[0] == 0 {
            return Ok(out);
        }
        out.push(byte[0]);
    }
    Err(UserFault::StringTooLong)
}
