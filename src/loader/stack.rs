//! Initial User Stack
//!
//! Lays out `argc`/`argv` on a single page just below `USER_TOP` using
//! the 32-bit C calling convention:
//!
//! ```text
//!   USER_TOP ─▶ ┌───────────────────────┐
//!               │ argv[n-1] .. argv[0]  │  NUL-terminated strings
//!               │ padding to 4 bytes    │
//!               │ NULL                  │  argv[argc]
//!               │ &argv[n-1] .. &argv[0]│
//!               │ argv                  │  points at &argv[0]
//!               │ argc                  │
//!        esp ─▶ │ 0                     │  fake return address
//!               └───────────────────────┘
//! ```
//!
//! The page is filled before it is mapped, so a failed build leaves the
//! address space untouched.

use alloc::vec::Vec;

use super::LoadError;
use crate::mm::{AddressSpace, VirtAddr, PAGE_SIZE, USER_TOP};

/// Size of a user pointer or `int`.
const WORD: usize = 4;

/// Writes downward into one stack page.
struct StackWriter<'a> {
    page: &'a mut [u8],
    /// Current stack pointer as an offset into `page`.
    sp: usize,
}

impl StackWriter<'_> {
    /// User address of the page's first byte.
    const BASE: usize = USER_TOP - PAGE_SIZE;

    fn user_addr(&self) -> u32 {
        (Self::BASE + self.sp) as u32
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<u32, LoadError> {
        self.sp = self
            .sp
            .checked_sub(bytes.len())
            .ok_or(LoadError::StackOverflow)?;
        self.page[self.sp..self.sp + bytes.len()].copy_from_slice(bytes);
        Ok(self.user_addr())
    }

    fn push_word(&mut self, value: u32) -> Result<u32, LoadError> {
        self.push_bytes(&value.to_le_bytes())
    }

    fn align_down(&mut self) {
        self.sp &= !(WORD - 1);
    }
}

/// Map the stack page into `space` and push `argv` onto it.
///
/// Returns the initial stack pointer, which addresses the fake return
/// address.
pub fn build(space: &mut AddressSpace, argv: &[&str]) -> Result<VirtAddr, LoadError> {
    let mut frame = space.allocate_frame()?;

    let mut writer = StackWriter {
        page: frame.as_bytes_mut(),
        sp: PAGE_SIZE,
    };
    let esp = match push_arguments(&mut writer, argv) {
        Ok(esp) => esp,
        Err(e) => {
            space.free_frame(frame);
            return Err(e);
        }
    };

    space.map(VirtAddr::new(StackWriter::BASE), frame, true)?;
    Ok(VirtAddr::new(esp as usize))
}

fn push_arguments(writer: &mut StackWriter<'_>, argv: &[&str]) -> Result<u32, LoadError> {
    // Strings go in last-to-first so argv[0] ends up lowest.
    let mut addresses = Vec::with_capacity(argv.len());
    for arg in argv.iter().rev() {
        writer.push_bytes(&[0])?;
        addresses.push(writer.push_bytes(arg.as_bytes())?);
    }
    addresses.reverse();

    writer.align_down();
    writer.push_word(0)?;
    for &addr in addresses.iter().rev() {
        writer.push_word(addr)?;
    }
    let argv_ptr = writer.user_addr();
    writer.push_word(argv_ptr)?;
    writer.push_word(argv.len() as u32)?;
    writer.push_word(0)
}
