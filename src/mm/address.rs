//! Physical and Virtual Address Types
//!
//! Type-safe wrappers for memory addresses that prevent mixing
//! physical and virtual addresses at compile time.
//!
//! # Address Space Layout (32-bit user ABI)
//! ```text
//! 0xFFFF_FFFF ┌──────────────────────┐
//!             │ kernel (never user)  │
//! 0xC000_0000 ├──────────────────────┤ ← USER_TOP
//!             │ user stack (1 page)  │
//!             │ ...                  │
//!             │ loadable segments    │
//! 0x0000_1000 ├──────────────────────┤
//!             │ page 0 (never mapped)│
//! 0x0000_0000 └──────────────────────┘
//! ```

use core::fmt;

/// Page size (4 KiB)
pub const PAGE_SIZE: usize = 4096;
/// Page size mask
pub const PAGE_MASK: usize = PAGE_SIZE - 1;
/// Bits to shift for page number
pub const PAGE_SHIFT: usize = 12;

/// Number of entries per page table and per page directory.
pub const ENTRIES_PER_TABLE: usize = 1024;

/// Bits to shift for the page directory index.
pub const DIR_SHIFT: usize = 22;

/// First address that is not user-accessible.
///
/// Everything at or above this address belongs to the kernel.
pub const USER_TOP: usize = 0xC000_0000;

/// A physical memory address.
///
/// Physical frames are reached by the kernel through its direct map, so
/// this is also the address the kernel uses to touch frame contents.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(usize);

impl PhysAddr {
    /// Create a new physical address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Check if the address is page-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr({:#018x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// A virtual memory address as seen by a user process.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct VirtAddr(usize);

impl VirtAddr {
    /// Create a new virtual address.
    #[inline]
    pub const fn new(addr: usize) -> Self {
        Self(addr)
    }

    /// Get the raw address value.
    #[inline]
    pub const fn as_usize(self) -> usize {
        self.0
    }

    /// Get the address as a 32-bit user word.
    ///
    /// Only meaningful for user addresses, which always fit.
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0 as u32
    }

    /// Check if the address is page-aligned.
    #[inline]
    pub const fn is_aligned(self) -> bool {
        self.0 & PAGE_MASK == 0
    }

    /// Align the address down to the nearest page boundary.
    #[inline]
    pub const fn align_down(self) -> Self {
        Self(self.0 & !PAGE_MASK)
    }

    /// Get the page offset (lowest 12 bits).
    #[inline]
    pub const fn page_offset(self) -> usize {
        self.0 & PAGE_MASK
    }

    /// Get the (directory, table) indices for this address.
    #[inline]
    pub const fn table_indices(self) -> (usize, usize) {
        (
            self.0 >> DIR_SHIFT,
            (self.0 >> PAGE_SHIFT) & (ENTRIES_PER_TABLE - 1),
        )
    }

    /// Add an offset, returning `None` on overflow.
    #[inline]
    pub const fn checked_add(self, offset: usize) -> Option<Self> {
        match self.0.checked_add(offset) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Check if this is a user address (below `USER_TOP`).
    #[inline]
    pub const fn is_user(self) -> bool {
        self.0 < USER_TOP
    }

    /// Check if this is a kernel address.
    #[inline]
    pub const fn is_kernel(self) -> bool {
        !self.is_user()
    }
}

impl fmt::Debug for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtAddr({:#010x})", self.0)
    }
}

impl fmt::Display for VirtAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// Round `value` up to the next multiple of the page size.
#[inline]
pub const fn page_round_up(value: usize) -> usize {
    (value + PAGE_MASK) & !PAGE_MASK
}
