//! Page Table Entries
//!
//! Implements the two-level page table used for user address spaces.
//!
//! # Page Table Structure (4KB pages)
//! - Directory: 1024 entries, each covers 4MB
//! - Table: 1024 entries, each covers 4KB
//!
//! # Security Properties
//! - Page flags are strictly typed to prevent invalid combinations
//! - Only user addresses can ever receive user mappings

use core::ops::{Index, IndexMut};

use bitflags::bitflags;

use super::address::{PhysAddr, ENTRIES_PER_TABLE, PAGE_MASK};

bitflags! {
    /// Page table entry flags.
    ///
    /// The layout follows the i386 PTE format so the bits can be handed
    /// to the MMU unchanged.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct PageFlags: usize {
        /// Entry is present.
        const PRESENT = 1 << 0;
        /// Page is writable.
        const WRITABLE = 1 << 1;
        /// Page is accessible from user mode.
        const USER = 1 << 2;
        /// Set by hardware on first access.
        const ACCESSED = 1 << 5;
        /// Set by hardware on first write.
        const DIRTY = 1 << 6;
    }
}

impl PageFlags {
    /// User code and read-only data.
    pub const USER_RO: Self = Self::PRESENT.union(Self::USER);

    /// User data, stack and bss.
    pub const USER_RW: Self = Self::PRESENT.union(Self::USER).union(Self::WRITABLE);

    /// Flags for a user page with the given writability.
    #[inline]
    pub const fn user(writable: bool) -> Self {
        if writable {
            Self::USER_RW
        } else {
            Self::USER_RO
        }
    }
}

/// A single page table entry.
///
/// Holds the physical frame address in the upper bits and
/// [`PageFlags`] in the lower twelve.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct PageTableEntry(usize);

impl PageTableEntry {
    /// Address mask for page table entries.
    const ADDR_MASK: usize = !PAGE_MASK;

    /// Create an invalid (empty) entry.
    #[inline]
    pub const fn invalid() -> Self {
        Self(0)
    }

    /// Create a page entry mapping a physical frame.
    #[inline]
    pub fn page(phys: PhysAddr, flags: PageFlags) -> Self {
        debug_assert!(phys.is_aligned());
        Self((phys.as_usize() & Self::ADDR_MASK) | flags.bits())
    }

    /// Check if the entry is valid (present).
    #[inline]
    pub const fn is_present(self) -> bool {
        self.0 & PageFlags::PRESENT.bits() != 0
    }

    /// Get the physical address from this entry.
    #[inline]
    pub const fn addr(self) -> PhysAddr {
        PhysAddr::new(self.0 & Self::ADDR_MASK)
    }

    /// Get the flags from this entry.
    #[inline]
    pub fn flags(self) -> PageFlags {
        PageFlags::from_bits_truncate(self.0 & PAGE_MASK)
    }

    /// Clear the entry (make invalid).
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl core::fmt::Debug for PageTableEntry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_present() {
            write!(f, "PTE(addr={}, flags={:?})", self.addr(), self.flags())
        } else {
            write!(f, "PTE(invalid)")
        }
    }
}

/// A second-level page table.
///
/// Each page table is 4KB-aligned and contains 1024 entries.
#[repr(C, align(4096))]
pub struct PageTable {
    entries: [PageTableEntry; ENTRIES_PER_TABLE],
}

impl PageTable {
    /// Create a new empty page table (all entries invalid).
    pub const fn new() -> Self {
        const INVALID: PageTableEntry = PageTableEntry::invalid();
        Self {
            entries: [INVALID; ENTRIES_PER_TABLE],
        }
    }

    /// Iterate over all present entries with their indices.
    pub fn iter_present(&self) -> impl Iterator<Item = (usize, &PageTableEntry)> {
        self.entries.iter().enumerate().filter(|(_, e)| e.is_present())
    }

    /// Iterate mutably over all present entries.
    pub fn iter_present_mut(&mut self) -> impl Iterator<Item = &mut PageTableEntry> {
        self.entries.iter_mut().filter(|e| e.is_present())
    }
}

impl Index<usize> for PageTable {
    type Output = PageTableEntry;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.entries[index]
    }
}

impl IndexMut<usize> for PageTable {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.entries[index]
    }
}

impl Default for PageTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Error type for page mapping operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingError {
    /// The virtual address is already mapped.
    AlreadyMapped,
    /// The virtual address is not mapped.
    NotMapped,
    /// No physical frames available.
    OutOfMemory,
    /// The address is not properly aligned.
    MisalignedAddress,
    /// Attempted to map a kernel address or page 0 into user space.
    InvalidPermissions,
}

impl core::fmt::Display for MappingError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::AlreadyMapped => write!(f, "virtual address already mapped"),
            Self::NotMapped => write!(f, "virtual address not mapped"),
            Self::OutOfMemory => write!(f, "out of physical frames"),
            Self::MisalignedAddress => write!(f, "address not properly aligned"),
            Self::InvalidPermissions => write!(f, "invalid permission combination"),
        }
    }
}
