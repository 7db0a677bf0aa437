//! File Descriptor Table
//!
//! A per-process table mapping small integers to open file handles.
//!
//! # Design
//! - Fixed number of slots, chosen when the table is created
//! - Descriptors 0 and 1 are the console and never occupy a slot
//! - New handles take the lowest free slot, so numbers are reused after close
//!
//! # Security Properties
//! - Descriptors from user space are untrusted integers; [`Fd::new`] is the
//!   only way to turn one into a table index and rejects anything out of range
//! - A table is owned by exactly one process, so descriptors cannot name
//!   another process's files

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use super::File;

/// A descriptor index into an [`FdTable`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
#[repr(transparent)]
pub struct Fd(u32);

impl Fd {
    /// Keyboard input.
    pub const STDIN: Self = Self(0);

    /// Console output.
    pub const STDOUT: Self = Self(1);

    /// First descriptor handed out for files.
    pub const FIRST_FILE: Self = Self(2);

    /// Interpret a raw descriptor from user space.
    ///
    /// Negative values are never valid descriptors.
    #[inline]
    pub const fn new(raw: i32) -> Option<Self> {
        if raw < 0 {
            None
        } else {
            Some(Self(raw as u32))
        }
    }

    /// The descriptor as returned to user space.
    #[inline]
    pub const fn as_i32(self) -> i32 {
        self.0 as i32
    }

    #[inline]
    const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Fd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Error type for descriptor lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FdError {
    /// The descriptor is out of range or names a console stream.
    InvalidDescriptor,
    /// The slot is empty.
    NotOpen,
    /// No free slot is left.
    TableFull,
}

impl fmt::Display for FdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidDescriptor => write!(f, "invalid file descriptor"),
            Self::NotOpen => write!(f, "file descriptor not open"),
            Self::TableFull => write!(f, "file descriptor table full"),
        }
    }
}

/// Open files of one process.
pub struct FdTable {
    /// Slot `i` holds descriptor `i`. Slots 0 and 1 stay empty.
    slots: Vec<Option<Box<dyn File>>>,
}

impl FdTable {
    /// Create a table able to hold descriptors `0..capacity`.
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    /// Number of open files.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Whether no files are open.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Find the lowest free slot at or after `start_from`.
    fn find_free(&self, start_from: Fd) -> Option<Fd> {
        (start_from.index()..self.slots.len())
            .find(|&i| self.slots[i].is_none())
            .map(|i| Fd(i as u32))
    }

    /// Store `file` in the lowest free slot.
    ///
    /// When the table is full the handle is given back so the caller can
    /// close it under the filesystem lock.
    pub fn insert(&mut self, file: Box<dyn File>) -> Result<Fd, Box<dyn File>> {
        match self.find_free(Fd::FIRST_FILE) {
            Some(fd) => {
                self.slots[fd.index()] = Some(file);
                Ok(fd)
            }
            None => Err(file),
        }
    }

    /// Look up an open file.
    pub fn get_mut(&mut self, fd: Fd) -> Result<&mut (dyn File + 'static), FdError> {
        if fd < Fd::FIRST_FILE {
            return Err(FdError::InvalidDescriptor);
        }
        self.slots
            .get_mut(fd.index())
            .ok_or(FdError::InvalidDescriptor)?
            .as_deref_mut()
            .ok_or(FdError::NotOpen)
    }

    /// Take a file out of its slot. The caller closes it by dropping it.
    pub fn remove(&mut self, fd: Fd) -> Result<Box<dyn File>, FdError> {
        if fd < Fd::FIRST_FILE {
            return Err(FdError::InvalidDescriptor);
        }
        self.slots
            .get_mut(fd.index())
            .ok_or(FdError::InvalidDescriptor)?
            .take()
            .ok_or(FdError::NotOpen)
    }

    /// Take every open file out of the table, lowest descriptor first.
    pub fn drain(&mut self) -> impl Iterator<Item = Box<dyn File>> + '_ {
        self.slots.iter_mut().filter_map(Option::take)
    }
}

impl fmt::Debug for FdTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FdTable")
            .field("capacity", &self.slots.len())
            .field("open", &self.len())
            .finish()
    }
}
