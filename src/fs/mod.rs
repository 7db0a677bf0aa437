//! Filesystem Interface
//!
//! The on-disk filesystem is provided by the kernel embedding this crate.
//! Every call through these traits must be made while holding the kernel's
//! filesystem lock (see [`Kernel::with_fs`](crate::Kernel::with_fs)); the
//! implementations are not required to be reentrant.
//!
//! Closing a file is dropping its handle. A handle that denied writes
//! lifts its denial when it is closed.

pub mod fd;

use alloc::boxed::Box;

pub use fd::{Fd, FdError, FdTable};

/// A mounted filesystem.
pub trait FileSystem: Send + Sync {
    /// Open the file at `path`.
    fn open(&self, path: &str) -> Option<Box<dyn File>>;

    /// Create a file of `initial_size` bytes. Fails if it already exists.
    fn create(&self, path: &str, initial_size: u32) -> bool;

    /// Remove a file. Open handles stay usable.
    fn remove(&self, path: &str) -> bool;
}

/// An open file handle with its own position.
pub trait File: Send {
    /// Read at the current position, advancing it. Returns bytes read.
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Write at the current position, advancing it. Returns bytes written,
    /// which is 0 while writes are denied.
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Move the position. Positions past the end are allowed.
    fn seek(&mut self, position: u32);

    /// Current position.
    fn tell(&self) -> u32;

    /// File length in bytes.
    fn length(&self) -> u32;

    /// Deny writes to the underlying file through any handle.
    fn deny_write(&mut self);

    /// Undo a previous [`deny_write`](Self::deny_write).
    fn allow_write(&mut self);
}
