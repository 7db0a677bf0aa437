//! Memory management for user processes
//!
//! Provides:
//! - Typed physical/virtual addresses and the user address layout
//! - Page table entries and flags
//! - Physical frames and the user frame pool
//! - Per-process address spaces
//!
//! # Security Principles
//! - All user frames are zeroed before they are mapped
//! - Page 0 and kernel addresses can never be mapped for user access
//! - Unsafe code is minimal and confined to frame access

pub mod address;
pub mod frame;
pub mod paging;
pub mod space;

pub use address::{PhysAddr, VirtAddr, PAGE_SIZE, USER_TOP};
pub use frame::{FrameAllocator, PhysFrame, UserPool};
pub use paging::{MappingError, PageFlags};
pub use space::AddressSpace;
