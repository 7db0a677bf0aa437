//! User Address Spaces
//!
//! An [`AddressSpace`] owns a page directory, its page tables, and every
//! frame mapped through them. Dropping it returns all frames to the
//! allocator, so a half-built image is torn down simply by letting it go
//! out of scope.
//!
//! # Invariants
//! - Page 0 is never mapped
//! - Nothing at or above `USER_TOP` is mapped
//! - A page is mapped at most once

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::ptr::NonNull;

use super::address::{PhysAddr, VirtAddr, ENTRIES_PER_TABLE, PAGE_SIZE, USER_TOP};
use super::frame::{FrameAllocator, PhysFrame};
use super::paging::{MappingError, PageFlags, PageTable, PageTableEntry};

/// Number of directory slots that cover user space.
const USER_DIR_ENTRIES: usize = USER_TOP >> super::address::DIR_SHIFT;

/// A resolved user page.
#[derive(Debug, Clone, Copy)]
pub struct Translation {
    /// Frame backing the page.
    pub frame: PhysAddr,
    /// Flags the page was installed with.
    pub flags: PageFlags,
}

/// A process's virtual address space.
pub struct AddressSpace {
    directory: Box<[Option<Box<PageTable>>]>,
    frames: Arc<dyn FrameAllocator>,
    mapped: usize,
}

impl AddressSpace {
    /// Create an empty address space drawing frames from `frames`.
    pub fn new(frames: Arc<dyn FrameAllocator>) -> Self {
        let mut directory = Vec::with_capacity(ENTRIES_PER_TABLE);
        directory.resize_with(ENTRIES_PER_TABLE, || None);
        Self {
            directory: directory.into_boxed_slice(),
            frames,
            mapped: 0,
        }
    }

    /// The page-table root handed to the MMU when this space is active.
    pub fn root(&self) -> PhysAddr {
        PhysAddr::new(self.directory.as_ptr() as usize)
    }

    /// Number of user pages currently mapped.
    pub fn mapped_pages(&self) -> usize {
        self.mapped
    }

    /// Allocate a zeroed frame from this space's allocator.
    pub fn allocate_frame(&self) -> Result<PhysFrame, MappingError> {
        self.frames.allocate().ok_or(MappingError::OutOfMemory)
    }

    /// Return a frame that was never mapped.
    pub fn free_frame(&self, frame: PhysFrame) {
        self.frames.deallocate(frame);
    }

    /// Install `frame` at `upage`.
    ///
    /// Fails if the page is already mapped, not page-aligned, page 0, or
    /// outside user space. On failure the frame goes back to the allocator.
    pub fn map(
        &mut self,
        upage: VirtAddr,
        frame: PhysFrame,
        writable: bool,
    ) -> Result<(), MappingError> {
        if let Err(e) = self.check_mappable(upage) {
            self.frames.deallocate(frame);
            return Err(e);
        }

        let (dir, idx) = upage.table_indices();
        let table = self.directory[dir].get_or_insert_with(|| Box::new(PageTable::new()));
        table[idx] = PageTableEntry::page(frame.addr(), PageFlags::user(writable));
        // The table entry now owns the frame.
        let _ = frame.into_raw();
        self.mapped += 1;
        Ok(())
    }

    fn check_mappable(&self, upage: VirtAddr) -> Result<(), MappingError> {
        if !upage.is_aligned() {
            return Err(MappingError::MisalignedAddress);
        }
        if upage.as_usize() < PAGE_SIZE || !upage.is_user() {
            return Err(MappingError::InvalidPermissions);
        }
        if self.translate(upage).is_some() {
            return Err(MappingError::AlreadyMapped);
        }
        Ok(())
    }

    /// Look up the page containing `addr`.
    pub fn translate(&self, addr: VirtAddr) -> Option<Translation> {
        if !addr.is_user() {
            return None;
        }
        let (dir, idx) = addr.table_indices();
        let entry = self.directory.get(dir)?.as_ref()?[idx];
        entry.is_present().then(|| Translation {
            frame: entry.addr(),
            flags: entry.flags(),
        })
    }

    /// Copy bytes out of user memory, crossing pages as needed.
    ///
    /// This is a kernel-side access: page permissions are not checked,
    /// only presence.
    pub fn read_bytes(&self, addr: VirtAddr, buf: &mut [u8]) -> Result<(), MappingError> {
        let mut done = 0;
        while done < buf.len() {
            let va = addr.checked_add(done).ok_or(MappingError::NotMapped)?;
            let page = self.translate(va).ok_or(MappingError::NotMapped)?;
            let offset = va.page_offset();
            let chunk = (PAGE_SIZE - offset).min(buf.len() - done);
            // SAFETY: the frame is owned by this address space and mapped
            // for PAGE_SIZE bytes; offset + chunk <= PAGE_SIZE.
            unsafe {
                let src = (page.frame.as_usize() as *const u8).add(offset);
                core::ptr::copy_nonoverlapping(src, buf[done..].as_mut_ptr(), chunk);
            }
            done += chunk;
        }
        Ok(())
    }

    /// Copy bytes into user memory, crossing pages as needed.
    ///
    /// Like [`read_bytes`](Self::read_bytes) this ignores the writable bit;
    /// callers acting on behalf of user code must validate first.
    pub fn write_bytes(&mut self, addr: VirtAddr, data: &[u8]) -> Result<(), MappingError> {
        let mut done = 0;
        while done < data.len() {
            let va = addr.checked_add(done).ok_or(MappingError::NotMapped)?;
            let page = self.translate(va).ok_or(MappingError::NotMapped)?;
            let offset = va.page_offset();
            let chunk = (PAGE_SIZE - offset).min(data.len() - done);
            // SAFETY: as in read_bytes; &mut self gives exclusive access.
            unsafe {
                let dst = (page.frame.as_usize() as *mut u8).add(offset);
                core::ptr::copy_nonoverlapping(data[done..].as_ptr(), dst, chunk);
            }
            done += chunk;
        }
        Ok(())
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        for slot in self.directory.iter_mut().take(USER_DIR_ENTRIES) {
            let Some(table) = slot.as_mut() else { continue };
            for entry in table.iter_present_mut() {
                let ptr = entry.addr().as_usize() as *mut u8;
                entry.clear();
                if let Some(ptr) = NonNull::new(ptr) {
                    // SAFETY: the entry held the only reference to a frame
                    // that came from self.frames.
                    self.frames.deallocate(unsafe { PhysFrame::from_raw(ptr) });
                }
            }
        }
        log::trace!("[MM] released {} user pages", self.mapped);
    }
}

impl core::fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AddressSpace")
            .field("root", &self.root())
            .field("mapped", &self.mapped)
            .finish()
    }
}
