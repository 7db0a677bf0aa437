//! Physical Frame Allocation
//!
//! Frames handed to user address spaces come from a [`FrameAllocator`].
//! The kernel provides [`UserPool`], which carves page-aligned frames out
//! of a dedicated memory region using `linked_list_allocator`.
//!
//! # Security Properties
//! - All allocated frames are zeroed before returning
//! - A frame has exactly one owner; it can only be freed by moving it back
//! - The pool is protected by a spinlock

use core::alloc::Layout;
use core::ptr::NonNull;

use linked_list_allocator::Heap;
use spin::Mutex;

use super::address::{PhysAddr, PAGE_SIZE};

/// Source of physical frames for user pages.
pub trait FrameAllocator: Send + Sync {
    /// Allocate a single zeroed frame, or `None` if the pool is exhausted.
    fn allocate(&self) -> Option<PhysFrame>;

    /// Return a frame to the pool.
    fn deallocate(&self, frame: PhysFrame);
}

/// An owned physical frame.
///
/// Dropping a `PhysFrame` leaks it; frames must be returned to the
/// allocator they came from.
#[derive(Debug)]
pub struct PhysFrame {
    ptr: NonNull<u8>,
}

// SAFETY: a PhysFrame is the unique owner of its page; moving it between
// threads moves that ownership.
unsafe impl Send for PhysFrame {}

impl PhysFrame {
    /// Wrap a raw frame pointer.
    ///
    /// # Safety
    /// `ptr` must be page-aligned, valid for `PAGE_SIZE` bytes of reads and
    /// writes, and not owned by anything else.
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<u8>) -> Self {
        debug_assert!(PhysAddr::new(ptr.as_ptr() as usize).is_aligned());
        Self { ptr }
    }

    /// Give up ownership and return the raw pointer.
    #[inline]
    pub fn into_raw(self) -> NonNull<u8> {
        self.ptr
    }

    /// Get the physical address of this frame.
    #[inline]
    pub fn addr(&self) -> PhysAddr {
        PhysAddr::new(self.ptr.as_ptr() as usize)
    }

    /// View the frame contents.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        // SAFETY: from_raw guarantees PAGE_SIZE valid bytes owned by us.
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), PAGE_SIZE) }
    }

    /// Mutably view the frame contents.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // SAFETY: from_raw guarantees PAGE_SIZE valid bytes owned by us.
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), PAGE_SIZE) }
    }
}

/// Frame pool backed by a fixed memory region.
///
/// This plays the role of the "user pool": frames for process images and
/// stacks come from here so a runaway process cannot starve kernel heap
/// allocations.
pub struct UserPool {
    heap: Mutex<PoolHeap>,
    total_frames: usize,
}

/// The allocator's free list lives inside the pool region itself.
struct PoolHeap(Heap);

// SAFETY: the region is exclusively owned by the pool and only touched
// while the pool mutex is held.
unsafe impl Send for PoolHeap {}

impl UserPool {
    const FRAME_LAYOUT: Layout = match Layout::from_size_align(PAGE_SIZE, PAGE_SIZE) {
        Ok(layout) => layout,
        Err(_) => panic!("invalid frame layout"),
    };

    /// Create a pool over `[start, start + size)`.
    ///
    /// # Safety
    /// The region must be valid for reads and writes, unused by anything
    /// else, and must outlive the pool.
    pub unsafe fn new(start: *mut u8, size: usize) -> Self {
        // SAFETY: forwarded from the caller.
        let heap = unsafe { Heap::new(start, size) };
        let total_frames = size / PAGE_SIZE;
        log::debug!("[MM] user pool: {} bytes at {:p}", size, start);
        Self {
            heap: Mutex::new(PoolHeap(heap)),
            total_frames,
        }
    }

    /// Upper bound on the number of frames this pool can hold.
    pub fn capacity(&self) -> usize {
        self.total_frames
    }

    /// Bytes currently handed out.
    pub fn used_bytes(&self) -> usize {
        self.heap.lock().0.used()
    }
}

impl FrameAllocator for UserPool {
    fn allocate(&self) -> Option<PhysFrame> {
        let ptr = self
            .heap
            .lock()
            .0
            .allocate_first_fit(Self::FRAME_LAYOUT)
            .ok()?;

        // Zero the frame for security
        // SAFETY: the frame was just allocated so we have exclusive access.
        unsafe { core::ptr::write_bytes(ptr.as_ptr(), 0, PAGE_SIZE) };

        // SAFETY: FRAME_LAYOUT makes the block page-aligned and page-sized.
        Some(unsafe { PhysFrame::from_raw(ptr) })
    }

    fn deallocate(&self, frame: PhysFrame) {
        let ptr = frame.into_raw();
        // SAFETY: every PhysFrame given out by this pool was allocated with
        // FRAME_LAYOUT and ownership has just been returned.
        unsafe { self.heap.lock().0.deallocate(ptr, Self::FRAME_LAYOUT) };
    }
}
