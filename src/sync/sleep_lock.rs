//! Sleeping lock
//!
//! A mutex whose waiters sleep in the scheduler instead of spinning, for
//! critical sections that may run long (file I/O, whole program loads).
//! Waiters are woken in arrival order.
//!
//! Not reentrant: a holder that locks again sleeps forever.

use alloc::collections::VecDeque;
use alloc::sync::Arc;
use core::cell::UnsafeCell;
use core::ops::{Deref, DerefMut};

use spin::Mutex;

use crate::sched::{Scheduler, Tid};

struct LockState {
    holder: Option<Tid>,
    waiters: VecDeque<Tid>,
}

/// A lock that puts contending threads to sleep.
pub struct SleepLock<T> {
    state: Mutex<LockState>,
    scheduler: Arc<dyn Scheduler>,
    data: UnsafeCell<T>,
}

// SAFETY: `data` is only reached through a guard, and at most one guard
// exists at a time.
unsafe impl<T: Send> Sync for SleepLock<T> {}
// SAFETY: moving the lock moves the data with it.
unsafe impl<T: Send> Send for SleepLock<T> {}

impl<T> SleepLock<T> {
    /// Create an unlocked lock whose waiters sleep through `scheduler`.
    pub fn new(data: T, scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            state: Mutex::new(LockState {
                holder: None,
                waiters: VecDeque::new(),
            }),
            scheduler,
            data: UnsafeCell::new(data),
        }
    }

    /// Acquire the lock, sleeping while another thread holds it.
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        let me = self.scheduler.current();
        loop {
            {
                let mut state = self.state.lock();
                if state.holder.is_none() {
                    state.holder = Some(me);
                    state.waiters.retain(|&tid| tid != me);
                    return SleepLockGuard { lock: self };
                }
                if !state.waiters.contains(&me) {
                    state.waiters.push_back(me);
                }
            }
            self.scheduler.block();
        }
    }

    /// Whether some thread holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.lock().holder.is_some()
    }

    fn unlock(&self) {
        let next = {
            let mut state = self.state.lock();
            state.holder = None;
            state.waiters.front().copied()
        };
        if let Some(tid) = next {
            self.scheduler.unblock(tid);
        }
    }
}

/// Access to the data of a held [`SleepLock`]. Dropping it unlocks.
pub struct SleepLockGuard<'a, T> {
    lock: &'a SleepLock<T>,
}

impl<T> Deref for SleepLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: the guard proves this thread holds the lock.
        unsafe { &*self.lock.data.get() }
    }
}

impl<T> DerefMut for SleepLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: the guard proves this thread holds the lock.
        unsafe { &mut *self.lock.data.get() }
    }
}

impl<T> Drop for SleepLockGuard<'_, T> {
    fn drop(&mut self) {
        self.lock.unlock();
    }
}
