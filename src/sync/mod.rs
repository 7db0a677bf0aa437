//! Synchronization primitives for the process manager.
//!
//! - [`oneshot`]: single-use producer/consumer signals used by the exec
//!   and wait handshakes
//! - [`SleepLock`]: mutex whose waiters sleep, guarding the filesystem
//! - [`InterruptsOff`]: RAII guard around the scheduler's interrupt level

pub mod interrupt;
pub mod oneshot;
pub mod sleep_lock;

pub use interrupt::InterruptsOff;
pub use sleep_lock::{SleepLock, SleepLockGuard};
