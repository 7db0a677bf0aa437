//! One-shot signals
//!
//! A one-shot carries a single value from exactly one producer to exactly
//! one consumer. Both halves are consumed by use, so the "fires once"
//! contract is enforced by the type system rather than by convention.
//!
//! ```text
//!   producer thread                 consumer thread
//!   Sender::send(v) ──────────────▶ Receiver::recv() -> Some(v)
//!   drop(Sender)    ──────────────▶ Receiver::recv() -> None
//! ```
//!
//! The consumer sleeps in the scheduler until the producer fires; it never
//! spins. Sending happens-before the matching `recv` returns.

use alloc::sync::Arc;

use spin::Mutex;

use crate::sched::{Scheduler, Tid};

enum State<T> {
    /// Nothing sent yet.
    Empty,
    /// A value is waiting to be received.
    Full(T),
    /// The sender went away without sending.
    Closed,
}

struct Slot<T> {
    state: State<T>,
    /// Thread sleeping in `recv`, if any.
    waiter: Option<Tid>,
}

struct Inner<T> {
    slot: Mutex<Slot<T>>,
    scheduler: Arc<dyn Scheduler>,
}

impl<T> Inner<T> {
    /// Leave `state` behind and wake the receiver if it is asleep.
    fn settle(&self, state: State<T>) {
        let waiter = {
            let mut slot = self.slot.lock();
            if matches!(slot.state, State::Empty) {
                slot.state = state;
            }
            slot.waiter.take()
        };
        if let Some(tid) = waiter {
            self.scheduler.unblock(tid);
        }
    }
}

/// Producer half of a one-shot.
pub struct Sender<T> {
    inner: Option<Arc<Inner<T>>>,
}

/// Consumer half of a one-shot.
pub struct Receiver<T> {
    inner: Arc<Inner<T>>,
}

/// Create a connected sender/receiver pair whose receiver sleeps through
/// `scheduler`.
pub fn channel<T>(scheduler: Arc<dyn Scheduler>) -> (Sender<T>, Receiver<T>) {
    let inner = Arc::new(Inner {
        slot: Mutex::new(Slot {
            state: State::Empty,
            waiter: None,
        }),
        scheduler,
    });
    (
        Sender {
            inner: Some(inner.clone()),
        },
        Receiver { inner },
    )
}

impl<T> Sender<T> {
    /// Fire the signal.
    ///
    /// Returns the value back if the receiver has already been dropped;
    /// nobody will ever observe it.
    pub fn send(mut self, value: T) -> Result<(), T> {
        let Some(inner) = self.inner.take() else {
            return Err(value);
        };
        if Arc::strong_count(&inner) == 1 {
            return Err(value);
        }
        inner.settle(State::Full(value));
        Ok(())
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.settle(State::Closed);
        }
    }
}

impl<T> Receiver<T> {
    /// Block until the signal fires.
    ///
    /// Returns `None` if the sender was dropped without sending.
    pub fn recv(self) -> Option<T> {
        let scheduler = &*self.inner.scheduler;
        loop {
            {
                let mut slot = self.inner.slot.lock();
                match core::mem::replace(&mut slot.state, State::Closed) {
                    State::Full(value) => return Some(value),
                    State::Closed => return None,
                    State::Empty => {
                        slot.state = State::Empty;
                        slot.waiter = Some(scheduler.current());
                    }
                }
            }
            scheduler.block();
        }
    }

    /// Check whether [`recv`](Self::recv) would return without waiting.
    pub fn is_ready(&self) -> bool {
        !matches!(self.inner.slot.lock().state, State::Empty)
    }
}
