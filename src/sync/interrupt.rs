//! Interrupt-level guard.

use crate::sched::{IntrLevel, Scheduler};

/// Keeps interrupts disabled for as long as it lives.
///
/// Restores the level that was in effect when it was created, so guards
/// nest correctly.
pub struct InterruptsOff<'a> {
    scheduler: &'a dyn Scheduler,
    old: IntrLevel,
}

impl<'a> InterruptsOff<'a> {
    /// Disable interrupts until the guard is dropped.
    pub fn new(scheduler: &'a dyn Scheduler) -> Self {
        let old = scheduler.intr_disable();
        Self { scheduler, old }
    }
}

impl Drop for InterruptsOff<'_> {
    fn drop(&mut self) {
        self.scheduler.intr_set_level(self.old);
    }
}
