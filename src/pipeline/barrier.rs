//! Fan-out/fan-in barrier
//!
//! A countdown latch sized to a batch. [`FanIn::new`] hands out one
//! [`Permit`] per dispatched evaluation; each permit is returned by dropping
//! it, so an evaluation that ends early, is rejected, or unwinds through a
//! panic still releases the waiter.

use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

struct Latch {
    remaining: Mutex<usize>,
    released: Condvar,
}

/// Waiting side of the barrier
pub struct FanIn {
    latch: Arc<Latch>,
}

/// One outstanding evaluation. Dropping it counts the evaluation as finished.
pub struct Permit {
    latch: Arc<Latch>,
}

impl FanIn {
    /// Create a barrier together with its `count` permits
    pub fn new(count: usize) -> (Self, Vec<Permit>) {
        let latch = Arc::new(Latch {
            remaining: Mutex::new(count),
            released: Condvar::new(),
        });
        let permits = (0..count)
            .map(|_| Permit {
                latch: latch.clone(),
            })
            .collect();
        (Self { latch }, permits)
    }

    /// Permits not yet returned
    pub fn remaining(&self) -> usize {
        *self.latch.remaining.lock()
    }

    /// Block until every permit has been returned
    pub fn wait(&self) {
        let mut remaining = self.latch.remaining.lock();
        while *remaining != 0 {
            self.latch.released.wait(&mut remaining);
        }
    }

    /// Block until every permit has been returned or `timeout` elapsed.
    /// Returns whether the barrier opened.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut remaining = self.latch.remaining.lock();
        if *remaining != 0 {
            self.latch
                .released
                .wait_while_for(&mut remaining, |r| *r != 0, timeout);
        }
        *remaining == 0
    }
}

impl Drop for Permit {
    fn drop(&mut self) {
        let mut remaining = self.latch.remaining.lock();
        *remaining = remaining.saturating_sub(1);
        if *remaining == 0 {
            self.latch.released.notify_all();
        }
    }
}

impl std::fmt::Debug for FanIn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanIn")
            .field("remaining", &self.remaining())
            .finish()
    }
}
