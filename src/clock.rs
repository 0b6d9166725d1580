// src/clock.rs

use std::cell::Cell;
use std::time::Instant;

use crate::voice::Timestamp;

/// Source of the timestamps recorded when voices start sustaining.
///
/// Must be monotonic: the renderer compares these stamps against later
/// readings to fade sustained keys.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Seconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_secs_f64()
    }
}

/// A clock the host moves by hand.
///
/// For hosts without `Instant` (wasm in the browser feeds
/// `performance.now()` through here) and for tests.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now: Cell<Timestamp>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    /// Jump to `now`. Earlier values than the current one are ignored.
    pub fn set(&self, now: Timestamp) {
        if now > self.now.get() {
            self.now.set(now);
        }
    }

    pub fn advance(&self, seconds: f64) {
        self.set(self.now.get() + seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}
