//! # Clocks
//!
//! The pipeline never sleeps directly. Every delay is a timer channel
//! obtained from a [`Clock`], so a wait can be raced against a stop signal
//! with `crossbeam_channel::select!`, and tests can swap real time for
//! [`ManualClock`].

use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use parking_lot::Mutex;

/// Source of time and timers for the pipeline.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock was created.
    fn now(&self) -> Duration;

    /// Channel that yields once `delay` has passed.
    fn after(&self, delay: Duration) -> Receiver<Instant>;
}

/// Wall-clock time.
#[derive(Clone, Copy, Debug)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    /// Creates a clock whose origin is now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn after(&self, delay: Duration) -> Receiver<Instant> {
        crossbeam_channel::after(delay)
    }
}

/// Simulated time for tests.
///
/// Every timer fires immediately and moves the clock forward by its delay,
/// so a run that waits ten times for 100 ms finishes instantly with
/// `now() == 1s`.
#[derive(Debug, Default)]
pub struct ManualClock {
    elapsed: Mutex<Duration>,
    timers: Mutex<u64>,
}

impl ManualClock {
    /// Creates a clock at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves time forward without arming a timer.
    pub fn advance(&self, by: Duration) {
        *self.elapsed.lock() += by;
    }

    /// Number of timers armed so far.
    #[must_use]
    pub fn timers_armed(&self) -> u64 {
        *self.timers.lock()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        *self.elapsed.lock()
    }

    fn after(&self, delay: Duration) -> Receiver<Instant> {
        self.advance(delay);
        *self.timers.lock() += 1;
        crossbeam_channel::after(Duration::ZERO)
    }
}
