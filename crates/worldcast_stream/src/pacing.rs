//! # Pacing Controller
//!
//! Fixed-delay frame pacing.
//!
//! ## Design
//!
//! The delay between the end of one tick and the start of the next is
//! always `1/fps`. Work time is added on top, not subtracted:
//!
//! ```text
//! |-- work --|------ delay ------|-- work --|------ delay ------|
//! ```
//!
//! Throughput is `1 / (delay + work)` and drops below the target under
//! load. Nothing catches up and nothing is dropped to compensate.

use std::time::Duration;

use crossbeam_channel::{select, Receiver};
use worldcast_core::Clock;

/// Result of waiting out the pacing delay.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PacingWait {
    /// The full delay passed.
    Elapsed,
    /// A stop was signalled during the delay.
    Cancelled,
}

/// Tick timing statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PacingStats {
    /// Ticks measured.
    pub total_ticks: u64,
    /// Minimum work time observed.
    pub min_work_us: u64,
    /// Maximum work time observed.
    pub max_work_us: u64,
    /// Average work time (rolling).
    pub avg_work_us: u64,
    /// Ticks whose work alone exceeded the frame interval.
    pub late_ticks: u64,
    /// Delays armed.
    pub delays: u64,
}

/// Computes and waits out the delay between frame attempts.
#[derive(Clone, Debug)]
pub struct PacingController {
    delay: Duration,
    stats: PacingStats,
}

impl PacingController {
    /// Creates a controller targeting `fps` frames per second.
    #[must_use]
    pub fn new(fps: u32) -> Self {
        let delay = Duration::from_micros(1_000_000 / u64::from(fps.max(1)));
        Self {
            delay,
            stats: PacingStats {
                min_work_us: u64::MAX,
                ..PacingStats::default()
            },
        }
    }

    /// Delay armed after every tick.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Records how long one tick's work took.
    #[allow(clippy::cast_possible_truncation)]
    pub fn record_work(&mut self, work: Duration) {
        let work_us = work.as_micros() as u64;

        self.stats.min_work_us = self.stats.min_work_us.min(work_us);
        self.stats.max_work_us = self.stats.max_work_us.max(work_us);
        self.stats.avg_work_us = if self.stats.total_ticks == 0 {
            work_us
        } else {
            (self.stats.avg_work_us * 15 + work_us) / 16
        };
        self.stats.total_ticks += 1;

        if work > self.delay {
            self.stats.late_ticks += 1;
        }
    }

    /// Waits for the pacing delay, or until `cancel` fires or disconnects.
    pub fn wait(&mut self, clock: &dyn Clock, cancel: &Receiver<()>) -> PacingWait {
        self.stats.delays += 1;
        let timer = clock.after(self.delay);
        select! {
            recv(timer) -> _ => PacingWait::Elapsed,
            recv(cancel) -> _ => PacingWait::Cancelled,
        }
    }

    /// Frame rate actually achievable with the measured average work time.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn effective_fps(&self) -> f64 {
        let period_us = self.delay.as_micros() as f64 + self.stats.avg_work_us as f64;
        if period_us <= 0.0 {
            0.0
        } else {
            1_000_000.0 / period_us
        }
    }

    /// Returns timing statistics.
    #[must_use]
    pub const fn stats(&self) -> PacingStats {
        let mut stats = self.stats;
        if stats.total_ticks == 0 {
            stats.min_work_us = 0;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;
    use std::time::Instant;
    use worldcast_core::{ManualClock, SystemClock};

    #[test]
    fn test_delay_from_fps() {
        assert_eq!(PacingController::new(60).delay(), Duration::from_micros(16_666));
        assert_eq!(PacingController::new(10).delay(), Duration::from_millis(100));
        assert_eq!(PacingController::new(0).delay(), Duration::from_secs(1));
    }

    #[test]
    fn test_ten_delays_span_one_second_simulated() {
        let clock = ManualClock::new();
        let (_keep, cancel) = bounded::<()>(0);
        let mut pacing = PacingController::new(10);
        for _ in 0..10 {
            assert_eq!(pacing.wait(&clock, &cancel), PacingWait::Elapsed);
        }
        assert_eq!(clock.now(), Duration::from_secs(1));
        assert_eq!(pacing.stats().delays, 10);
    }

    #[test]
    fn test_no_catch_up_after_slow_work() {
        let clock = ManualClock::new();
        let (_keep, cancel) = bounded::<()>(0);
        let mut pacing = PacingController::new(10);

        clock.advance(Duration::from_millis(450));
        pacing.record_work(Duration::from_millis(450));
        pacing.wait(&clock, &cancel);

        // The slow tick is not compensated: the full delay is still added.
        assert_eq!(clock.now(), Duration::from_millis(550));
        assert_eq!(pacing.stats().late_ticks, 1);
    }

    #[test]
    fn test_cancel_interrupts_wait() {
        let clock = SystemClock::new();
        let (cancel_tx, cancel) = bounded::<()>(0);
        let mut pacing = PacingController::new(1);
        drop(cancel_tx);

        let start = Instant::now();
        assert_eq!(pacing.wait(&clock, &cancel), PacingWait::Cancelled);
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_effective_fps_under_load() {
        let mut pacing = PacingController::new(10);
        assert!((pacing.effective_fps() - 10.0).abs() < 1e-9);
        pacing.record_work(Duration::from_millis(100));
        assert!((pacing.effective_fps() - 5.0).abs() < 1e-9);
    }
}
