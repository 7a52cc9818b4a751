//! Time sources for the scheduler.

use std::thread;
use std::time::{Duration, Instant};

/// Longest single sleep either clock performs, in seconds. Longer requests
/// are cut to this.
pub const MAX_SLEEP_SECONDS: f64 = 365.0 * 86_400.0;

/// The duration of a `seconds` sleep: `None` for zero, negative or NaN
/// requests, otherwise capped at [`MAX_SLEEP_SECONDS`].
fn sleep_duration(seconds: f64) -> Option<Duration> {
    (seconds > 0.0).then(|| Duration::from_secs_f64(seconds.min(MAX_SLEEP_SECONDS)))
}

/// A monotonic time source the scheduler can also sleep on.
pub trait Clock {
    /// Seconds since the clock was created.
    fn now(&self) -> f64;

    /// Block for `seconds`. Non-positive durations return immediately.
    fn sleep(&mut self, seconds: f64);
}

/// Wall-clock time; sleeping blocks the thread.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    /// Start a clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    fn sleep(&mut self, seconds: f64) {
        if let Some(duration) = sleep_duration(seconds) {
            thread::sleep(duration);
        }
    }
}

/// Virtual time; sleeping advances the clock instantly.
///
/// Runs against a `ManualClock` are fully deterministic.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualClock {
    now: f64,
}

impl ManualClock {
    /// Start a clock at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self { now: 0.0 }
    }

    /// Move time forward without sleeping.
    pub fn advance(&mut self, seconds: f64) {
        if let Some(duration) = sleep_duration(seconds) {
            self.now += duration.as_secs_f64();
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        self.now
    }

    fn sleep(&mut self, seconds: f64) {
        self.advance(seconds);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances_on_sleep() {
        let mut clock = ManualClock::new();
        clock.sleep(0.25);
        clock.sleep(-1.0);
        clock.sleep(f64::NAN);
        assert!((clock.now() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_huge_sleeps_are_capped() {
        assert_eq!(sleep_duration(1e300), Some(Duration::from_secs(365 * 86_400)));
        assert_eq!(sleep_duration(f64::INFINITY), Some(Duration::from_secs(365 * 86_400)));
        assert_eq!(sleep_duration(f64::NAN), None);
        assert_eq!(sleep_duration(0.0), None);
        let mut clock = ManualClock::new();
        clock.sleep(f64::MAX);
        assert!((clock.now() - MAX_SLEEP_SECONDS).abs() < 1e-6);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let mut clock = SystemClock::new();
        let before = clock.now();
        clock.sleep(0.001);
        assert!(clock.now() >= before + 0.001);
    }
}
