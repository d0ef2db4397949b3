//! Simulation clock scaling.
//!
//! The world model hands out a `time_rate` at registration. Every modeled
//! duration (treatment lengths, poll intervals) goes through [`TimeScale`] so
//! the whole agent speeds up or slows down together.

use std::time::Duration;

use tracing::warn;

/// Shortest interval any periodic loop is allowed to run at.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Converts base time units into scaled units and wall-clock durations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeScale {
    time_rate: f64,
    unit: Duration,
}

impl TimeScale {
    /// Create a scale. A non-finite or non-positive rate falls back to 1.0.
    pub fn new(time_rate: f64, unit: Duration) -> Self {
        let time_rate = if time_rate.is_finite() && time_rate > 0.0 {
            time_rate
        } else {
            warn!(time_rate, "Unusable time rate, falling back to 1.0");
            1.0
        };

        Self { time_rate, unit }
    }

    /// Scale with rate 1.0 and one-second units.
    pub fn identity() -> Self {
        Self::new(1.0, Duration::from_secs(1))
    }

    pub fn time_rate(&self) -> f64 {
        self.time_rate
    }

    /// Compress `base` units by the time rate, rounding to the nearest whole
    /// unit. Never returns less than one unit.
    pub fn scale_units(&self, base: u32) -> u32 {
        let scaled = (f64::from(base) / self.time_rate).round();
        if scaled < 1.0 {
            1
        } else if scaled >= f64::from(u32::MAX) {
            u32::MAX
        } else {
            scaled as u32
        }
    }

    /// Wall-clock length of `units` scaled units.
    pub fn duration(&self, units: u32) -> Duration {
        self.unit.saturating_mul(units)
    }

    /// Scale a configured loop interval, keeping it above a small floor.
    pub fn scale_interval(&self, interval: Duration) -> Duration {
        Duration::try_from_secs_f64(interval.as_secs_f64() / self.time_rate)
            .unwrap_or(Duration::MAX)
            .max(MIN_INTERVAL)
    }
}

impl Default for TimeScale {
    fn default() -> Self {
        Self::identity()
    }
}
