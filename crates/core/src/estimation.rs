//! Throughput and ETA estimation for running imports.
//!
//! Values are advisory and UI-facing. The estimator is fed one tick per
//! chunk start with the number of rows handled so far.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Derived rate and remaining time at one tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgressEstimate {
    /// Records per second since the previous tick.
    pub throughput: f64,
    /// Whole seconds until all records are handled, if estimable.
    pub eta_seconds: Option<u64>,
}

/// Tracks the previous `(time, count)` observation between ticks.
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimator {
    last: Option<(Instant, usize)>,
    throughput: f64,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and return the updated estimate.
    ///
    /// The first tick only establishes a baseline. A tick with no elapsed
    /// time keeps the previous throughput.
    pub fn tick(&mut self, now: Instant, completed: usize, total: usize) -> ProgressEstimate {
        if let Some((prev_at, prev_completed)) = self.last {
            let elapsed = now.saturating_duration_since(prev_at).as_secs_f64();
            if elapsed > 0.0 {
                let delta = completed.saturating_sub(prev_completed);
                self.throughput = throughput(delta, elapsed);
            }
        }
        self.last = Some((now, completed));

        ProgressEstimate {
            throughput: self.throughput,
            eta_seconds: eta_seconds(total.saturating_sub(completed), self.throughput),
        }
    }
}

/// Records per second, or `0.0` when no time has elapsed.
pub fn throughput(delta_records: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    delta_records as f64 / elapsed_secs
}

/// Remaining whole seconds, or `None` if nothing remains or the rate is zero.
pub fn eta_seconds(remaining: usize, throughput: f64) -> Option<u64> {
    if remaining == 0 || throughput <= 0.0 {
        return None;
    }
    Some((remaining as f64 / throughput).round() as u64)
}
