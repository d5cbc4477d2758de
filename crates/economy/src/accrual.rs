use std::time::{Duration, Instant};

use crate::stats::PlayerStats;

/// Streams WB tokens into [`PlayerStats::total_wb`] at the player's current
/// rate, measured against real elapsed time.
///
/// Sampling frequency does not affect the total: ten samples 100 ms apart
/// credit the same amount as one sample after a second.
#[derive(Debug, Default)]
pub struct TokenAccrual {
    last: Option<Instant>,
    total_elapsed: Duration,
}

impl TokenAccrual {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start measuring from `now` without crediting anything.
    pub fn started_at(now: Instant) -> Self {
        Self {
            last: Some(now),
            total_elapsed: Duration::ZERO,
        }
    }

    /// Credit tokens for the time since the previous sample and return the
    /// amount credited. The first sample only sets the baseline.
    pub fn advance(&mut self, stats: &mut PlayerStats, now: Instant) -> f64 {
        let Some(last) = self.last.replace(now) else {
            return 0.0;
        };
        let elapsed = now.saturating_duration_since(last);
        self.total_elapsed += elapsed;
        let amount = stats.wb_per_second * elapsed.as_secs_f64();
        stats.credit_wb(amount);
        tracing::trace!(
            elapsed_ms = elapsed.as_millis() as u64,
            amount,
            total_wb = stats.total_wb,
            "tokens accrued"
        );
        amount
    }

    /// Total time accounted for since the first sample.
    pub fn total_elapsed(&self) -> Duration {
        self.total_elapsed
    }
}
