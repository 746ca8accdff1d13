//! Poll interval backoff policy

use std::time::Duration;

use crate::config::PollingConfig;

/// Outcome of a single poll attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Success,
    Failure,
}

/// Multiplicative backoff bounded between a floor and a ceiling.
///
/// Growth is applied directly to the previous interval, so the policy keeps
/// no attempt counter of its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub floor: Duration,
    pub ceiling: Duration,
    pub multiplier: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            floor: Duration::from_millis(5000),
            ceiling: Duration::from_millis(30000),
            multiplier: 1.5,
        }
    }
}

impl From<&PollingConfig> for BackoffPolicy {
    fn from(config: &PollingConfig) -> Self {
        Self {
            floor: Duration::from_millis(config.initial_interval_ms),
            ceiling: Duration::from_millis(config.max_interval_ms),
            multiplier: config.backoff_multiplier,
        }
    }
}

impl BackoffPolicy {
    /// Interval to wait before the next poll
    pub fn next(&self, interval: Duration, outcome: PollOutcome) -> Duration {
        match outcome {
            PollOutcome::Success => self.floor,
            // overflow or a non-finite product saturates at the ceiling
            PollOutcome::Failure => {
                Duration::try_from_secs_f64(interval.as_secs_f64() * self.multiplier)
                    .unwrap_or(self.ceiling)
                    .min(self.ceiling)
            }
        }
    }
}
