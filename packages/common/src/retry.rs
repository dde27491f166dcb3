use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

/// Calculate exponential backoff delay with jitter.
///
/// Formula: min(base_ms * 2^(attempt-1) + jitter, max_ms)
/// where jitter is random in [0, delay/4].
pub fn calculate_backoff(attempt: u8, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exp_factor = 2u64.saturating_pow((attempt - 1) as u32);
    let delay_ms = base_ms.saturating_mul(exp_factor);

    let jitter = if delay_ms > 0 {
        rand::rng().random_range(0..=delay_ms / 4)
    } else {
        0
    };

    let total_delay = delay_ms.saturating_add(jitter).min(max_ms);
    Duration::from_millis(total_delay)
}

/// Bounded retry schedule for optimistic writes that lost a race.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BackoffPolicy {
    /// Total attempts including the first one. Default: 8.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,
    /// Delay before the second attempt. Default: 5ms.
    #[serde(default = "default_base_ms")]
    pub base_ms: u64,
    /// Upper bound for any single delay. Default: 250ms.
    #[serde(default = "default_max_ms")]
    pub max_ms: u64,
}

fn default_max_attempts() -> u8 {
    8
}
fn default_base_ms() -> u64 {
    5
}
fn default_max_ms() -> u64 {
    250
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_ms: default_base_ms(),
            max_ms: default_max_ms(),
        }
    }
}

impl BackoffPolicy {
    /// Whether another attempt is allowed after `attempt` failed ones.
    pub fn allows_retry(&self, attempt: u8) -> bool {
        attempt < self.max_attempts.max(1)
    }

    /// Delay to wait after the `attempt`-th failure.
    pub fn delay(&self, attempt: u8) -> Duration {
        calculate_backoff(attempt, self.base_ms, self.max_ms)
    }
}
