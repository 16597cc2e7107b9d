// Delays between passes: exponential backoff for failures, jitter for the steady state
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Backoff for passes that failed outright
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_initial_delay_ms() -> u64 {
    5_000 // 5 seconds
}

fn default_max_delay_ms() -> u64 {
    300_000 // 5 minutes
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetryConfig {
    /// Delay before retry number `attempt` (1-based). Attempt 0 means no wait.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let delay_ms =
            (self.initial_delay_ms as f64) * self.backoff_multiplier.max(1.0).powi(exponent);
        let capped = delay_ms.min(self.max_delay_ms as f64);

        Duration::from_millis(capped as u64)
    }
}

/// `base` randomised by up to +/- `max_percent` percent (clamped to 0..=100)
pub fn jittered(base: Duration, max_percent: u32) -> Duration {
    jittered_with(&mut rand::thread_rng(), base, max_percent)
}

pub fn jittered_with<R: Rng + ?Sized>(rng: &mut R, base: Duration, max_percent: u32) -> Duration {
    let percent = max_percent.min(100);
    if percent == 0 || base.is_zero() {
        return base;
    }

    let spread = base.as_secs_f64() * f64::from(percent) / 100.0;
    let offset = rng.gen_range(-spread..=spread);
    Duration::from_secs_f64((base.as_secs_f64() + offset).max(0.0))
}
