use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::debug;

/// Bounded retry budget for the conditional-replace loop.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_base: Duration,
    backoff_max: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff_base: Duration, backoff_max: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_base,
            backoff_max: backoff_max.max(backoff_base),
        }
    }

    pub fn from_config(cfg: &configs::RetryConfig) -> Self {
        Self::new(
            cfg.max_attempts,
            Duration::from_millis(cfg.backoff_base_ms),
            Duration::from_millis(cfg.backoff_max_ms),
        )
    }

    /// Total attempts, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before `attempt` (0-based). Exponential from the base, capped,
    /// then jittered into the upper half so racing writers drift apart.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = self.backoff_base.as_millis() as u64;
        let max_ms = self.backoff_max.as_millis() as u64;
        let exp_ms = base_ms.saturating_mul(1u64 << (attempt - 1).min(20));
        let capped = exp_ms.min(max_ms);
        if capped == 0 {
            return Duration::ZERO;
        }
        let jittered = rand::thread_rng().gen_range(capped / 2..=capped);
        Duration::from_millis(jittered)
    }

    pub async fn wait_before_retry(&self, attempt: u32) {
        let delay = self.backoff_for(attempt);
        if delay.is_zero() {
            return;
        }
        debug!(?delay, attempt, "backing off before retry");
        sleep(delay).await;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&configs::RetryConfig::default())
    }
}
