use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

/// Caller-decided outcome for a failed batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition<T> {
    /// Dispatch again with these items in place of the original batch content.
    Retry(Vec<T>),
    /// Count the batch items as failed and move on to the next batch.
    Skip,
    /// End the whole job with this reason.
    Abort(String),
}

impl<T> Disposition<T> {
    /// Maps a replacement list in its nullable shape: absent or empty skips,
    /// anything else is retried.
    pub fn from_replacement(items: Option<Vec<T>>) -> Self {
        match items {
            Some(items) if !items.is_empty() => Disposition::Retry(items),
            _ => Disposition::Skip,
        }
    }

    pub fn abort(reason: impl Into<String>) -> Self {
        Disposition::Abort(reason.into())
    }
}

/// Per-batch retry limit plus the pause taken between attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::ZERO,
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: if max_delay.is_zero() {
                base_delay
            } else {
                max_delay
            },
        }
    }

    /// Preset for write, remove, transform and query jobs.
    pub fn for_writes() -> Self {
        Self::default()
    }

    /// Preset for bulk reads, which keep going past many individually
    /// missing documents.
    pub fn for_reads() -> Self {
        Self {
            max_retries: 100,
            ..Self::default()
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        if self.max_delay < base_delay {
            self.max_delay = base_delay;
        }
        self
    }

    /// Fresh budget for a new batch.
    pub fn budget(&self) -> RetryBudget {
        RetryBudget {
            remaining: self.max_retries,
            used: 0,
        }
    }

    pub fn backoff_delay(&self, attempt: usize) -> Duration {
        if self.base_delay.is_zero() {
            return Duration::from_millis(0);
        }

        let factor = 1u128 << attempt.min(6);
        let base_ms = self.base_delay.as_millis();
        let delay_ms = base_ms.saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis());
        Duration::from_millis(capped as u64)
    }

    /// Sleeps for the backoff of the given retry attempt; returns immediately
    /// when no base delay is configured.
    pub async fn wait(&self, attempt: usize) {
        let delay = self.backoff_delay(attempt);
        if !delay.is_zero() {
            debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
            sleep(delay).await;
        }
    }
}

/// Retries left for the batch currently owned by a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    remaining: usize,
    used: usize,
}

impl RetryBudget {
    /// Takes one retry; returns `false` once nothing is left.
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        self.used += 1;
        true
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining == 0
    }

    pub fn used(&self) -> usize {
        self.used
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replacement_shapes_map_to_dispositions() {
        assert_eq!(Disposition::<u8>::from_replacement(None), Disposition::Skip);
        assert_eq!(
            Disposition::<u8>::from_replacement(Some(Vec::new())),
            Disposition::Skip
        );
        assert_eq!(
            Disposition::from_replacement(Some(vec![1, 2])),
            Disposition::Retry(vec![1, 2])
        );
        assert_eq!(
            Disposition::<u8>::abort("stop"),
            Disposition::Abort("stop".to_string())
        );
    }

    #[test]
    fn budget_runs_out_after_max_retries() {
        let mut budget = RetryPolicy::for_writes().budget();
        assert!(budget.consume());
        assert!(budget.consume());
        assert!(budget.is_exhausted());
        assert!(!budget.consume());
        assert_eq!(budget.used(), 2);
    }

    #[test]
    fn read_preset_allows_many_retries() {
        assert_eq!(RetryPolicy::for_reads().budget().remaining(), 100);
    }

    #[test]
    fn backoff_is_exponential_and_capped() {
        let policy = RetryPolicy::new(5, Duration::from_millis(100), Duration::from_millis(500));
        assert_eq!(policy.backoff_delay(0), Duration::from_millis(100));
        assert_eq!(policy.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(500));
        assert_eq!(RetryPolicy::default().backoff_delay(4), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn wait_sleeps_for_the_backoff() {
        let policy = RetryPolicy::default().with_base_delay(Duration::from_millis(50));
        let started = tokio::time::Instant::now();
        policy.wait(1).await;
        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
