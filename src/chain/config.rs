use std::time::Duration;

/// Retry and concurrency policy of a [ChainExecutor](crate::chain::ChainExecutor).
#[derive(Debug, Clone, PartialEq)]
pub struct ChainConfig {
    /// Retries after the first attempt of a sequential step, so a failing step is attempted `max_retries + 1` times.
    pub max_retries: u32,
    /// Wait before the first retry. Each further retry doubles it.
    pub base_delay: Duration,
    /// Upper bound on worker threads of a parallel run.
    pub max_workers: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_workers: 4,
        }
    }
}

impl ChainConfig {
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    /// Wait before retry number `retry` (1-based): `base_delay * 2^(retry-1)`.
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Worker threads used for `task_count` parallel tasks. Never zero when there is work.
    pub fn workers_for(&self, task_count: usize) -> usize {
        task_count.min(self.max_workers.max(1))
    }
}
