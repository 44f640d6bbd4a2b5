//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for sync runs.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Time budget of a single remote call. Expiry counts as a retryable
    /// failure.
    pub request_timeout: Duration,
    /// Number of records uploaded concurrently. Values above 1 require an
    /// idempotent remote `create`.
    pub upload_concurrency: usize,
    /// Non-retryable failures after which a record is stalled and skipped by
    /// later runs. Zero disables stalling.
    pub max_record_attempts: u32,
    /// Capacity of the per-run progress channel.
    pub event_buffer: usize,
    /// Retry behavior for fetching the remote set.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration with default values.
    pub fn new() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            upload_concurrency: 1,
            max_record_attempts: 5,
            event_buffer: 16,
            retry: RetryConfig::default(),
        }
    }

    /// Sets the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the upload concurrency (clamped to at least 1).
    pub fn with_upload_concurrency(mut self, concurrency: usize) -> Self {
        self.upload_concurrency = concurrency.max(1);
        self
    }

    /// Sets the stall threshold.
    pub fn with_max_record_attempts(mut self, attempts: u32) -> Self {
        self.max_record_attempts = attempts;
        self
    }

    /// Sets the progress channel capacity (clamped to at least 8).
    pub fn with_event_buffer(mut self, capacity: usize) -> Self {
        self.event_buffer = capacity.max(8);
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Backoff policy for fetching the remote set.
///
/// Only the download phase's `list` call is retried; per-record uploads are
/// attempted once per run and picked up again by the next one. Only
/// retryable remote errors are retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of `list` calls per run, including the first one.
    pub max_attempts: u32,
    /// Wait before the first retry.
    pub initial_delay: Duration,
    /// Upper bound of any single wait.
    pub max_delay: Duration,
    /// Growth factor of the wait between consecutive retries.
    pub backoff_multiplier: f64,
    /// Adds up to 25% random extra wait so clients do not retry in lockstep.
    pub add_jitter: bool,
}

impl RetryConfig {
    /// Creates a policy allowing `max_attempts` list calls per run.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            add_jitter: true,
        }
    }

    /// A single list call; a failure fails the run immediately.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            add_jitter: false,
        }
    }

    /// Sets the wait before the first retry.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Enables or disables jitter.
    pub fn with_jitter(mut self, add_jitter: bool) -> Self {
        self.add_jitter = add_jitter;
        self
    }

    /// Wait before retry number `retry` (1-based). Zero for the first call.
    pub fn delay_before_retry(&self, retry: u32) -> Duration {
        if retry == 0 {
            return Duration::ZERO;
        }

        let growth = i32::try_from(retry - 1).unwrap_or(i32::MAX);
        let wait = (self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(growth))
            .min(self.max_delay.as_secs_f64());
        let extra = if self.add_jitter {
            wait * 0.25 * rand::random::<f64>()
        } else {
            0.0
        };
        Duration::from_secs_f64(wait + extra)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}
