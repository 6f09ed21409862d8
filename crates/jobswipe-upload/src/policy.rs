//! Retry, timeout and size policy

use jobswipe_storage::DEFAULT_CACHE_CONTROL;
use rand::Rng;
use std::time::Duration;

/// Engine-wide size ceiling (10 MiB)
pub const MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024;

/// Upload engine policy
#[derive(Clone, Debug)]
pub struct UploadPolicy {
    /// Hard ceiling on attempts per upload
    pub max_attempts: u32,
    /// Backoff base, doubled per failed attempt
    pub base_delay: Duration,
    /// Upper bound on a single backoff delay, jitter included
    pub max_delay: Duration,
    /// Jitter is drawn uniformly from `[0, max_jitter)`
    pub max_jitter: Duration,
    /// Wall-clock budget for reading the payload in one attempt
    pub attempt_timeout: Duration,
    /// Absolute payload ceiling (bytes)
    pub max_file_size: u64,
    /// `cache-control` max-age for written objects (seconds)
    pub cache_control: String,
    /// Stop immediately on a permission-denied signal instead of retrying
    pub fail_fast_on_permission_denied: bool,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            max_jitter: Duration::from_millis(1000),
            attempt_timeout: Duration::from_secs(60),
            max_file_size: MAX_UPLOAD_SIZE,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
            fail_fast_on_permission_denied: true,
        }
    }
}

impl UploadPolicy {
    /// Set the attempt ceiling (at least one)
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Set the backoff base and cap
    pub fn with_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.base_delay = base;
        self.max_delay = max;
        self
    }

    /// Set the jitter range
    pub fn with_jitter(mut self, max_jitter: Duration) -> Self {
        self.max_jitter = max_jitter;
        self
    }

    /// Set the per-attempt fetch timeout
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Set the size ceiling
    pub fn with_max_file_size(mut self, bytes: u64) -> Self {
        self.max_file_size = bytes;
        self
    }

    /// Retry permission-denied failures like transient ones
    pub fn retry_permission_denied(mut self) -> Self {
        self.fail_fast_on_permission_denied = false;
        self
    }

    /// Delay before the next attempt once `failed_attempts` attempts have failed:
    /// `min(base * 2^failed_attempts + jitter, max_delay)`.
    pub fn backoff_delay(&self, failed_attempts: u32, jitter: Duration) -> Duration {
        let base = self.base_delay.as_millis() as u64;
        let exponential = 2u64
            .checked_pow(failed_attempts)
            .and_then(|factor| base.checked_mul(factor))
            .unwrap_or(u64::MAX);
        let total = exponential.saturating_add(jitter.as_millis() as u64);
        Duration::from_millis(total).min(self.max_delay)
    }

    /// Backoff delay with freshly drawn jitter
    pub fn next_delay(&self, failed_attempts: u32) -> Duration {
        self.backoff_delay(failed_attempts, self.draw_jitter())
    }

    fn draw_jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..max))
    }
}
