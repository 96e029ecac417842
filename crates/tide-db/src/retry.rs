//! Transient lock retry.
//!
//! Concurrent writers on a local libSQL file surface `database is locked` /
//! `SQLITE_BUSY` while another connection holds the write lock. These resolve
//! on their own, so statements are retried with capped exponential backoff.
//! The predicate is narrow: constraint and syntax errors are never retried.

use std::time::Duration;

/// Configuration for retry behavior on transient lock errors.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial one).
    pub max_attempts: u32,
    /// Initial delay before the first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries (backoff is capped here).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(20),
            max_delay: Duration::from_millis(500),
        }
    }
}

impl RetryConfig {
    /// Delay after the given 1-based failed attempt.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Detect transient lock contention errors.
pub fn is_transient_lock_error(e: &libsql::Error) -> bool {
    let msg = e.to_string().to_ascii_lowercase();
    msg.contains("database is locked") || msg.contains("database table is locked") || msg.contains("busy")
}
