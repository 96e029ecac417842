//! Recompute scheduler and worker pool settings.

use std::time::Duration;

use serde::{Deserialize, Serialize};

const fn default_workers() -> usize {
    4
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_base_backoff_ms() -> u64 {
    500
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

/// How long a dedupe marker keeps absorbing events into a queued task.
const fn default_dedupe_ttl_secs() -> u64 {
    30
}

const fn default_sweep_lookback_days() -> i64 {
    14
}

const fn default_poll_interval_ms() -> u64 {
    250
}

const fn default_sweep_lease_secs() -> u64 {
    3600
}

const fn default_task_lease_secs() -> u64 {
    300
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SchedulerConfig {
    /// Number of concurrent reconstruction workers.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempts per task, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_backoff_ms")]
    pub base_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    #[serde(default = "default_dedupe_ttl_secs")]
    pub dedupe_ttl_secs: u64,

    /// Assignments touched within this many days are re-enqueued by the sweep.
    #[serde(default = "default_sweep_lookback_days")]
    pub sweep_lookback_days: i64,

    /// Idle wait between queue polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Lifetime of the sweep lease that keeps sweeps to one instance.
    #[serde(default = "default_sweep_lease_secs")]
    pub sweep_lease_secs: u64,

    /// Lease on a claimed task. Workers renew it while running; a task whose
    /// lease lapses is reclaimable by any worker.
    #[serde(default = "default_task_lease_secs")]
    pub task_lease_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_attempts: default_max_attempts(),
            base_backoff_ms: default_base_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            dedupe_ttl_secs: default_dedupe_ttl_secs(),
            sweep_lookback_days: default_sweep_lookback_days(),
            poll_interval_ms: default_poll_interval_ms(),
            sweep_lease_secs: default_sweep_lease_secs(),
            task_lease_secs: default_task_lease_secs(),
        }
    }
}

impl SchedulerConfig {
    /// Backoff before attempt `attempt + 1`, doubling from the base and capped.
    #[must_use]
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let ms = self
            .base_backoff_ms
            .saturating_mul(1u64 << exp)
            .min(self.max_backoff_ms);
        Duration::from_millis(ms)
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub const fn task_lease(&self) -> Duration {
        Duration::from_secs(self.task_lease_secs)
    }

    /// How often a worker renews the lease of the task it is running.
    #[must_use]
    pub fn lease_renewal_interval(&self) -> Duration {
        (self.task_lease() / 3).max(Duration::from_secs(1))
    }
}
