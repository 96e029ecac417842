//! Retention windows for the time-partitioned tables. `0` keeps rows forever.

use serde::{Deserialize, Serialize};

const fn default_daily_state_days() -> i64 {
    0
}

const fn default_projection_days() -> i64 {
    90
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Daily states of ended assignments older than this are pruned.
    #[serde(default = "default_daily_state_days")]
    pub daily_state_days: i64,

    /// Superseded projection runs older than this are pruned.
    #[serde(default = "default_projection_days")]
    pub projection_days: i64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            daily_state_days: default_daily_state_days(),
            projection_days: default_projection_days(),
        }
    }
}
