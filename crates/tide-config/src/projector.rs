//! Forward projection settings.

use serde::{Deserialize, Serialize};

const fn default_horizon_days() -> i64 {
    120
}

const fn default_bias_window_days() -> i64 {
    14
}

const fn default_attention_window_days() -> i64 {
    30
}

const fn default_target_weight_g() -> f64 {
    4500.0
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProjectorConfig {
    #[serde(default = "default_horizon_days")]
    pub horizon_days: i64,

    /// Trailing days over which actual-minus-profile temperature is averaged.
    #[serde(default = "default_bias_window_days")]
    pub bias_window_days: i64,

    /// Unplanned crossings within this many days need attention.
    #[serde(default = "default_attention_window_days")]
    pub attention_window_days: i64,

    /// Readiness weight for cohorts without their own target.
    #[serde(default = "default_target_weight_g")]
    pub default_target_weight_g: f64,

    /// Fraction of the population lost per projected day.
    #[serde(default)]
    pub daily_mortality_rate: f64,
}

impl Default for ProjectorConfig {
    fn default() -> Self {
        Self {
            horizon_days: default_horizon_days(),
            bias_window_days: default_bias_window_days(),
            attention_window_days: default_attention_window_days(),
            default_target_weight_g: default_target_weight_g(),
            daily_mortality_rate: 0.0,
        }
    }
}
