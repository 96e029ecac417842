//! Operational alert output.

use serde::{Deserialize, Serialize};

fn default_trail_dir() -> String {
    String::from(".tide/alerts")
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AlertsConfig {
    /// Directory receiving `alerts.jsonl`. Empty disables the file trail.
    #[serde(default = "default_trail_dir")]
    pub trail_dir: String,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            trail_dir: default_trail_dir(),
        }
    }
}

impl AlertsConfig {
    pub fn is_enabled(&self) -> bool {
        !self.trail_dir.is_empty()
    }
}
