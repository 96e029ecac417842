//! Operational alert trail.
//!
//! Alerts are written twice: a row in the `alerts` table (queried by the
//! CLI) and a line in `{trail_dir}/alerts.jsonl` for log shippers. Uses
//! `serde_jsonlines::append_json_lines` for per-line appends.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DatabaseError;

/// Alert raised when a recompute task exhausts its attempts.
pub const KIND_TASK_RETRY_EXHAUSTED: &str = "task_retry_exhausted";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpsAlert {
    pub id: String,
    pub kind: String,
    /// What the alert is about, e.g. a task id or scope key.
    pub subject: String,
    pub message: String,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
}

/// Appends alerts to a JSONL file.
pub struct AlertTrail {
    path: PathBuf,
    enabled: bool,
}

impl AlertTrail {
    /// Create a trail writing to `{dir}/alerts.jsonl`, creating `dir` if needed.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the directory cannot be created.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, DatabaseError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir).map_err(|e| DatabaseError::Other(e.into()))?;
        Ok(Self {
            path: dir.join("alerts.jsonl"),
            enabled: true,
        })
    }

    /// A trail that drops every alert (alerts still reach the table).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            path: PathBuf::new(),
            enabled: false,
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one alert.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the file write fails.
    pub fn append(&self, alert: &OpsAlert) -> Result<(), DatabaseError> {
        if !self.enabled {
            return Ok(());
        }
        serde_jsonlines::append_json_lines(&self.path, [alert])
            .map_err(|e| DatabaseError::Other(e.into()))
    }

    /// Read every alert in the trail. Missing file reads as empty.
    ///
    /// # Errors
    ///
    /// Returns `DatabaseError` if the file exists but cannot be parsed.
    pub fn read_all(&self) -> Result<Vec<OpsAlert>, DatabaseError> {
        if !self.enabled || !self.path.exists() {
            return Ok(Vec::new());
        }
        serde_jsonlines::json_lines(&self.path)
            .map_err(|e| DatabaseError::Other(e.into()))?
            .collect::<Result<Vec<OpsAlert>, _>>()
            .map_err(|e| DatabaseError::Other(e.into()))
    }
}
