use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ScopeKind, TaskStatus};
use crate::window::DateWindow;

/// What a recompute task covers: one assignment or every assignment of a cohort.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
pub struct RecomputeScope {
    pub kind: ScopeKind,
    pub id: String,
}

impl RecomputeScope {
    #[must_use]
    pub fn assignment(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Assignment,
            id: id.into(),
        }
    }

    #[must_use]
    pub fn cohort(id: impl Into<String>) -> Self {
        Self {
            kind: ScopeKind::Cohort,
            id: id.into(),
        }
    }

    /// Partition key, e.g. `assignment:asg-1a2b3c4d`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.id)
    }

    /// Dedupe key for a window of this scope.
    #[must_use]
    pub fn dedupe_key(&self, window: &DateWindow) -> String {
        format!("{}@{window}", self.key())
    }
}

/// A unit of background reconstruction work in the durable queue.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct RecomputeTask {
    pub id: String,
    pub scope: RecomputeScope,
    pub window: DateWindow,
    pub dedupe_key: String,
    pub priority: i64,
    pub attempts: u32,
    pub status: TaskStatus,
    pub available_at: DateTime<Utc>,
    pub marker_expires_at: DateTime<Utc>,
    pub last_error: Option<String>,
    pub enqueued_at: DateTime<Utc>,
    /// Worker holding the task while it is `running`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_by: Option<String>,
    /// A running task whose lease has passed is free to be reclaimed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lease_expires_at: Option<DateTime<Utc>>,
}
