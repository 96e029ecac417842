//! Cross-cutting error types for Tide.
//!
//! This module defines the domain error taxonomy shared by every crate.
//! Storage errors (`DatabaseError`) and orchestration errors (`EngineError`,
//! `SchedulerError`) live in their own crates and wrap `CoreError` where a
//! domain condition crosses the boundary.

use chrono::NaiveDate;
use thiserror::Error;

/// Errors that can be raised by any Tide crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity lookup returned no result.
    #[error("Entity not found: {entity_type} {id}")]
    NotFound { entity_type: String, id: String },

    /// A required input (temperature reading, anchor) is missing for a day.
    ///
    /// Always recovered locally by the caller; never escalated past the
    /// reconstructor.
    #[error("Data gap: no {input} for {day}")]
    DataGap { input: String, day: NaiveDate },

    /// The caller asked for a date range that cannot be served.
    #[error("Invalid range: {from} .. {to} ({reason})")]
    InvalidRange {
        from: NaiveDate,
        to: NaiveDate,
        reason: String,
    },

    /// The cohort has no baseline plan attached, so no activity may be generated.
    #[error("Cohort {cohort_id} has no baseline plan")]
    MissingBaseline { cohort_id: String },

    /// A background recompute task failed on every allowed attempt.
    #[error("Recompute task {task_id} exhausted {attempts} attempts: {last_error}")]
    TaskRetryExhausted {
        task_id: String,
        attempts: u32,
        last_error: String,
    },

    /// A state machine transition was attempted that is not allowed.
    #[error("Invalid state transition: {entity_type} {id} from {from} to {to}")]
    InvalidTransition {
        entity_type: String,
        id: String,
        from: String,
        to: String,
    },

    /// Data failed validation (schema, format, constraints).
    #[error("Validation error: {0}")]
    Validation(String),

    /// Catch-all for unexpected errors.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    /// Shorthand for a `NotFound` error.
    pub fn not_found(entity_type: &str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_string(),
            id: id.into(),
        }
    }

    /// Whether this error is a locally recoverable data gap.
    #[must_use]
    pub const fn is_data_gap(&self) -> bool {
        matches!(self, Self::DataGap { .. })
    }
}
