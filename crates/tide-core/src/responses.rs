//! Read shapes returned by the query interfaces and the `tide` CLI.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::{DailyState, ForwardProjection};
use crate::enums::CrossingTier;

/// How current the served daily states are.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Staleness {
    /// Most recent day with a persisted state.
    pub last_computed_day: NaiveDate,
    /// Days between `last_computed_day` and the last day that should exist.
    pub lag_days: i64,
    /// A recompute covering this assignment is queued or running.
    pub pending_recompute: bool,
    pub stale: bool,
}

/// Response from `daily_states(assignment, range)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DailyStatesResponse {
    pub assignment_id: String,
    pub states: Vec<DailyState>,
    pub staleness: Staleness,
}

/// Response from `forward_projection(assignment)`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ForwardProjectionResponse {
    pub assignment_id: String,
    pub as_of: NaiveDate,
    pub tier: CrossingTier,
    pub crossing_date: Option<NaiveDate>,
    pub temperature_bias: f64,
    pub series: Vec<ForwardProjection>,
}

/// Planned-vs-actual comparison for one activity.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct VarianceResponse {
    pub activity_id: String,
    pub planned_date: NaiveDate,
    pub actual_date: Option<NaiveDate>,
    pub variance_days: Option<i64>,
    pub actual_weight_g: Option<f64>,
    pub actual_population: Option<i64>,
    pub actual_fcr: Option<f64>,
    pub projected_weight_g: Option<f64>,
}

/// Projected state on an activity's due date.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ProjectionPreviewResponse {
    pub activity_id: String,
    pub due_date: NaiveDate,
    pub scenario_id: Option<String>,
    pub projected_weight_g: f64,
    pub projected_population: i64,
    pub projected_biomass_kg: f64,
    /// Days since the assignment started, on the due date.
    pub day_number: i64,
    pub rationale: String,
}
