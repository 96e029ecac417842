use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::CrossingTier;

/// One projected future day for an assignment, as of a given date.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ForwardProjection {
    pub assignment_id: String,
    pub as_of: NaiveDate,
    pub day: NaiveDate,
    pub projected_weight_g: f64,
    pub projected_population: i64,
    pub projected_biomass_kg: f64,
    pub applied_temperature_bias: f64,
    pub crossing_tier: CrossingTier,
}

/// Header of one projection run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ProjectionRun {
    pub assignment_id: String,
    pub as_of: NaiveDate,
    pub horizon_days: i64,
    pub temperature_bias: f64,
    pub target_weight_g: f64,
    pub crossing_date: Option<NaiveDate>,
    pub tier: CrossingTier,
    pub created_at: DateTime<Utc>,
}
