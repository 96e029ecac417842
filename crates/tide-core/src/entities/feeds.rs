//! Read-only inputs supplied by external collaborators.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A measured water temperature for one assignment and day.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct TemperatureReading {
    pub assignment_id: String,
    pub day: NaiveDate,
    pub temperature_c: f64,
}

/// One day of a scenario temperature profile.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ProfilePoint {
    pub profile_id: String,
    pub day: NaiveDate,
    pub temperature_c: f64,
}

/// Daily feed consumption for an assignment, costed by the feed ledger.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct FeedRecord {
    pub assignment_id: String,
    pub day: NaiveDate,
    pub feed_kg: f64,
    pub cost: f64,
}
