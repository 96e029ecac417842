use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{ConfidenceTier, EstimationMethod, TemperatureSource};

/// Which inputs contributed to a daily state.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Provenance {
    /// Every anchor consulted for the day, highest ranked first.
    pub anchors: Vec<String>,
    /// Set when the day was seeded from the assignment's initial values.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub seed: bool,
    /// Where the day's temperature came from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_source: Option<TemperatureSource>,
    /// Coefficient set name of the growth model run.
    pub coefficient_set: String,
    /// Cohort-level mortality anchors that could not be linked to this assignment.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unlinked_cohort_mortality: Vec<String>,
    /// Why `feed_conversion_ratio` is null, when it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fcr_note: Option<String>,
}

/// Reconstructed biological state of one assignment on one calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct DailyState {
    pub assignment_id: String,
    pub day: NaiveDate,
    pub average_weight_g: f64,
    pub population: i64,
    pub biomass_kg: f64,
    pub feed_kg: Option<f64>,
    pub feed_conversion_ratio: Option<f64>,
    pub confidence_tier: ConfidenceTier,
    pub estimation_method: EstimationMethod,
    pub days_since_anchor: i64,
    pub temperature_c: Option<f64>,
    pub provenance: Provenance,
    pub triggered_activity_id: Option<String>,
    pub computed_at: DateTime<Utc>,
}

impl DailyState {
    /// Content equality ignoring `computed_at`.
    ///
    /// Used to skip rewriting rows whose inputs did not change.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.assignment_id == other.assignment_id
            && self.day == other.day
            && self.average_weight_g.to_bits() == other.average_weight_g.to_bits()
            && self.population == other.population
            && self.biomass_kg.to_bits() == other.biomass_kg.to_bits()
            && self.feed_kg.map(f64::to_bits) == other.feed_kg.map(f64::to_bits)
            && self.feed_conversion_ratio.map(f64::to_bits)
                == other.feed_conversion_ratio.map(f64::to_bits)
            && self.confidence_tier == other.confidence_tier
            && self.estimation_method == other.estimation_method
            && self.days_since_anchor == other.days_since_anchor
            && self.temperature_c.map(f64::to_bits) == other.temperature_c.map(f64::to_bits)
            && self.provenance == other.provenance
            && self.triggered_activity_id == other.triggered_activity_id
    }
}
