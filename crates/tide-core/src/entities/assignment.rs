use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::biomass_kg;

/// A cohort's occupancy of one enclosure over an active interval.
///
/// Owned by the batch subsystem. Tide reads it and writes back only the
/// mutable snapshot fields (`population_count`, `average_weight_g`).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Assignment {
    pub id: String,
    pub cohort_id: String,
    pub enclosure_id: String,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub initial_population: i64,
    pub initial_weight_g: f64,
    pub population_count: i64,
    pub average_weight_g: f64,
    pub lifecycle_stage: Option<String>,
}

impl Assignment {
    /// Derived biomass of the current snapshot.
    #[must_use]
    pub fn biomass_kg(&self) -> f64 {
        biomass_kg(self.population_count, self.average_weight_g)
    }

    /// Whether the assignment occupies its enclosure on `day`.
    #[must_use]
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.start_date <= day && self.end_date.is_none_or(|end| day <= end)
    }

    /// Last day that may carry a daily state: `min(today, end_date)`.
    #[must_use]
    pub fn last_state_day(&self, today: NaiveDate) -> NaiveDate {
        self.end_date.map_or(today, |end| end.min(today))
    }
}
