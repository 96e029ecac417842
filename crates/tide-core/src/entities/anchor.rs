use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::{AnchorSource, TrustTier};

/// A normalized, trust-ranked observation. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct Anchor {
    pub id: String,
    pub source_type: AnchorSource,
    /// Identifier of the source record in its owning subsystem.
    pub source_id: String,
    pub cohort_id: String,
    /// `None` for mortality recorded only at cohort granularity.
    pub assignment_id: Option<String>,
    pub occurred_on: NaiveDate,
    pub population_delta: i64,
    pub average_weight_g: Option<f64>,
    pub trust_tier: TrustTier,
    /// Monotonic insertion sequence; breaks ties between equal tiers.
    pub recorded_seq: i64,
    pub raw: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Anchor {
    /// Whether the anchor carries a measured average weight.
    #[must_use]
    pub const fn is_weighing(&self) -> bool {
        self.average_weight_g.is_some()
    }

    /// Whether this anchor adds animals to its assignment.
    #[must_use]
    pub fn is_inbound_transfer(&self) -> bool {
        self.source_type == AnchorSource::Transfer && self.population_delta > 0
    }

    /// Whether the anchor is linked to a specific assignment.
    #[must_use]
    pub const fn is_assignment_linked(&self) -> bool {
        self.assignment_id.is_some()
    }
}

/// An anchor produced by the normalizer, not yet persisted.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct NewAnchor {
    pub source_type: AnchorSource,
    pub source_id: String,
    pub cohort_id: String,
    pub assignment_id: Option<String>,
    pub occurred_on: NaiveDate,
    pub population_delta: i64,
    pub average_weight_g: Option<f64>,
    pub raw: serde_json::Value,
}

impl NewAnchor {
    #[must_use]
    pub const fn trust_tier(&self) -> TrustTier {
        self.source_type.trust_tier()
    }
}
