//! Typed domain events published after anchors are persisted.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::Anchor;
use crate::enums::AnchorSource;

/// A domain event consumed by the recompute scheduler.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    SampleSaved {
        assignment_id: String,
        day: NaiveDate,
    },
    TransferSaved {
        assignment_id: String,
        day: NaiveDate,
    },
    TreatmentSaved {
        assignment_id: String,
        day: NaiveDate,
    },
    /// Mortality is recorded at cohort granularity.
    MortalitySaved {
        cohort_id: String,
        day: NaiveDate,
    },
}

impl DomainEvent {
    /// The event announcing a freshly persisted anchor.
    ///
    /// Returns `None` for an assignment-scoped source whose anchor has no
    /// assignment, which the normalizer never produces.
    #[must_use]
    pub fn for_anchor(anchor: &Anchor) -> Option<Self> {
        let day = anchor.occurred_on;
        match anchor.source_type {
            AnchorSource::Mortality => Some(Self::MortalitySaved {
                cohort_id: anchor.cohort_id.clone(),
                day,
            }),
            AnchorSource::Sample => anchor.assignment_id.clone().map(|assignment_id| {
                Self::SampleSaved { assignment_id, day }
            }),
            AnchorSource::Transfer => anchor.assignment_id.clone().map(|assignment_id| {
                Self::TransferSaved { assignment_id, day }
            }),
            AnchorSource::Treatment => anchor.assignment_id.clone().map(|assignment_id| {
                Self::TreatmentSaved { assignment_id, day }
            }),
        }
    }

    #[must_use]
    pub const fn day(&self) -> NaiveDate {
        match self {
            Self::SampleSaved { day, .. }
            | Self::TransferSaved { day, .. }
            | Self::TreatmentSaved { day, .. }
            | Self::MortalitySaved { day, .. } => *day,
        }
    }
}
