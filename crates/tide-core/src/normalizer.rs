//! Anchor normalizer: converts heterogeneous source events into trust-ranked
//! anchors.
//!
//! A single source event may produce zero, one, or two anchors. A transfer
//! between two assignments yields an outbound anchor on the source and an
//! inbound anchor on the destination. A treatment without weighing carries
//! no state information and yields nothing.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::entities::NewAnchor;
use crate::enums::AnchorSource;
use crate::errors::CoreError;

/// An event persisted by one of the source subsystems.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceEvent {
    GrowthSample {
        id: String,
        cohort_id: String,
        assignment_id: String,
        sampled_on: NaiveDate,
        sample_size: u32,
        average_weight_g: f64,
    },
    Transfer {
        id: String,
        cohort_id: String,
        from_assignment_id: Option<String>,
        to_assignment_id: Option<String>,
        transferred_on: NaiveDate,
        count: i64,
        average_weight_g: Option<f64>,
    },
    Treatment {
        id: String,
        cohort_id: String,
        assignment_id: String,
        treated_on: NaiveDate,
        treatment_type: String,
        weighed_average_weight_g: Option<f64>,
    },
    Mortality {
        id: String,
        cohort_id: String,
        assignment_id: Option<String>,
        occurred_on: NaiveDate,
        count: i64,
        cause: Option<String>,
    },
}

impl SourceEvent {
    /// Identifier of the event in its source subsystem.
    #[must_use]
    pub fn source_id(&self) -> &str {
        match self {
            Self::GrowthSample { id, .. }
            | Self::Transfer { id, .. }
            | Self::Treatment { id, .. }
            | Self::Mortality { id, .. } => id,
        }
    }
}

/// Normalize one source event into anchors.
///
/// # Errors
///
/// Returns `CoreError::Validation` when the event carries impossible values
/// (non-positive weight or count, a transfer with neither side).
pub fn normalize(event: &SourceEvent) -> Result<Vec<NewAnchor>, CoreError> {
    let raw = serde_json::to_value(event).map_err(|e| CoreError::Other(e.into()))?;
    let source_id = event.source_id().to_string();

    match event {
        SourceEvent::GrowthSample {
            cohort_id,
            assignment_id,
            sampled_on,
            sample_size,
            average_weight_g,
            ..
        } => {
            if *sample_size == 0 {
                return Err(CoreError::Validation(format!(
                    "sample {source_id} has no weighed individuals"
                )));
            }
            validate_weight(&source_id, *average_weight_g)?;
            Ok(vec![NewAnchor {
                source_type: AnchorSource::Sample,
                source_id,
                cohort_id: cohort_id.clone(),
                assignment_id: Some(assignment_id.clone()),
                occurred_on: *sampled_on,
                population_delta: 0,
                average_weight_g: Some(*average_weight_g),
                raw,
            }])
        }
        SourceEvent::Transfer {
            cohort_id,
            from_assignment_id,
            to_assignment_id,
            transferred_on,
            count,
            average_weight_g,
            ..
        } => {
            if *count <= 0 {
                return Err(CoreError::Validation(format!(
                    "transfer {source_id} must move a positive count, got {count}"
                )));
            }
            if let Some(weight) = average_weight_g {
                validate_weight(&source_id, *weight)?;
            }
            if from_assignment_id.is_none() && to_assignment_id.is_none() {
                return Err(CoreError::Validation(format!(
                    "transfer {source_id} has neither source nor destination"
                )));
            }

            let mut anchors = Vec::with_capacity(2);
            if let Some(from) = from_assignment_id {
                anchors.push(NewAnchor {
                    source_type: AnchorSource::Transfer,
                    source_id: source_id.clone(),
                    cohort_id: cohort_id.clone(),
                    assignment_id: Some(from.clone()),
                    occurred_on: *transferred_on,
                    population_delta: -count,
                    // Animals left behind were not weighed.
                    average_weight_g: None,
                    raw: raw.clone(),
                });
            }
            if let Some(to) = to_assignment_id {
                anchors.push(NewAnchor {
                    source_type: AnchorSource::Transfer,
                    source_id,
                    cohort_id: cohort_id.clone(),
                    assignment_id: Some(to.clone()),
                    occurred_on: *transferred_on,
                    population_delta: *count,
                    average_weight_g: *average_weight_g,
                    raw,
                });
            }
            Ok(anchors)
        }
        SourceEvent::Treatment {
            cohort_id,
            assignment_id,
            treated_on,
            weighed_average_weight_g,
            ..
        } => {
            let Some(weight) = weighed_average_weight_g else {
                return Ok(Vec::new());
            };
            validate_weight(&source_id, *weight)?;
            Ok(vec![NewAnchor {
                source_type: AnchorSource::Treatment,
                source_id,
                cohort_id: cohort_id.clone(),
                assignment_id: Some(assignment_id.clone()),
                occurred_on: *treated_on,
                population_delta: 0,
                average_weight_g: Some(*weight),
                raw,
            }])
        }
        SourceEvent::Mortality {
            cohort_id,
            assignment_id,
            occurred_on,
            count,
            ..
        } => {
            if *count <= 0 {
                return Err(CoreError::Validation(format!(
                    "mortality {source_id} must record a positive count, got {count}"
                )));
            }
            Ok(vec![NewAnchor {
                source_type: AnchorSource::Mortality,
                source_id,
                cohort_id: cohort_id.clone(),
                assignment_id: assignment_id.clone(),
                occurred_on: *occurred_on,
                population_delta: -count,
                average_weight_g: None,
                raw,
            }])
        }
    }
}

fn validate_weight(source_id: &str, weight: f64) -> Result<(), CoreError> {
    if weight.is_finite() && weight > 0.0 {
        Ok(())
    } else {
        Err(CoreError::Validation(format!(
            "{source_id}: average weight must be positive, got {weight}"
        )))
    }
}
