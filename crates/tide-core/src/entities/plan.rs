use chrono::{DateTime, NaiveDate, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::enums::TriggerStatus;

/// Explicit per-cohort configuration.
///
/// Replaces any implicit "pinned scenario" lookup: callers that need a plan
/// go through `baseline_plan_id()` which fails loudly when none is attached.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct CohortConfig {
    pub cohort_id: String,
    pub temperature_profile_id: Option<String>,
    pub coefficient_set: Option<String>,
    pub baseline_plan_id: Option<String>,
    pub scenario_id: Option<String>,
    /// Harvest/transfer readiness weight.
    pub target_weight_g: Option<f64>,
}

impl CohortConfig {
    /// The attached baseline plan.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::MissingBaseline` when no plan is attached.
    pub fn baseline_plan_id(&self) -> Result<&str, crate::errors::CoreError> {
        self.baseline_plan_id
            .as_deref()
            .ok_or_else(|| crate::errors::CoreError::MissingBaseline {
                cohort_id: self.cohort_id.clone(),
            })
    }
}

/// A cohort's baseline plan from the scenario subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct BaselinePlan {
    pub id: String,
    pub cohort_id: String,
    pub scenario_id: Option<String>,
    pub start_date: NaiveDate,
}

/// Condition under which a plan template fires.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerKind {
    /// Fires once `days` have elapsed since the plan start.
    DayOffset { days: i64 },
    /// Fires once average weight reaches `grams`.
    WeightThreshold { grams: f64 },
    /// Fires once the assignment's lifecycle stage equals `stage`.
    StageTransition { stage: String },
}

/// A template attached to a baseline plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PlanTemplate {
    pub id: String,
    pub plan_id: String,
    pub name: String,
    pub activity_type: String,
    pub trigger: TriggerKind,
    /// Days between satisfaction and the generated activity's due date.
    pub lead_days: i64,
    pub active: bool,
}

/// A scheduled operational activity (harvest, transfer, treatment, ...).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct PlannedActivity {
    pub id: String,
    pub cohort_id: String,
    pub assignment_id: Option<String>,
    pub template_id: Option<String>,
    pub activity_type: String,
    pub due_date: NaiveDate,
    pub completed_on: Option<NaiveDate>,
    pub idempotency_key: Option<String>,
    /// Day whose daily state satisfied the template, for generated activities.
    pub trigger_day: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl PlannedActivity {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.completed_on.is_none()
    }
}

/// Persisted state of one (assignment, template) trigger.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct TriggerState {
    pub assignment_id: String,
    pub template_id: String,
    pub status: TriggerStatus,
    pub triggered_on: Option<NaiveDate>,
    pub activity_id: Option<String>,
}
