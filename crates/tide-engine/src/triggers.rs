//! Trigger Evaluator.
//!
//! Each (assignment, template) pair fires at most once. The generated
//! activity carries the idempotency key `trg:{template}:{assignment}`, so a
//! crash between insert and state update cannot duplicate it either.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use tide_core::entities::{Assignment, BaselinePlan, DailyState, PlanTemplate, PlannedActivity, TriggerKind};
use tide_core::enums::TriggerStatus;
use tide_db::repos::plan::NewActivity;

use crate::{Engine, EngineError};

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TriggerReport {
    pub evaluated: usize,
    pub created: Vec<PlannedActivity>,
    /// Templates already triggered, or whose activity already existed.
    pub suppressed: usize,
}

/// Idempotency key of the activity generated by `template_id` for `assignment_id`.
#[must_use]
pub fn trigger_key(template_id: &str, assignment_id: &str) -> String {
    format!("trg:{template_id}:{assignment_id}")
}

/// First state in `states` satisfying the template, if any.
fn first_satisfying<'a>(
    template: &PlanTemplate,
    plan: &BaselinePlan,
    assignment: &Assignment,
    states: &'a [DailyState],
) -> Option<&'a DailyState> {
    match &template.trigger {
        TriggerKind::DayOffset { days } => {
            let offset = u64::try_from(*days).unwrap_or(0);
            let due = plan.start_date.checked_add_days(Days::new(offset))?;
            states.iter().find(|s| s.day >= due)
        }
        TriggerKind::WeightThreshold { grams } => {
            states.iter().find(|s| s.average_weight_g >= *grams)
        }
        // The stage is a property of the assignment, not of a day, so it is
        // attributed to the newest state.
        TriggerKind::StageTransition { stage } => {
            if assignment.lifecycle_stage.as_deref() == Some(stage.as_str()) {
                states.last()
            } else {
                None
            }
        }
    }
}

fn due_date(day: NaiveDate, lead_days: i64) -> NaiveDate {
    let lead = Days::new(lead_days.unsigned_abs());
    let shifted = if lead_days >= 0 {
        day.checked_add_days(lead)
    } else {
        day.checked_sub_days(lead)
    };
    shifted.unwrap_or(day)
}

impl Engine {
    /// Evaluate every active template of the cohort's baseline plan against
    /// freshly recomputed `states` (day order).
    ///
    /// # Errors
    ///
    /// `MissingBaseline` when the cohort has no plan attached. Store failures
    /// propagate.
    pub async fn evaluate_triggers(
        &self,
        assignment: &Assignment,
        states: &[DailyState],
    ) -> Result<TriggerReport, EngineError> {
        let mut report = TriggerReport::default();
        if states.is_empty() {
            return Ok(report);
        }
        let store = self.store();
        let plan = store.baseline_plan(&assignment.cohort_id).await?;

        for template in store.list_active_templates(&plan.id).await? {
            report.evaluated += 1;
            let state = store.trigger_state(&assignment.id, &template.id).await?;
            if state.status == TriggerStatus::Triggered {
                report.suppressed += 1;
                continue;
            }
            let Some(satisfied) = first_satisfying(&template, &plan, assignment, states) else {
                continue;
            };

            let key = trigger_key(&template.id, &assignment.id);
            let (activity, created) = store
                .insert_planned_activity(&NewActivity {
                    cohort_id: &assignment.cohort_id,
                    assignment_id: Some(&assignment.id),
                    template_id: Some(&template.id),
                    activity_type: &template.activity_type,
                    due_date: due_date(satisfied.day, template.lead_days),
                    idempotency_key: Some(&key),
                    trigger_day: Some(satisfied.day),
                })
                .await?;
            let trigger_day = activity.trigger_day.unwrap_or(satisfied.day);
            store
                .mark_triggered(&assignment.id, &template.id, trigger_day, &activity.id)
                .await?;
            store
                .set_triggered_activity(&assignment.id, trigger_day, &activity.id)
                .await?;

            if created {
                tracing::info!(
                    assignment_id = %assignment.id,
                    template_id = %template.id,
                    activity_id = %activity.id,
                    due_date = %activity.due_date,
                    "planned activity triggered"
                );
                report.created.push(activity);
            } else {
                tracing::debug!(key = %key, "trigger already materialized");
                report.suppressed += 1;
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, d};
    use pretty_assertions::assert_eq;
    use tide_core::errors::CoreError;

    #[tokio::test]
    async fn weight_threshold_fires_once_across_recomputes() {
        let fx = Fixture::new(d(3, 12)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.baseline(d(3, 1)).await;
        fx.template("tpl-grade", TriggerKind::WeightThreshold { grams: 60.0 }, 3).await;
        fx.sample("asg-1", d(3, 11), 60.5).await;

        let day10 = fx.engine.reconstruct("asg-1", d(3, 1), d(3, 11)).await.unwrap();
        let asg = fx.engine.store().get_assignment("asg-1").await.unwrap();
        let first = fx.engine.evaluate_triggers(&asg, &day10.states).await.unwrap();
        assert_eq!(first.created.len(), 1);
        assert_eq!(first.created[0].due_date, d(3, 14));
        assert_eq!(first.created[0].trigger_day, Some(d(3, 11)));

        let day11 = fx.engine.reconstruct("asg-1", d(3, 11), d(3, 12)).await.unwrap();
        let second = fx.engine.evaluate_triggers(&asg, &day11.states).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.suppressed, 1);

        let activities = fx.engine.store().list_assignment_activities("asg-1").await.unwrap();
        assert_eq!(activities.len(), 1);
        let state = fx.state("asg-1", d(3, 11)).await;
        assert_eq!(state.triggered_activity_id.as_deref(), Some(activities[0].id.as_str()));
    }

    #[tokio::test]
    async fn day_offset_counts_from_plan_start() {
        let fx = Fixture::new(d(3, 20)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.baseline(d(3, 5)).await;
        fx.template("tpl-vacc", TriggerKind::DayOffset { days: 10 }, 0).await;

        let report = fx.engine.reconstruct("asg-1", d(3, 1), d(3, 20)).await.unwrap();
        let asg = fx.engine.store().get_assignment("asg-1").await.unwrap();
        let triggers = fx.engine.evaluate_triggers(&asg, &report.states).await.unwrap();
        assert_eq!(triggers.created.len(), 1);
        assert_eq!(triggers.created[0].trigger_day, Some(d(3, 15)));
        assert_eq!(triggers.created[0].due_date, d(3, 15));
    }

    #[tokio::test]
    async fn stage_transition_uses_assignment_stage() {
        let fx = Fixture::new(d(3, 5)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.baseline(d(3, 1)).await;
        fx.template(
            "tpl-smolt",
            TriggerKind::StageTransition { stage: "smolt".into() },
            7,
        )
        .await;

        let report = fx.engine.reconstruct("asg-1", d(3, 1), d(3, 5)).await.unwrap();
        let mut asg = fx.engine.store().get_assignment("asg-1").await.unwrap();
        let before = fx.engine.evaluate_triggers(&asg, &report.states).await.unwrap();
        assert!(before.created.is_empty());

        asg.lifecycle_stage = Some("smolt".into());
        let after = fx.engine.evaluate_triggers(&asg, &report.states).await.unwrap();
        assert_eq!(after.created.len(), 1);
        assert_eq!(after.created[0].due_date, d(3, 12));
    }

    #[tokio::test]
    async fn inactive_templates_are_ignored() {
        let fx = Fixture::new(d(3, 5)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.baseline(d(3, 1)).await;
        fx.engine
            .store()
            .upsert_plan_template(&PlanTemplate {
                id: "tpl-off".into(),
                plan_id: "pln-1".into(),
                name: "disabled".into(),
                activity_type: "grading".into(),
                trigger: TriggerKind::DayOffset { days: 0 },
                lead_days: 0,
                active: false,
            })
            .await
            .unwrap();
        let report = fx.engine.reconstruct("asg-1", d(3, 1), d(3, 5)).await.unwrap();
        let asg = fx.engine.store().get_assignment("asg-1").await.unwrap();
        let triggers = fx.engine.evaluate_triggers(&asg, &report.states).await.unwrap();
        assert_eq!(triggers.evaluated, 0);
    }

    #[tokio::test]
    async fn missing_baseline_is_reported() {
        let fx = Fixture::new(d(3, 5)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        let report = fx.engine.reconstruct("asg-1", d(3, 1), d(3, 5)).await.unwrap();
        let asg = fx.engine.store().get_assignment("asg-1").await.unwrap();
        let err = fx.engine.evaluate_triggers(&asg, &report.states).await.unwrap_err();
        assert!(err.is_missing_baseline());
        assert!(matches!(err.core(), Some(CoreError::MissingBaseline { cohort_id }) if cohort_id == "coh-1"));
    }

    #[test]
    fn negative_lead_moves_due_date_earlier() {
        assert_eq!(due_date(d(4, 10), -3), d(4, 7));
        assert_eq!(due_date(d(4, 10), 2), d(4, 12));
    }
}
