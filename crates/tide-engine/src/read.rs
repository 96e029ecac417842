//! Read interfaces.
//!
//! Readers never wait on a recompute: they get the last persisted rows plus
//! a staleness indicator.

use tide_core::biomass_kg;
use tide_core::entities::PlannedActivity;
use tide_core::errors::CoreError;
use tide_core::responses::{
    DailyStatesResponse, ForwardProjectionResponse, ProjectionPreviewResponse, Staleness,
    VarianceResponse,
};
use tide_core::window::DateWindow;

use crate::{Engine, EngineError};

impl Engine {
    /// Persisted daily states within `window` (the whole valid range when
    /// `None`) with a staleness indicator.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown assignment or one never reconstructed.
    pub async fn daily_states(
        &self,
        assignment_id: &str,
        window: Option<DateWindow>,
    ) -> Result<DailyStatesResponse, EngineError> {
        let assignment = self.store().get_assignment(assignment_id).await?;
        let latest = self
            .store()
            .latest_state(assignment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("daily_state", assignment_id))?;

        let expected_last = assignment.last_state_day(self.today());
        let window = match window {
            Some(w) => w,
            None => DateWindow::new(assignment.start_date, expected_last.max(latest.day))?,
        };
        let states = self.store().list_daily_states(assignment_id, &window).await?;

        let lag_days = (expected_last - latest.day).num_days().max(0);
        let pending_recompute = self
            .store()
            .has_pending_recompute(assignment_id, &assignment.cohort_id)
            .await?;
        Ok(DailyStatesResponse {
            assignment_id: assignment.id,
            states,
            staleness: Staleness {
                last_computed_day: latest.day,
                lag_days,
                pending_recompute,
                stale: lag_days > 0 || pending_recompute,
            },
        })
    }

    /// The newest saved projection run and its series.
    ///
    /// # Errors
    ///
    /// `NotFound` when the assignment was never projected.
    pub async fn forward_projection(
        &self,
        assignment_id: &str,
    ) -> Result<ForwardProjectionResponse, EngineError> {
        let run = self
            .store()
            .latest_projection_run(assignment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("forward_projection", assignment_id))?;
        let series = self
            .store()
            .list_projection_rows(assignment_id, run.as_of)
            .await?;
        Ok(ForwardProjectionResponse {
            assignment_id: run.assignment_id,
            as_of: run.as_of,
            tier: run.tier,
            crossing_date: run.crossing_date,
            temperature_bias: run.temperature_bias,
            series,
        })
    }

    /// Planned versus actual for one activity. Actual fields stay empty
    /// until the activity is completed and the day is reconstructed.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown activity.
    pub async fn variance(&self, activity_id: &str) -> Result<VarianceResponse, EngineError> {
        let activity = self.store().get_planned_activity(activity_id).await?;
        let actual_date = activity.completed_on;

        let actual = match (activity.assignment_id.as_deref(), actual_date) {
            (Some(assignment_id), Some(day)) => {
                self.store().get_daily_state(assignment_id, day).await?
            }
            _ => None,
        };
        let projected_weight_g = match activity.assignment_id.as_deref() {
            Some(assignment_id) => self
                .store()
                .projection_for_day(assignment_id, activity.due_date)
                .await?
                .map(|p| p.projected_weight_g),
            None => None,
        };

        Ok(VarianceResponse {
            activity_id: activity.id,
            planned_date: activity.due_date,
            actual_date,
            variance_days: actual_date.map(|day| (day - activity.due_date).num_days()),
            actual_weight_g: actual.as_ref().map(|s| s.average_weight_g),
            actual_population: actual.as_ref().map(|s| s.population),
            actual_fcr: actual.and_then(|s| s.feed_conversion_ratio),
            projected_weight_g,
        })
    }

    /// Expected state of the activity's assignment on its due date.
    ///
    /// Served from the reconstructed row when the due date is in the past,
    /// then from the newest saved projection, then from an unsaved simulation.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown activity or an assignment never reconstructed,
    /// `Validation` for an activity without an assignment, `InvalidRange` when
    /// the due date precedes the assignment.
    pub async fn projection_preview(
        &self,
        activity_id: &str,
    ) -> Result<ProjectionPreviewResponse, EngineError> {
        let activity = self.store().get_planned_activity(activity_id).await?;
        let assignment_id = activity.assignment_id.as_deref().ok_or_else(|| {
            CoreError::Validation(format!("activity {activity_id} has no assignment"))
        })?;
        let assignment = self.store().get_assignment(assignment_id).await?;
        let due = activity.due_date;
        if due < assignment.start_date {
            return Err(CoreError::InvalidRange {
                from: due,
                to: assignment.start_date,
                reason: "due date precedes the assignment".into(),
            }
            .into());
        }
        let scenario_id = self
            .store()
            .cohort_config(&assignment.cohort_id)
            .await?
            .scenario_id;
        let latest = self
            .store()
            .latest_state(assignment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("daily_state", assignment_id))?;

        let (weight_g, population, rationale) = if due <= latest.day {
            let state = self
                .store()
                .get_daily_state(assignment_id, due)
                .await?
                .ok_or_else(|| CoreError::not_found("daily_state", format!("{assignment_id}@{due}")))?;
            (
                state.average_weight_g,
                state.population,
                format!(
                    "reconstructed state on {due} ({}, {})",
                    state.estimation_method, state.confidence_tier
                ),
            )
        } else if let Some(row) = self.store().projection_for_day(assignment_id, due).await? {
            (
                row.projected_weight_g,
                row.projected_population,
                format!(
                    "forward projection as of {} with {:+.2} °C bias ({})",
                    row.as_of, row.applied_temperature_bias, row.crossing_tier
                ),
            )
        } else {
            let horizon = (due - latest.day).num_days();
            let simulation = self.simulate(&assignment, &latest, horizon).await?;
            let last = simulation
                .days
                .last()
                .copied()
                .ok_or_else(|| CoreError::Validation(format!("nothing to simulate up to {due}")))?;
            (
                last.weight_g,
                last.population,
                format!(
                    "simulated {horizon} days from state on {} with {:+.2} °C bias",
                    latest.day, simulation.bias
                ),
            )
        };

        Ok(preview(&activity, scenario_id, weight_g, population, assignment.start_date, rationale))
    }
}

fn preview(
    activity: &PlannedActivity,
    scenario_id: Option<String>,
    weight_g: f64,
    population: i64,
    start: chrono::NaiveDate,
    rationale: String,
) -> ProjectionPreviewResponse {
    ProjectionPreviewResponse {
        activity_id: activity.id.clone(),
        due_date: activity.due_date,
        scenario_id,
        projected_weight_g: weight_g,
        projected_population: population,
        projected_biomass_kg: biomass_kg(population, weight_g),
        day_number: (activity.due_date - start).num_days(),
        rationale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, d};
    use pretty_assertions::assert_eq;
    use tide_core::entities::RecomputeScope;

    #[tokio::test]
    async fn states_report_lag_and_pending_work() {
        let fx = Fixture::new(d(3, 10)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 7)).await.unwrap();

        let response = fx.engine.daily_states("asg-1", None).await.unwrap();
        assert_eq!(response.states.len(), 7);
        assert_eq!(response.staleness.last_computed_day, d(3, 7));
        assert_eq!(response.staleness.lag_days, 3);
        assert!(response.staleness.stale);
        assert!(!response.staleness.pending_recompute);

        fx.engine.reconstruct("asg-1", d(3, 8), d(3, 10)).await.unwrap();
        let fresh = fx.engine.daily_states("asg-1", None).await.unwrap();
        assert!(!fresh.staleness.stale);

        fx.engine
            .store()
            .enqueue_recompute(
                &RecomputeScope::cohort("coh-1"),
                DateWindow::single(d(3, 9)),
                10,
                std::time::Duration::from_secs(30),
                chrono::Utc::now(),
            )
            .await
            .unwrap();
        let pending = fx.engine.daily_states("asg-1", None).await.unwrap();
        assert!(pending.staleness.pending_recompute);
        assert!(pending.staleness.stale);
    }

    #[tokio::test]
    async fn states_respect_window_and_need_a_computation() {
        let fx = Fixture::new(d(3, 10)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        let err = fx.engine.daily_states("asg-1", None).await.unwrap_err();
        assert!(err.is_not_found());

        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 10)).await.unwrap();
        let window = DateWindow::new(d(3, 3), d(3, 5)).unwrap();
        let response = fx.engine.daily_states("asg-1", Some(window)).await.unwrap();
        let days: Vec<_> = response.states.iter().map(|s| s.day).collect();
        assert_eq!(days, vec![d(3, 3), d(3, 4), d(3, 5)]);
    }

    #[tokio::test]
    async fn forward_projection_serves_latest_run() {
        let fx = Fixture::new(d(3, 10)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        assert!(fx.engine.forward_projection("asg-1").await.unwrap_err().is_not_found());

        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 10)).await.unwrap();
        let saved = fx.engine.project("asg-1", Some(15)).await.unwrap();
        let response = fx.engine.forward_projection("asg-1").await.unwrap();
        assert_eq!(response.as_of, d(3, 10));
        assert_eq!(response.tier, saved.run.tier);
        assert_eq!(response.series, saved.series);
    }

    #[tokio::test]
    async fn variance_compares_plan_projection_and_actual() {
        let fx = Fixture::new(d(3, 20)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 10)).await.unwrap();
        fx.engine.project("asg-1", Some(20)).await.unwrap();
        let activity = fx.manual_activity("harvest", "asg-1", d(3, 15)).await;

        let open = fx.engine.variance(&activity).await.unwrap();
        assert_eq!(open.actual_date, None);
        assert_eq!(open.variance_days, None);
        assert!(open.projected_weight_g.is_some());

        fx.engine.reconstruct("asg-1", d(3, 11), d(3, 20)).await.unwrap();
        fx.engine.store().complete_activity(&activity, d(3, 18)).await.unwrap();
        let done = fx.engine.variance(&activity).await.unwrap();
        let state = fx.state("asg-1", d(3, 18)).await;
        assert_eq!(done.variance_days, Some(3));
        assert_eq!(done.actual_population, Some(state.population));
        assert_eq!(done.actual_weight_g, Some(state.average_weight_g));
    }

    #[tokio::test]
    async fn preview_uses_state_then_projection_then_simulation() {
        let fx = Fixture::new(d(3, 10)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 10)).await.unwrap();

        let past = fx.manual_activity("vaccination", "asg-1", d(3, 6)).await;
        let preview = fx.engine.projection_preview(&past).await.unwrap();
        let state = fx.state("asg-1", d(3, 6)).await;
        assert!((preview.projected_weight_g - state.average_weight_g).abs() < f64::EPSILON);
        assert_eq!(preview.day_number, 5);
        assert!(preview.rationale.starts_with("reconstructed"));

        let future = fx.manual_activity("harvest", "asg-1", d(3, 20)).await;
        let simulated = fx.engine.projection_preview(&future).await.unwrap();
        assert!(simulated.rationale.starts_with("simulated"));

        fx.engine.project("asg-1", Some(30)).await.unwrap();
        let projected = fx.engine.projection_preview(&future).await.unwrap();
        assert!(projected.rationale.starts_with("forward projection"));
        assert!((projected.projected_weight_g - simulated.projected_weight_g).abs() < 1e-9);
        assert_eq!(projected.scenario_id.as_deref(), Some("scn-1"));
        assert_eq!(projected.day_number, 19);
    }
}
