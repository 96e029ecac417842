//! Forward Projector.
//!
//! Projects an assignment forward from its latest daily state using the
//! growth model over the cohort's temperature profile, shifted by the mean
//! measured-minus-profile bias of the recent past.

use std::collections::HashMap;

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

use tide_core::biomass_kg;
use tide_core::entities::{Assignment, DailyState, ForwardProjection, ProjectionRun};
use tide_core::enums::CrossingTier;
use tide_core::errors::CoreError;
use tide_core::window::DateWindow;

use crate::{Engine, EngineError};

/// A saved projection run with its series.
#[derive(Debug, Clone, Serialize)]
pub struct Projection {
    pub run: ProjectionRun,
    pub series: Vec<ForwardProjection>,
}

/// Result of projecting every active assignment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProjectionBatch {
    pub projected: Vec<String>,
    pub failed: Vec<ProjectionFailure>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProjectionFailure {
    pub assignment_id: String,
    pub error: String,
}

/// One simulated future day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct SimulatedDay {
    pub day: NaiveDate,
    pub weight_g: f64,
    pub population: i64,
}

/// Unsaved simulation from a given state.
#[derive(Debug, Clone)]
pub(crate) struct Simulation {
    pub bias: f64,
    pub days: Vec<SimulatedDay>,
}

fn add_days(day: NaiveDate, n: i64) -> Result<NaiveDate, CoreError> {
    u64::try_from(n)
        .ok()
        .and_then(|n| day.checked_add_days(Days::new(n)))
        .ok_or_else(|| CoreError::Validation(format!("{day} + {n} days is out of range")))
}

fn sub_days(day: NaiveDate, n: i64) -> Result<NaiveDate, CoreError> {
    u64::try_from(n)
        .ok()
        .and_then(|n| day.checked_sub_days(Days::new(n)))
        .ok_or_else(|| CoreError::Validation(format!("{day} - {n} days is out of range")))
}

impl Engine {
    /// Project one assignment `horizon_days` forward from its latest state
    /// and save the run. Uses `projector.horizon_days` when `None`.
    ///
    /// # Errors
    ///
    /// `NotFound` when the assignment is unknown or has no daily state yet,
    /// `Validation` for a non-positive horizon.
    pub async fn project(
        &self,
        assignment_id: &str,
        horizon_days: Option<i64>,
    ) -> Result<Projection, EngineError> {
        let horizon = horizon_days.unwrap_or(self.config().projector.horizon_days);
        if horizon <= 0 {
            return Err(CoreError::Validation(format!("horizon must be positive, got {horizon}")).into());
        }
        let assignment = self.store().get_assignment(assignment_id).await?;
        let latest = self
            .store()
            .latest_state(assignment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("daily_state", assignment_id))?;

        let simulation = self.simulate(&assignment, &latest, horizon).await?;
        let target = self.target_weight(&assignment).await?;
        let as_of = latest.day;

        let crossing_date = if latest.average_weight_g >= target {
            Some(as_of)
        } else {
            simulation
                .days
                .iter()
                .find(|d| d.weight_g >= target)
                .map(|d| d.day)
        };
        let today = self.today();
        let tier = self.crossing_tier(&assignment.id, today, crossing_date).await?;

        let run = ProjectionRun {
            assignment_id: assignment.id.clone(),
            as_of,
            horizon_days: horizon,
            temperature_bias: simulation.bias,
            target_weight_g: target,
            crossing_date,
            tier,
            created_at: Utc::now(),
        };
        let series: Vec<ForwardProjection> = simulation
            .days
            .iter()
            .map(|d| ForwardProjection {
                assignment_id: assignment.id.clone(),
                as_of,
                day: d.day,
                projected_weight_g: d.weight_g,
                projected_population: d.population,
                projected_biomass_kg: biomass_kg(d.population, d.weight_g),
                applied_temperature_bias: simulation.bias,
                crossing_tier: tier,
            })
            .collect();
        self.store().save_projection(&run, &series).await?;

        tracing::info!(
            assignment_id = %assignment.id,
            as_of = %as_of,
            lag_days = (today - as_of).num_days(),
            bias = simulation.bias,
            crossing = ?crossing_date,
            tier = %tier,
            "projection saved"
        );
        Ok(Projection { run, series })
    }

    /// Project every assignment active on `as_of`. One failure never stops
    /// the batch.
    ///
    /// # Errors
    ///
    /// Only when the active assignments cannot be listed.
    pub async fn project_all(
        &self,
        as_of: NaiveDate,
        horizon_days: Option<i64>,
    ) -> Result<ProjectionBatch, EngineError> {
        let mut batch = ProjectionBatch::default();
        for assignment in self.store().list_active_assignments(as_of).await? {
            match self.project(&assignment.id, horizon_days).await {
                Ok(_) => batch.projected.push(assignment.id),
                Err(e) => {
                    tracing::warn!(assignment_id = %assignment.id, error = %e, "projection failed");
                    batch.failed.push(ProjectionFailure {
                        assignment_id: assignment.id,
                        error: e.to_string(),
                    });
                }
            }
        }
        tracing::info!(
            as_of = %as_of,
            projected = batch.projected.len(),
            failed = batch.failed.len(),
            "projection batch finished"
        );
        Ok(batch)
    }

    /// Mean of `measured - profile` over the bias window ending at `as_of`,
    /// counting only days where both exist. Zero when there are none.
    pub(crate) async fn temperature_bias(
        &self,
        assignment: &Assignment,
        profile_id: Option<&str>,
        as_of: NaiveDate,
    ) -> Result<f64, EngineError> {
        let Some(profile_id) = profile_id else {
            return Ok(0.0);
        };
        let span = self.config().projector.bias_window_days;
        let window = DateWindow::new(sub_days(as_of, span - 1)?, as_of)?;
        let profile: HashMap<NaiveDate, f64> = self
            .store()
            .list_profile_points(profile_id, &window)
            .await?
            .into_iter()
            .map(|p| (p.day, p.temperature_c))
            .collect();
        let diffs: Vec<f64> = self
            .store()
            .list_temperature_readings(&assignment.id, &window)
            .await?
            .into_iter()
            .filter_map(|r| profile.get(&r.day).map(|p| r.temperature_c - p))
            .collect();
        if diffs.is_empty() {
            return Ok(0.0);
        }
        #[allow(clippy::cast_precision_loss)]
        let mean = diffs.iter().sum::<f64>() / diffs.len() as f64;
        Ok(mean)
    }

    /// Run the growth model forward from `from` without saving anything.
    pub(crate) async fn simulate(
        &self,
        assignment: &Assignment,
        from: &DailyState,
        horizon_days: i64,
    ) -> Result<Simulation, EngineError> {
        let config = self.store().cohort_config(&assignment.cohort_id).await?;
        let (_, coefficients) = self
            .config()
            .growth
            .coefficients(config.coefficient_set.as_deref())?;
        let profile_id = config.temperature_profile_id.as_deref();
        let bias = self.temperature_bias(assignment, profile_id, from.day).await?;

        let first = add_days(from.day, 1)?;
        let horizon = DateWindow::new(first, add_days(from.day, horizon_days)?)?;
        let profile: HashMap<NaiveDate, f64> = match profile_id {
            Some(id) => self
                .store()
                .list_profile_points(id, &horizon)
                .await?
                .into_iter()
                .map(|p| (p.day, p.temperature_c))
                .collect(),
            None => HashMap::new(),
        };
        let default_temperature = self.config().growth.default_temperature_c;
        let survival = 1.0 - self.config().projector.daily_mortality_rate;

        let mut weight = from.average_weight_g;
        #[allow(clippy::cast_precision_loss)]
        let mut population = from.population as f64;
        let mut days = Vec::with_capacity(usize::try_from(horizon.len_days()).unwrap_or(0));
        for day in horizon.days() {
            let temperature = profile.get(&day).copied().unwrap_or(default_temperature) + bias;
            weight = self
                .model
                .daily_increment(weight, Some(temperature), coefficients, day)?;
            population *= survival;
            #[allow(clippy::cast_possible_truncation)]
            let population = population.round() as i64;
            days.push(SimulatedDay {
                day,
                weight_g: weight,
                population,
            });
        }
        Ok(Simulation { bias, days })
    }

    async fn target_weight(&self, assignment: &Assignment) -> Result<f64, EngineError> {
        let config = self.store().cohort_config(&assignment.cohort_id).await?;
        Ok(config
            .target_weight_g
            .unwrap_or(self.config().projector.default_target_weight_g))
    }

    /// Tier of a crossing, with the attention window counted from `today`.
    async fn crossing_tier(
        &self,
        assignment_id: &str,
        today: NaiveDate,
        crossing: Option<NaiveDate>,
    ) -> Result<CrossingTier, EngineError> {
        let Some(crossing) = crossing else {
            return Ok(CrossingTier::Projected);
        };
        if self
            .store()
            .has_open_activity_due_from(assignment_id, crossing)
            .await?
        {
            return Ok(CrossingTier::Planned);
        }
        if (crossing - today).num_days() <= self.config().projector.attention_window_days {
            Ok(CrossingTier::NeedsAttention)
        } else {
            Ok(CrossingTier::Projected)
        }
    }
}
