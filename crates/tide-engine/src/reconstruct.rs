//! Daily State Reconstructor.
//!
//! Walks one assignment's days in order. Each day is a pure function of the
//! previous day's row, that day's anchors and the external feeds, so running
//! twice over unchanged inputs yields identical rows and writes nothing.

use std::collections::HashMap;

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

use tide_core::biomass_kg;
use tide_core::confidence::ConfidenceBands;
use tide_core::entities::{Anchor, Assignment, DailyState, Provenance};
use tide_core::enums::{EstimationMethod, TemperatureSource};
use tide_core::errors::CoreError;
use tide_core::fcr::{FCR_INSUFFICIENT_DATA, feed_conversion_ratio, weight_gain_kg};
use tide_core::growth::{GrowthCoefficients, GrowthModel};
use tide_core::window::DateWindow;

use crate::{Engine, EngineError};

/// What one reconstruction pass did.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconstructReport {
    pub assignment_id: String,
    /// Days actually walked, after clamping, gap fill and propagation.
    pub window: Option<DateWindow>,
    pub written: usize,
    pub unchanged: usize,
    /// Set when propagation stopped early on a row equal to the stored one.
    pub converged_on: Option<NaiveDate>,
    /// Every row computed in this pass, in day order.
    #[serde(skip)]
    pub states: Vec<DailyState>,
}

impl ReconstructReport {
    fn empty(assignment_id: &str) -> Self {
        Self {
            assignment_id: assignment_id.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn latest(&self) -> Option<&DailyState> {
        self.states.last()
    }
}

/// Inputs for one assignment over the days being walked.
struct Inputs {
    anchors: HashMap<NaiveDate, Vec<Anchor>>,
    cohort_mortality: HashMap<NaiveDate, Vec<Anchor>>,
    cohort_assignments: Vec<Assignment>,
    measured: HashMap<NaiveDate, f64>,
    profile: HashMap<NaiveDate, f64>,
    feed: HashMap<NaiveDate, f64>,
    triggered: HashMap<NaiveDate, String>,
    stored: HashMap<NaiveDate, DailyState>,
    coefficient_set: String,
    coefficients: GrowthCoefficients,
    default_temperature_c: f64,
}

impl Engine {
    /// Reconstruct `[from, to]` for one assignment.
    ///
    /// The window is clamped to the assignment's valid range and moved back
    /// to the first missing day when rows before `from` are absent.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown assignment, `InvalidRange` when `from > to`
    /// or `to` is before the assignment starts.
    pub async fn reconstruct(
        &self,
        assignment_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ReconstructReport, EngineError> {
        if from > to {
            return Err(CoreError::InvalidRange {
                from,
                to,
                reason: "from is after to".into(),
            }
            .into());
        }
        let assignment = self.store().get_assignment(assignment_id).await?;
        if to < assignment.start_date {
            return Err(CoreError::InvalidRange {
                from,
                to,
                reason: format!("assignment starts on {}", assignment.start_date),
            }
            .into());
        }
        self.walk(&assignment, DateWindow { start: from, end: to }, false)
            .await
    }

    /// Reconstruct `window`, then keep going day by day until a recomputed
    /// row equals the stored one or the assignment's last valid day.
    ///
    /// A window entirely outside the assignment's range is a no-op.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown assignment, or any store failure.
    pub async fn reconstruct_and_propagate(
        &self,
        assignment_id: &str,
        window: DateWindow,
    ) -> Result<ReconstructReport, EngineError> {
        let assignment = self.store().get_assignment(assignment_id).await?;
        self.walk(&assignment, window, true).await
    }

    pub(crate) async fn walk(
        &self,
        assignment: &Assignment,
        requested: DateWindow,
        propagate: bool,
    ) -> Result<ReconstructReport, EngineError> {
        let last_valid = assignment.last_state_day(self.today());
        let Some(clamped) = requested.clamp(assignment.start_date, last_valid) else {
            tracing::debug!(assignment_id = %assignment.id, window = %requested, "window outside assignment range");
            return Ok(ReconstructReport::empty(&assignment.id));
        };

        let (start, mut prior) = self.resolve_start(assignment, clamped.start).await?;
        let end = if propagate { last_valid } else { clamped.end };
        let walk = DateWindow::new(start, end)?;
        let inputs = self.load_inputs(assignment, &walk).await?;

        let mut report = ReconstructReport::empty(&assignment.id);
        let mut last_day = start;
        for day in walk.days() {
            let state = compute_day(
                assignment,
                day,
                prior.as_ref(),
                &inputs,
                self.model.as_ref(),
                &self.bands,
            )?;
            last_day = day;

            let stored = inputs.stored.get(&day);
            let unchanged = stored.is_some_and(|s| s.same_content(&state));
            let state = if unchanged {
                report.unchanged += 1;
                stored.cloned().unwrap_or(state)
            } else {
                self.store().upsert_daily_state(&state).await?;
                report.written += 1;
                state
            };
            report.states.push(state.clone());
            prior = Some(state);

            if propagate && unchanged && day > clamped.end {
                report.converged_on = Some(day);
                break;
            }
        }
        report.window = Some(DateWindow::new(start, last_day)?);

        if report.written > 0
            && let Some(latest) = self.store().latest_state(&assignment.id).await?
        {
            self.store()
                .sync_assignment_snapshot(&assignment.id, latest.population, latest.average_weight_g)
                .await?;
        }

        tracing::info!(
            assignment_id = %assignment.id,
            window = %walk,
            written = report.written,
            unchanged = report.unchanged,
            "reconstructed"
        );
        Ok(report)
    }

    /// First day to walk and the row before it. Moves back to the first
    /// missing day so the no-gap invariant holds.
    async fn resolve_start(
        &self,
        assignment: &Assignment,
        from: NaiveDate,
    ) -> Result<(NaiveDate, Option<DailyState>), EngineError> {
        if from <= assignment.start_date {
            return Ok((assignment.start_date, None));
        }
        match self.store().latest_state_before(&assignment.id, from).await? {
            None => Ok((assignment.start_date, None)),
            Some(prior) if prior.day < assignment.start_date => Ok((assignment.start_date, None)),
            Some(prior) => {
                let next = next_day(prior.day)?;
                if next < from {
                    tracing::debug!(assignment_id = %assignment.id, gap_from = %next, "filling gap");
                }
                Ok((next, Some(prior)))
            }
        }
    }

    async fn load_inputs(
        &self,
        assignment: &Assignment,
        walk: &DateWindow,
    ) -> Result<Inputs, EngineError> {
        let store = self.store();
        let config = store.cohort_config(&assignment.cohort_id).await?;
        let (set_name, coefficients) = self
            .config()
            .growth
            .coefficients(config.coefficient_set.as_deref())?;

        let mut anchors: HashMap<NaiveDate, Vec<Anchor>> = HashMap::new();
        for anchor in store.list_assignment_anchors(&assignment.id, walk).await? {
            anchors.entry(anchor.occurred_on).or_default().push(anchor);
        }
        let mut cohort_mortality: HashMap<NaiveDate, Vec<Anchor>> = HashMap::new();
        for anchor in store
            .list_cohort_level_mortality(&assignment.cohort_id, walk)
            .await?
        {
            cohort_mortality.entry(anchor.occurred_on).or_default().push(anchor);
        }

        let measured = store
            .list_temperature_readings(&assignment.id, walk)
            .await?
            .into_iter()
            .map(|r| (r.day, r.temperature_c))
            .collect();
        let profile = match config.temperature_profile_id.as_deref() {
            Some(profile_id) => store
                .list_profile_points(profile_id, walk)
                .await?
                .into_iter()
                .map(|p| (p.day, p.temperature_c))
                .collect(),
            None => HashMap::new(),
        };
        let feed = store
            .list_feed_records(&assignment.id, walk)
            .await?
            .into_iter()
            .map(|f| (f.day, f.feed_kg))
            .collect();
        let mut triggered = HashMap::new();
        for (day, activity_id) in store.triggered_activities_in(&assignment.id, walk).await? {
            triggered.entry(day).or_insert(activity_id);
        }
        let stored = store
            .list_daily_states(&assignment.id, walk)
            .await?
            .into_iter()
            .map(|s| (s.day, s))
            .collect();
        let cohort_assignments = if cohort_mortality.is_empty() {
            Vec::new()
        } else {
            store.list_cohort_assignments(&assignment.cohort_id).await?
        };

        Ok(Inputs {
            anchors,
            cohort_mortality,
            cohort_assignments,
            measured,
            profile,
            feed,
            triggered,
            stored,
            coefficient_set: set_name.to_string(),
            coefficients: coefficients.clone(),
            default_temperature_c: self.config().growth.default_temperature_c,
        })
    }
}

fn next_day(day: NaiveDate) -> Result<NaiveDate, CoreError> {
    day.checked_add_days(Days::new(1))
        .ok_or_else(|| CoreError::Validation(format!("day after {day} is out of range")))
}

/// Compute one day's row. `prior` is `None` only on the assignment's first day.
fn compute_day(
    assignment: &Assignment,
    day: NaiveDate,
    prior: Option<&DailyState>,
    inputs: &Inputs,
    model: &dyn GrowthModel,
    bands: &ConfidenceBands,
) -> Result<DailyState, CoreError> {
    let seed = prior.is_none();

    // Transfers and weighed treatments outrank samples, which outrank
    // mortality; within a tier the later record wins.
    let mut ranked: Vec<&Anchor> = inputs.anchors.get(&day).map_or_else(Vec::new, |v| v.iter().collect());
    ranked.sort_by(|a, b| {
        b.trust_tier
            .cmp(&a.trust_tier)
            .then(b.recorded_seq.cmp(&a.recorded_seq))
    });

    let (temperature_c, temperature_source) = if let Some(t) = inputs.measured.get(&day) {
        (*t, TemperatureSource::Measured)
    } else if let Some(t) = inputs.profile.get(&day) {
        (*t, TemperatureSource::Profile)
    } else {
        (inputs.default_temperature_c, TemperatureSource::Default)
    };

    let measured_weight = ranked.iter().find_map(|a| a.average_weight_g);
    let (average_weight_g, estimation_method) = match (measured_weight, prior) {
        (Some(w), _) => (w, EstimationMethod::Measured),
        (None, None) => (assignment.initial_weight_g, EstimationMethod::Measured),
        (None, Some(prior)) => {
            let measured_temp = inputs.measured.get(&day).copied();
            let grown = match model.daily_increment(
                prior.average_weight_g,
                measured_temp,
                &inputs.coefficients,
                day,
            ) {
                Ok(w) => w,
                Err(e) if e.is_data_gap() => model.daily_increment(
                    prior.average_weight_g,
                    Some(temperature_c),
                    &inputs.coefficients,
                    day,
                )?,
                Err(e) => return Err(e),
            };
            (grown, EstimationMethod::Interpolated)
        }
    };

    let mut provenance = Provenance {
        anchors: ranked.iter().map(|a| a.id.clone()).collect(),
        seed,
        temperature_source: Some(temperature_source),
        coefficient_set: inputs.coefficient_set.clone(),
        ..Provenance::default()
    };

    // The seed already counts the fish that arrived to open the assignment.
    let mut population = prior.map_or(assignment.initial_population, |p| p.population);
    for anchor in &ranked {
        if seed && anchor.is_inbound_transfer() {
            continue;
        }
        population += anchor.population_delta;
    }

    let cohort_mortality = inputs.cohort_mortality.get(&day).map_or(&[][..], Vec::as_slice);
    if !cohort_mortality.is_empty() {
        let active = inputs
            .cohort_assignments
            .iter()
            .filter(|a| a.is_active_on(day))
            .count();
        for anchor in cohort_mortality {
            if active == 1 {
                population += anchor.population_delta;
                provenance.anchors.push(anchor.id.clone());
            } else {
                provenance.unlinked_cohort_mortality.push(anchor.id.clone());
            }
        }
    }
    let population = population.max(0);

    let days_since_anchor = if seed || !ranked.is_empty() {
        0
    } else {
        prior.map_or(0, |p| p.days_since_anchor + 1)
    };
    let mut confidence_tier = bands.tier_for(Some(days_since_anchor));
    if !provenance.unlinked_cohort_mortality.is_empty() {
        confidence_tier = confidence_tier.downgrade();
    }

    let feed_kg = inputs.feed.get(&day).copied();
    let feed_conversion_ratio = prior.and_then(|p| {
        feed_conversion_ratio(
            feed_kg,
            weight_gain_kg(population, p.average_weight_g, average_weight_g),
        )
    });
    if feed_conversion_ratio.is_none() {
        provenance.fcr_note = Some(FCR_INSUFFICIENT_DATA.to_string());
    }

    Ok(DailyState {
        assignment_id: assignment.id.clone(),
        day,
        average_weight_g,
        population,
        biomass_kg: biomass_kg(population, average_weight_g),
        feed_kg,
        feed_conversion_ratio,
        confidence_tier,
        estimation_method,
        days_since_anchor,
        temperature_c: Some(temperature_c),
        provenance,
        triggered_activity_id: inputs.triggered.get(&day).cloned(),
        computed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Fixture, d};
    use pretty_assertions::assert_eq;
    use tide_core::entities::{FeedRecord, NewAnchor, ProfilePoint};
    use tide_core::enums::{AnchorSource, ConfidenceTier};
    use tide_core::growth::CubeRootTgc;

    #[tokio::test]
    async fn seeds_day_zero_and_fills_every_day() {
        let fx = Fixture::new(d(3, 11)).await;
        fx.assignment("asg-1", d(3, 1)).await;

        let report = fx.engine.reconstruct("asg-1", d(3, 1), d(3, 10)).await.unwrap();
        assert_eq!(report.written, 10);

        let states = fx.states("asg-1").await;
        assert_eq!(states.len(), 10);
        let seed = &states[0];
        assert_eq!(seed.estimation_method, EstimationMethod::Measured);
        assert!(seed.provenance.seed);
        assert!((seed.average_weight_g - 50.0).abs() < f64::EPSILON);
        assert_eq!(seed.population, 10_000);
        assert!(states[1..].iter().all(|s| s.estimation_method == EstimationMethod::Interpolated));
    }

    #[tokio::test]
    async fn rerun_is_idempotent_and_writes_nothing() {
        let fx = Fixture::new(d(3, 21)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.sample("asg-1", d(3, 6), 60.0).await;
        fx.mortality(Some("asg-1"), d(3, 8), 25).await;

        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 20)).await.unwrap();
        let first = fx.states("asg-1").await;

        let again = fx.engine.reconstruct("asg-1", d(3, 1), d(3, 20)).await.unwrap();
        assert_eq!(again.written, 0);
        assert_eq!(again.unchanged, 20);

        let second = fx.states("asg-1").await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn closed_form_matches_constant_profile() {
        let fx = Fixture::new(d(1, 31)).await;
        fx.assignment("asg-1", d(1, 1)).await;
        fx.profile_constant(d(1, 1), d(1, 31), 12.0).await;

        fx.engine.reconstruct("asg-1", d(1, 1), d(1, 11)).await.unwrap();
        let day10 = fx.state("asg-1", d(1, 11)).await;
        let expected = CubeRootTgc::project_weight(50.0, 12.0, 10, &GrowthCoefficients::default());
        assert!(
            (day10.average_weight_g - expected).abs() < 0.01,
            "got {} expected {expected}",
            day10.average_weight_g
        );
        assert_eq!(day10.provenance.temperature_source, Some(TemperatureSource::Profile));
    }

    #[tokio::test]
    async fn sample_overrides_weight_and_resets_confidence() {
        let fx = Fixture::new(d(5, 30)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.sample("asg-1", d(4, 1), 80.0).await;

        fx.engine.reconstruct("asg-1", d(3, 1), d(5, 30)).await.unwrap();
        let on_sample = fx.state("asg-1", d(4, 1)).await;
        assert_eq!(on_sample.estimation_method, EstimationMethod::Measured);
        assert!((on_sample.average_weight_g - 80.0).abs() < f64::EPSILON);
        assert_eq!(on_sample.days_since_anchor, 0);

        for (day, tier) in [
            (d(4, 6), ConfidenceTier::VeryHigh),
            (d(4, 16), ConfidenceTier::High),
            (d(5, 1), ConfidenceTier::Medium),
            (d(5, 21), ConfidenceTier::Low),
        ] {
            assert_eq!(fx.state("asg-1", day).await.confidence_tier, tier, "{day}");
        }
    }

    #[tokio::test]
    async fn higher_trust_and_later_record_win_ties() {
        let fx = Fixture::new(d(3, 10)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.sample("asg-1", d(3, 5), 61.0).await;
        fx.sample_with_source("gs-late", "asg-1", d(3, 5), 62.0).await;
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 10)).await.unwrap();
        assert!((fx.state("asg-1", d(3, 5)).await.average_weight_g - 62.0).abs() < f64::EPSILON);

        fx.weighed_treatment("asg-1", d(3, 5), 59.5).await;
        fx.engine.reconstruct("asg-1", d(3, 5), d(3, 5)).await.unwrap();
        let state = fx.state("asg-1", d(3, 5)).await;
        assert!((state.average_weight_g - 59.5).abs() < f64::EPSILON);
        assert_eq!(state.provenance.anchors.len(), 3);
    }

    #[tokio::test]
    async fn population_never_rises_without_inbound_transfer() {
        let fx = Fixture::new(d(3, 30)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.mortality(Some("asg-1"), d(3, 4), 120).await;
        fx.transfer_out("asg-1", d(3, 10), 2_000).await;
        fx.transfer_in("asg-1", d(3, 20), 500, 75.0).await;
        fx.mortality(Some("asg-1"), d(3, 25), 20_000).await;

        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 30)).await.unwrap();
        let states = fx.states("asg-1").await;
        for pair in states.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.day == d(3, 20) {
                assert_eq!(next.population, prev.population + 500);
            } else {
                assert!(next.population <= prev.population, "{}", next.day);
            }
        }
        assert_eq!(fx.state("asg-1", d(3, 25)).await.population, 0);
    }

    #[tokio::test]
    async fn cohort_mortality_applies_only_to_a_sole_assignment() {
        let fx = Fixture::new(d(3, 20)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.mortality(None, d(3, 5), 40).await;

        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 20)).await.unwrap();
        assert_eq!(fx.state("asg-1", d(3, 5)).await.population, 9_960);

        fx.assignment("asg-2", d(3, 8)).await;
        fx.mortality(None, d(3, 12), 30).await;
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 20)).await.unwrap();
        let split = fx.state("asg-1", d(3, 12)).await;
        assert_eq!(split.population, 9_960);
        assert_eq!(split.provenance.unlinked_cohort_mortality.len(), 1);
        let before = fx.state("asg-1", d(3, 11)).await;
        assert_eq!(split.confidence_tier, before.confidence_tier.downgrade());
    }

    #[tokio::test]
    async fn fcr_requires_feed_and_positive_gain() {
        let fx = Fixture::new(d(3, 5)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.profile_constant(d(3, 1), d(3, 5), 12.0).await;
        for (day, feed_kg) in [(d(3, 2), 5.0), (d(3, 3), 0.0)] {
            fx.engine
                .store()
                .upsert_feed_record(&FeedRecord {
                    assignment_id: "asg-1".into(),
                    day,
                    feed_kg,
                    cost: 0.0,
                })
                .await
                .unwrap();
        }
        // a lighter sample on day 4 means negative gain
        fx.sample("asg-1", d(3, 4), 40.0).await;
        fx.engine
            .store()
            .upsert_feed_record(&FeedRecord {
                assignment_id: "asg-1".into(),
                day: d(3, 4),
                feed_kg: 5.0,
                cost: 0.0,
            })
            .await
            .unwrap();

        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 5)).await.unwrap();
        let with_feed = fx.state("asg-1", d(3, 2)).await;
        let fcr = with_feed.feed_conversion_ratio.unwrap();
        let prior = fx.state("asg-1", d(3, 1)).await;
        let gain = weight_gain_kg(with_feed.population, prior.average_weight_g, with_feed.average_weight_g);
        assert!((fcr - 5.0 / gain).abs() < 1e-9);
        assert!(with_feed.provenance.fcr_note.is_none());

        for day in [d(3, 1), d(3, 3), d(3, 4), d(3, 5)] {
            let state = fx.state("asg-1", day).await;
            assert_eq!(state.feed_conversion_ratio, None, "{day}");
            assert_eq!(state.provenance.fcr_note.as_deref(), Some(FCR_INSUFFICIENT_DATA));
        }
    }

    #[tokio::test]
    async fn missing_temperature_falls_back_to_profile_then_default() {
        let fx = Fixture::new(d(3, 4)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.engine
            .store()
            .upsert_profile_point(&ProfilePoint {
                profile_id: "prof-1".into(),
                day: d(3, 2),
                temperature_c: 8.0,
            })
            .await
            .unwrap();
        fx.reading("asg-1", d(3, 3), 11.0).await;

        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 4)).await.unwrap();
        let sources: Vec<_> = fx
            .states("asg-1")
            .await
            .into_iter()
            .map(|s| s.provenance.temperature_source)
            .collect();
        assert_eq!(
            sources,
            vec![
                Some(TemperatureSource::Default),
                Some(TemperatureSource::Profile),
                Some(TemperatureSource::Measured),
                Some(TemperatureSource::Default),
            ]
        );
    }

    #[tokio::test]
    async fn gap_before_window_is_filled() {
        let fx = Fixture::new(d(3, 20)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 5)).await.unwrap();

        let report = fx.engine.reconstruct("asg-1", d(3, 15), d(3, 16)).await.unwrap();
        assert_eq!(report.window, Some(DateWindow::new(d(3, 6), d(3, 16)).unwrap()));
        assert_eq!(fx.states("asg-1").await.len(), 16);
    }

    #[tokio::test]
    async fn window_is_clamped_to_today_and_end_date() {
        let fx = Fixture::new(d(3, 10)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        let report = fx.engine.reconstruct("asg-1", d(2, 1), d(4, 30)).await.unwrap();
        assert_eq!(report.window, Some(DateWindow::new(d(3, 1), d(3, 10)).unwrap()));
    }

    #[tokio::test]
    async fn invalid_ranges_are_rejected() {
        let fx = Fixture::new(d(3, 10)).await;
        fx.assignment("asg-1", d(3, 1)).await;

        let reversed = fx.engine.reconstruct("asg-1", d(3, 5), d(3, 4)).await.unwrap_err();
        assert!(matches!(reversed.core(), Some(CoreError::InvalidRange { .. })));
        let before_start = fx.engine.reconstruct("asg-1", d(2, 1), d(2, 20)).await.unwrap_err();
        assert!(matches!(before_start.core(), Some(CoreError::InvalidRange { .. })));
        let unknown = fx.engine.reconstruct("asg-x", d(3, 1), d(3, 2)).await.unwrap_err();
        assert!(unknown.is_not_found());
    }

    #[tokio::test]
    async fn propagation_stops_when_rows_converge() {
        let fx = Fixture::new(d(3, 30)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 30)).await.unwrap();

        // mortality changes every later population; propagation must reach the end
        fx.mortality(Some("asg-1"), d(3, 10), 5).await;
        let report = fx
            .engine
            .reconstruct_and_propagate("asg-1", DateWindow::around(d(3, 10), 1))
            .await
            .unwrap();
        assert_eq!(report.converged_on, None);
        assert_eq!(fx.state("asg-1", d(3, 30)).await.population, 9_995);

        // nothing changed: stops on the first day after the window
        let again = fx
            .engine
            .reconstruct_and_propagate("asg-1", DateWindow::around(d(3, 10), 1))
            .await
            .unwrap();
        assert_eq!(again.written, 0);
        assert_eq!(again.converged_on, Some(d(3, 12)));
    }

    #[tokio::test]
    async fn snapshot_is_synced_to_assignment() {
        let fx = Fixture::new(d(3, 10)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.mortality(Some("asg-1"), d(3, 3), 100).await;
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 10)).await.unwrap();

        let asg = fx.engine.store().get_assignment("asg-1").await.unwrap();
        let latest = fx.state("asg-1", d(3, 10)).await;
        assert_eq!(asg.population_count, 9_900);
        assert!((asg.average_weight_g - latest.average_weight_g).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn inbound_transfer_on_seed_day_is_not_double_counted() {
        let fx = Fixture::new(d(3, 3)).await;
        fx.assignment("asg-1", d(3, 1)).await;
        fx.engine
            .store()
            .append_anchor(&NewAnchor {
                source_type: AnchorSource::Transfer,
                source_id: "tr-open".into(),
                cohort_id: "coh-1".into(),
                assignment_id: Some("asg-1".into()),
                occurred_on: d(3, 1),
                population_delta: 10_000,
                average_weight_g: Some(52.0),
                raw: serde_json::json!({}),
            })
            .await
            .unwrap();
        fx.engine.reconstruct("asg-1", d(3, 1), d(3, 3)).await.unwrap();
        let seed = fx.state("asg-1", d(3, 1)).await;
        assert_eq!(seed.population, 10_000);
        assert!((seed.average_weight_g - 52.0).abs() < f64::EPSILON);
    }
}
