//! Shared fixture for engine unit tests.

use std::sync::Arc;

use chrono::NaiveDate;
use tide_config::TideConfig;
use tide_core::clock::FixedClock;
use tide_core::entities::{
    Assignment, BaselinePlan, CohortConfig, DailyState, NewAnchor, PlanTemplate, ProfilePoint,
    TemperatureReading, TriggerKind,
};
use tide_core::enums::AnchorSource;
use tide_core::window::DateWindow;
use tide_db::repos::plan::NewActivity;
use tide_db::service::TideService;

use crate::Engine;

pub fn d(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

/// 10 000 fish at 50 g in cohort `coh-1`.
pub fn assignment(id: &str, start: NaiveDate) -> Assignment {
    Assignment {
        id: id.into(),
        cohort_id: "coh-1".into(),
        enclosure_id: format!("pen-{id}"),
        start_date: start,
        end_date: None,
        initial_population: 10_000,
        initial_weight_g: 50.0,
        population_count: 10_000,
        average_weight_g: 50.0,
        lifecycle_stage: None,
    }
}

pub struct Fixture {
    pub engine: Engine,
}

impl Fixture {
    pub async fn new(today: NaiveDate) -> Self {
        Self::with_config(today, TideConfig::default()).await
    }

    pub async fn with_config(today: NaiveDate, config: TideConfig) -> Self {
        let store = Arc::new(TideService::in_memory().await.unwrap());
        let engine = Engine::new(store, Arc::new(config)).with_clock(Arc::new(FixedClock(today)));
        let fx = Self { engine };
        fx.cohort(|_| {}).await;
        fx
    }

    /// Rewrite `coh-1`'s config: profile `prof-1`, scenario `scn-1`, then `edit`.
    pub async fn cohort(&self, edit: impl FnOnce(&mut CohortConfig)) {
        let mut config = self.engine.store().cohort_config("coh-1").await.unwrap();
        config.temperature_profile_id.get_or_insert_with(|| "prof-1".into());
        config.scenario_id.get_or_insert_with(|| "scn-1".into());
        edit(&mut config);
        self.engine.store().upsert_cohort_config(&config).await.unwrap();
    }

    pub async fn target(&self, grams: f64) {
        self.cohort(|c| c.target_weight_g = Some(grams)).await;
    }

    pub async fn assignment(&self, id: &str, start: NaiveDate) {
        self.engine
            .store()
            .upsert_assignment(&assignment(id, start))
            .await
            .unwrap();
    }

    /// Attach baseline plan `pln-1` starting on `start`.
    pub async fn baseline(&self, start: NaiveDate) {
        self.engine
            .store()
            .upsert_baseline_plan(&BaselinePlan {
                id: "pln-1".into(),
                cohort_id: "coh-1".into(),
                scenario_id: Some("scn-1".into()),
                start_date: start,
            })
            .await
            .unwrap();
        self.cohort(|c| c.baseline_plan_id = Some("pln-1".into())).await;
    }

    pub async fn template(&self, id: &str, trigger: TriggerKind, lead_days: i64) {
        self.engine
            .store()
            .upsert_plan_template(&PlanTemplate {
                id: id.into(),
                plan_id: "pln-1".into(),
                name: id.into(),
                activity_type: "grading".into(),
                trigger,
                lead_days,
                active: true,
            })
            .await
            .unwrap();
    }

    /// Plan an activity by hand and return its id.
    pub async fn manual_activity(&self, activity_type: &str, assignment_id: &str, due: NaiveDate) -> String {
        let (activity, _) = self
            .engine
            .store()
            .insert_planned_activity(&NewActivity {
                cohort_id: "coh-1",
                assignment_id: Some(assignment_id),
                template_id: None,
                activity_type,
                due_date: due,
                idempotency_key: None,
                trigger_day: None,
            })
            .await
            .unwrap();
        activity.id
    }

    pub async fn profile_constant(&self, from: NaiveDate, to: NaiveDate, temperature_c: f64) {
        for day in DateWindow::new(from, to).unwrap().days() {
            self.engine
                .store()
                .upsert_profile_point(&ProfilePoint {
                    profile_id: "prof-1".into(),
                    day,
                    temperature_c,
                })
                .await
                .unwrap();
        }
    }

    pub async fn reading(&self, assignment_id: &str, day: NaiveDate, temperature_c: f64) {
        self.engine
            .store()
            .upsert_temperature_reading(&TemperatureReading {
                assignment_id: assignment_id.into(),
                day,
                temperature_c,
            })
            .await
            .unwrap();
    }

    async fn anchor(
        &self,
        source_type: AnchorSource,
        source_id: String,
        assignment_id: Option<&str>,
        day: NaiveDate,
        population_delta: i64,
        average_weight_g: Option<f64>,
    ) {
        self.engine
            .store()
            .append_anchor(&NewAnchor {
                source_type,
                source_id,
                cohort_id: "coh-1".into(),
                assignment_id: assignment_id.map(str::to_string),
                occurred_on: day,
                population_delta,
                average_weight_g,
                raw: serde_json::json!({}),
            })
            .await
            .unwrap();
    }

    pub async fn sample(&self, assignment_id: &str, day: NaiveDate, weight_g: f64) {
        self.sample_with_source(&format!("gs-{assignment_id}-{day}"), assignment_id, day, weight_g)
            .await;
    }

    pub async fn sample_with_source(&self, source_id: &str, assignment_id: &str, day: NaiveDate, weight_g: f64) {
        self.anchor(AnchorSource::Sample, source_id.into(), Some(assignment_id), day, 0, Some(weight_g))
            .await;
    }

    pub async fn weighed_treatment(&self, assignment_id: &str, day: NaiveDate, weight_g: f64) {
        self.anchor(
            AnchorSource::Treatment,
            format!("tx-{assignment_id}-{day}"),
            Some(assignment_id),
            day,
            0,
            Some(weight_g),
        )
        .await;
    }

    pub async fn mortality(&self, assignment_id: Option<&str>, day: NaiveDate, count: i64) {
        self.anchor(
            AnchorSource::Mortality,
            format!("mo-{}-{day}", assignment_id.unwrap_or("cohort")),
            assignment_id,
            day,
            -count,
            None,
        )
        .await;
    }

    pub async fn transfer_out(&self, assignment_id: &str, day: NaiveDate, count: i64) {
        self.anchor(
            AnchorSource::Transfer,
            format!("tr-out-{assignment_id}-{day}"),
            Some(assignment_id),
            day,
            -count,
            None,
        )
        .await;
    }

    pub async fn transfer_in(&self, assignment_id: &str, day: NaiveDate, count: i64, weight_g: f64) {
        self.anchor(
            AnchorSource::Transfer,
            format!("tr-in-{assignment_id}-{day}"),
            Some(assignment_id),
            day,
            count,
            Some(weight_g),
        )
        .await;
    }

    pub async fn states(&self, assignment_id: &str) -> Vec<DailyState> {
        self.engine
            .store()
            .list_daily_states(
                assignment_id,
                &DateWindow::new(d(1, 1), d(12, 31)).unwrap(),
            )
            .await
            .unwrap()
    }

    pub async fn state(&self, assignment_id: &str, day: NaiveDate) -> DailyState {
        self.engine
            .store()
            .get_daily_state(assignment_id, day)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("no state for {assignment_id} on {day}"))
    }
}
