//! Cohort configuration, baseline plans, templates, planned activities and
//! per-(assignment, template) trigger state.

use chrono::{NaiveDate, Utc};

use tide_core::entities::{
    BaselinePlan, CohortConfig, PlanTemplate, PlannedActivity, TriggerState,
};
use tide_core::enums::TriggerStatus;
use tide_core::errors::CoreError;
use tide_core::ids::PREFIX_ACTIVITY;
use tide_core::window::DateWindow;

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_date, fmt_datetime, get_opt_string, opt, parse_date, parse_datetime, parse_enum,
    parse_json, parse_optional_date, to_json,
};
use crate::service::TideService;

const ACTIVITY_COLS: &str = "id, cohort_id, assignment_id, template_id, activity_type, due_date, \
     completed_on, idempotency_key, trigger_day, created_at";

fn row_to_activity(row: &libsql::Row) -> Result<PlannedActivity, DatabaseError> {
    Ok(PlannedActivity {
        id: row.get(0)?,
        cohort_id: row.get(1)?,
        assignment_id: get_opt_string(row, 2)?,
        template_id: get_opt_string(row, 3)?,
        activity_type: row.get(4)?,
        due_date: parse_date(&row.get::<String>(5)?)?,
        completed_on: parse_optional_date(get_opt_string(row, 6)?.as_deref())?,
        idempotency_key: get_opt_string(row, 7)?,
        trigger_day: parse_optional_date(get_opt_string(row, 8)?.as_deref())?,
        created_at: parse_datetime(&row.get::<String>(9)?)?,
    })
}

fn row_to_template(row: &libsql::Row) -> Result<PlanTemplate, DatabaseError> {
    Ok(PlanTemplate {
        id: row.get(0)?,
        plan_id: row.get(1)?,
        name: row.get(2)?,
        activity_type: row.get(3)?,
        trigger: parse_json(&row.get::<String>(4)?)?,
        lead_days: row.get(5)?,
        active: row.get::<i64>(6)? != 0,
    })
}

/// Fields of a planned activity before it has an id.
#[derive(Debug, Clone)]
pub struct NewActivity<'a> {
    pub cohort_id: &'a str,
    pub assignment_id: Option<&'a str>,
    pub template_id: Option<&'a str>,
    pub activity_type: &'a str,
    pub due_date: NaiveDate,
    pub idempotency_key: Option<&'a str>,
    pub trigger_day: Option<NaiveDate>,
}

impl TideService {
    // ---- cohort configuration -------------------------------------------

    pub async fn upsert_cohort_config(&self, config: &CohortConfig) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                "INSERT INTO cohort_configs (cohort_id, temperature_profile_id, coefficient_set,
                    baseline_plan_id, scenario_id, target_weight_g)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(cohort_id) DO UPDATE SET
                    temperature_profile_id = excluded.temperature_profile_id,
                    coefficient_set = excluded.coefficient_set,
                    baseline_plan_id = excluded.baseline_plan_id,
                    scenario_id = excluded.scenario_id,
                    target_weight_g = excluded.target_weight_g",
                vec![
                    config.cohort_id.as_str().into(),
                    opt(config.temperature_profile_id.clone()),
                    opt(config.coefficient_set.clone()),
                    opt(config.baseline_plan_id.clone()),
                    opt(config.scenario_id.clone()),
                    opt(config.target_weight_g),
                ],
            )
            .await?;
        Ok(())
    }

    /// Cohort configuration, or an empty one when the cohort has none.
    pub async fn cohort_config(&self, cohort_id: &str) -> Result<CohortConfig, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT cohort_id, temperature_profile_id, coefficient_set, baseline_plan_id,
                    scenario_id, target_weight_g
                 FROM cohort_configs WHERE cohort_id = ?1",
                vec![cohort_id.into()],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(CohortConfig {
                cohort_id: cohort_id.to_string(),
                temperature_profile_id: None,
                coefficient_set: None,
                baseline_plan_id: None,
                scenario_id: None,
                target_weight_g: None,
            });
        };
        Ok(CohortConfig {
            cohort_id: row.get(0)?,
            temperature_profile_id: get_opt_string(&row, 1)?,
            coefficient_set: get_opt_string(&row, 2)?,
            baseline_plan_id: get_opt_string(&row, 3)?,
            scenario_id: get_opt_string(&row, 4)?,
            target_weight_g: row.get::<Option<f64>>(5)?,
        })
    }

    // ---- baseline plans -------------------------------------------------

    pub async fn upsert_baseline_plan(&self, plan: &BaselinePlan) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                "INSERT INTO baseline_plans (id, cohort_id, scenario_id, start_date)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(id) DO UPDATE SET
                    cohort_id = excluded.cohort_id,
                    scenario_id = excluded.scenario_id,
                    start_date = excluded.start_date",
                vec![
                    plan.id.as_str().into(),
                    plan.cohort_id.as_str().into(),
                    opt(plan.scenario_id.clone()),
                    fmt_date(plan.start_date).into(),
                ],
            )
            .await?;
        Ok(())
    }

    /// The cohort's baseline plan.
    ///
    /// Fails with `MissingBaseline` when the cohort has no plan attached and
    /// `NotFound` when the attached id does not resolve.
    pub async fn baseline_plan(&self, cohort_id: &str) -> Result<BaselinePlan, DatabaseError> {
        let config = self.cohort_config(cohort_id).await?;
        let plan_id = config.baseline_plan_id()?;
        let mut rows = self
            .db()
            .query_with(
                "SELECT id, cohort_id, scenario_id, start_date FROM baseline_plans WHERE id = ?1",
                vec![plan_id.into()],
            )
            .await?;
        let row = rows
            .next()
            .await?
            .ok_or_else(|| CoreError::not_found("baseline_plan", plan_id))?;
        Ok(BaselinePlan {
            id: row.get(0)?,
            cohort_id: row.get(1)?,
            scenario_id: get_opt_string(&row, 2)?,
            start_date: parse_date(&row.get::<String>(3)?)?,
        })
    }

    // ---- templates ------------------------------------------------------

    pub async fn upsert_plan_template(&self, template: &PlanTemplate) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                "INSERT INTO plan_templates (id, plan_id, name, activity_type, trigger_json,
                    lead_days, active)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT(id) DO UPDATE SET
                    plan_id = excluded.plan_id,
                    name = excluded.name,
                    activity_type = excluded.activity_type,
                    trigger_json = excluded.trigger_json,
                    lead_days = excluded.lead_days,
                    active = excluded.active",
                vec![
                    template.id.as_str().into(),
                    template.plan_id.as_str().into(),
                    template.name.as_str().into(),
                    template.activity_type.as_str().into(),
                    to_json(&template.trigger)?.into(),
                    template.lead_days.into(),
                    i64::from(template.active).into(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn list_active_templates(
        &self,
        plan_id: &str,
    ) -> Result<Vec<PlanTemplate>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT id, plan_id, name, activity_type, trigger_json, lead_days, active
                 FROM plan_templates WHERE plan_id = ?1 AND active = 1 ORDER BY id",
                vec![plan_id.into()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_template(&row)?);
        }
        Ok(out)
    }

    // ---- planned activities --------------------------------------------

    /// Insert a planned activity.
    ///
    /// When `idempotency_key` is set and an activity with that key already
    /// exists, nothing is written and the existing activity is returned with
    /// `false`.
    pub async fn insert_planned_activity(
        &self,
        new: &NewActivity<'_>,
    ) -> Result<(PlannedActivity, bool), DatabaseError> {
        let id = self.db().generate_id(PREFIX_ACTIVITY).await?;
        let now = Utc::now();
        let written = self
            .db()
            .execute_with(
                &format!(
                    "INSERT INTO planned_activities ({ACTIVITY_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, NULL, ?7, ?8, ?9)
                     ON CONFLICT(idempotency_key) DO NOTHING"
                ),
                vec![
                    id.as_str().into(),
                    new.cohort_id.into(),
                    opt(new.assignment_id),
                    opt(new.template_id),
                    new.activity_type.into(),
                    fmt_date(new.due_date).into(),
                    opt(new.idempotency_key),
                    opt(new.trigger_day.map(fmt_date)),
                    fmt_datetime(now).into(),
                ],
            )
            .await?;

        if written == 0 {
            let key = new.idempotency_key.unwrap_or_default();
            let existing = self
                .activity_by_idempotency_key(key)
                .await?
                .ok_or(DatabaseError::NoResult)?;
            return Ok((existing, false));
        }
        Ok((self.get_planned_activity(&id).await?, true))
    }

    pub async fn get_planned_activity(&self, id: &str) -> Result<PlannedActivity, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {ACTIVITY_COLS} FROM planned_activities WHERE id = ?1"),
                vec![id.into()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => row_to_activity(&row),
            None => Err(CoreError::not_found("planned_activity", id).into()),
        }
    }

    pub async fn activity_by_idempotency_key(
        &self,
        key: &str,
    ) -> Result<Option<PlannedActivity>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {ACTIVITY_COLS} FROM planned_activities WHERE idempotency_key = ?1"
                ),
                vec![key.into()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_activity(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_assignment_activities(
        &self,
        assignment_id: &str,
    ) -> Result<Vec<PlannedActivity>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {ACTIVITY_COLS} FROM planned_activities
                     WHERE assignment_id = ?1 ORDER BY due_date, id"
                ),
                vec![assignment_id.into()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_activity(&row)?);
        }
        Ok(out)
    }

    /// Whether an open activity for the assignment is due on or after `day`.
    pub async fn has_open_activity_due_from(
        &self,
        assignment_id: &str,
        day: NaiveDate,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT 1 FROM planned_activities
                 WHERE assignment_id = ?1 AND completed_on IS NULL AND due_date >= ?2
                 LIMIT 1",
                vec![assignment_id.into(), fmt_date(day).into()],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// `(trigger_day, activity_id)` for activities triggered by the
    /// assignment's states within `window`.
    pub async fn triggered_activities_in(
        &self,
        assignment_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<(NaiveDate, String)>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT trigger_day, id FROM planned_activities
                 WHERE assignment_id = ?1 AND trigger_day >= ?2 AND trigger_day <= ?3
                 ORDER BY trigger_day, created_at, id",
                vec![
                    assignment_id.into(),
                    fmt_date(window.start).into(),
                    fmt_date(window.end).into(),
                ],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push((parse_date(&row.get::<String>(0)?)?, row.get::<String>(1)?));
        }
        Ok(out)
    }

    pub async fn complete_activity(
        &self,
        activity_id: &str,
        completed_on: NaiveDate,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .db()
            .execute_with(
                "UPDATE planned_activities SET completed_on = ?1 WHERE id = ?2",
                vec![fmt_date(completed_on).into(), activity_id.into()],
            )
            .await?;
        if changed == 0 {
            return Err(CoreError::not_found("planned_activity", activity_id).into());
        }
        Ok(())
    }

    // ---- trigger state --------------------------------------------------

    pub async fn trigger_state(
        &self,
        assignment_id: &str,
        template_id: &str,
    ) -> Result<TriggerState, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT assignment_id, template_id, status, triggered_on, activity_id
                 FROM trigger_states WHERE assignment_id = ?1 AND template_id = ?2",
                vec![assignment_id.into(), template_id.into()],
            )
            .await?;
        let Some(row) = rows.next().await? else {
            return Ok(TriggerState {
                assignment_id: assignment_id.to_string(),
                template_id: template_id.to_string(),
                status: TriggerStatus::NotTriggered,
                triggered_on: None,
                activity_id: None,
            });
        };
        Ok(TriggerState {
            assignment_id: row.get(0)?,
            template_id: row.get(1)?,
            status: parse_enum(&row.get::<String>(2)?)?,
            triggered_on: parse_optional_date(get_opt_string(&row, 3)?.as_deref())?,
            activity_id: get_opt_string(&row, 4)?,
        })
    }

    /// Move `(assignment, template)` to `TRIGGERED`. A state already
    /// triggered is left untouched; returns whether this call made the move.
    pub async fn mark_triggered(
        &self,
        assignment_id: &str,
        template_id: &str,
        triggered_on: NaiveDate,
        activity_id: &str,
    ) -> Result<bool, DatabaseError> {
        let changed = self
            .db()
            .execute_with(
                "INSERT INTO trigger_states (assignment_id, template_id, status, triggered_on, activity_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(assignment_id, template_id) DO UPDATE SET
                    status = excluded.status,
                    triggered_on = excluded.triggered_on,
                    activity_id = excluded.activity_id
                 WHERE trigger_states.status = ?6",
                vec![
                    assignment_id.into(),
                    template_id.into(),
                    TriggerStatus::Triggered.as_str().into(),
                    fmt_date(triggered_on).into(),
                    activity_id.into(),
                    TriggerStatus::NotTriggered.as_str().into(),
                ],
            )
            .await?;
        Ok(changed > 0)
    }
}
