//! Daily state repository.
//!
//! Rows are keyed by `(assignment_id, day)` and only ever written as a full
//! replace, so concurrent recomputes of the same day converge on the last
//! writer's row.

use chrono::NaiveDate;

use tide_core::entities::DailyState;
use tide_core::window::DateWindow;

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_date, fmt_datetime, get_opt_string, opt, parse_date, parse_datetime, parse_enum,
    parse_json, to_json,
};
use crate::service::TideService;

const SELECT_COLS: &str = "assignment_id, day, average_weight_g, population, biomass_kg, feed_kg, \
     feed_conversion_ratio, confidence_tier, estimation_method, days_since_anchor, temperature_c, \
     provenance, triggered_activity_id, computed_at";

fn row_to_state(row: &libsql::Row) -> Result<DailyState, DatabaseError> {
    Ok(DailyState {
        assignment_id: row.get(0)?,
        day: parse_date(&row.get::<String>(1)?)?,
        average_weight_g: row.get(2)?,
        population: row.get(3)?,
        biomass_kg: row.get(4)?,
        feed_kg: row.get::<Option<f64>>(5)?,
        feed_conversion_ratio: row.get::<Option<f64>>(6)?,
        confidence_tier: parse_enum(&row.get::<String>(7)?)?,
        estimation_method: parse_enum(&row.get::<String>(8)?)?,
        days_since_anchor: row.get(9)?,
        temperature_c: row.get::<Option<f64>>(10)?,
        provenance: parse_json(&row.get::<String>(11)?)?,
        triggered_activity_id: get_opt_string(row, 12)?,
        computed_at: parse_datetime(&row.get::<String>(13)?)?,
    })
}

impl TideService {
    /// Replace the row for `(state.assignment_id, state.day)`.
    pub async fn upsert_daily_state(&self, state: &DailyState) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                &format!(
                    "INSERT INTO daily_states ({SELECT_COLS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                     ON CONFLICT(assignment_id, day) DO UPDATE SET
                        average_weight_g = excluded.average_weight_g,
                        population = excluded.population,
                        biomass_kg = excluded.biomass_kg,
                        feed_kg = excluded.feed_kg,
                        feed_conversion_ratio = excluded.feed_conversion_ratio,
                        confidence_tier = excluded.confidence_tier,
                        estimation_method = excluded.estimation_method,
                        days_since_anchor = excluded.days_since_anchor,
                        temperature_c = excluded.temperature_c,
                        provenance = excluded.provenance,
                        triggered_activity_id = excluded.triggered_activity_id,
                        computed_at = excluded.computed_at"
                ),
                vec![
                    state.assignment_id.as_str().into(),
                    fmt_date(state.day).into(),
                    state.average_weight_g.into(),
                    state.population.into(),
                    state.biomass_kg.into(),
                    opt(state.feed_kg),
                    opt(state.feed_conversion_ratio),
                    state.confidence_tier.as_str().into(),
                    state.estimation_method.as_str().into(),
                    state.days_since_anchor.into(),
                    opt(state.temperature_c),
                    to_json(&state.provenance)?.into(),
                    opt(state.triggered_activity_id.clone()),
                    fmt_datetime(state.computed_at).into(),
                ],
            )
            .await?;
        Ok(())
    }

    pub async fn get_daily_state(
        &self,
        assignment_id: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyState>, DatabaseError> {
        self.first_state(
            &format!("SELECT {SELECT_COLS} FROM daily_states WHERE assignment_id = ?1 AND day = ?2"),
            vec![assignment_id.into(), fmt_date(day).into()],
        )
        .await
    }

    /// The most recent row strictly before `day`.
    pub async fn latest_state_before(
        &self,
        assignment_id: &str,
        day: NaiveDate,
    ) -> Result<Option<DailyState>, DatabaseError> {
        self.first_state(
            &format!(
                "SELECT {SELECT_COLS} FROM daily_states
                 WHERE assignment_id = ?1 AND day < ?2
                 ORDER BY day DESC LIMIT 1"
            ),
            vec![assignment_id.into(), fmt_date(day).into()],
        )
        .await
    }

    /// The most recent row for the assignment.
    pub async fn latest_state(
        &self,
        assignment_id: &str,
    ) -> Result<Option<DailyState>, DatabaseError> {
        self.first_state(
            &format!(
                "SELECT {SELECT_COLS} FROM daily_states
                 WHERE assignment_id = ?1 ORDER BY day DESC LIMIT 1"
            ),
            vec![assignment_id.into()],
        )
        .await
    }

    /// Rows within `window`, ordered by day.
    pub async fn list_daily_states(
        &self,
        assignment_id: &str,
        window: &DateWindow,
    ) -> Result<Vec<DailyState>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {SELECT_COLS} FROM daily_states
                     WHERE assignment_id = ?1 AND day >= ?2 AND day <= ?3
                     ORDER BY day"
                ),
                vec![
                    assignment_id.into(),
                    fmt_date(window.start).into(),
                    fmt_date(window.end).into(),
                ],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_state(&row)?);
        }
        Ok(out)
    }

    /// Point the day's row at the activity its state triggered.
    pub async fn set_triggered_activity(
        &self,
        assignment_id: &str,
        day: NaiveDate,
        activity_id: &str,
    ) -> Result<(), DatabaseError> {
        self.db()
            .execute_with(
                "UPDATE daily_states SET triggered_activity_id = ?1
                 WHERE assignment_id = ?2 AND day = ?3",
                vec![activity_id.into(), assignment_id.into(), fmt_date(day).into()],
            )
            .await?;
        Ok(())
    }

    async fn first_state(
        &self,
        sql: &str,
        params: Vec<libsql::Value>,
    ) -> Result<Option<DailyState>, DatabaseError> {
        let mut rows = self.db().query_with(sql, params).await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_state(&row)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{d, test_service};
    use chrono::Utc;
    use pretty_assertions::assert_eq;
    use tide_core::entities::Provenance;
    use tide_core::enums::{ConfidenceTier, EstimationMethod, TemperatureSource};

    fn state(day: NaiveDate, weight: f64) -> DailyState {
        DailyState {
            assignment_id: "asg-1".into(),
            day,
            average_weight_g: weight,
            population: 1000,
            biomass_kg: 1000.0 * weight / 1000.0,
            feed_kg: Some(2.5),
            feed_conversion_ratio: None,
            confidence_tier: ConfidenceTier::High,
            estimation_method: EstimationMethod::Interpolated,
            days_since_anchor: 12,
            temperature_c: Some(11.0),
            provenance: Provenance {
                anchors: vec!["anc-1".into()],
                temperature_source: Some(TemperatureSource::Profile),
                coefficient_set: "default".into(),
                fcr_note: Some("insufficient_data".into()),
                ..Provenance::default()
            },
            triggered_activity_id: None,
            computed_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_replaces_whole_row() {
        let svc = test_service().await;
        svc.upsert_daily_state(&state(d(3, 1), 60.0)).await.unwrap();

        let mut replacement = state(d(3, 1), 61.0);
        replacement.feed_kg = None;
        replacement.estimation_method = EstimationMethod::Measured;
        svc.upsert_daily_state(&replacement).await.unwrap();

        let stored = svc.get_daily_state("asg-1", d(3, 1)).await.unwrap().unwrap();
        assert!(stored.same_content(&replacement));
        assert_eq!(stored.feed_kg, None);
    }

    #[tokio::test]
    async fn latest_queries_and_range() {
        let svc = test_service().await;
        for day in 1..=5 {
            svc.upsert_daily_state(&state(d(3, day), 50.0 + f64::from(day)))
                .await
                .unwrap();
        }

        let before = svc.latest_state_before("asg-1", d(3, 4)).await.unwrap().unwrap();
        assert_eq!(before.day, d(3, 3));
        assert!(svc.latest_state_before("asg-1", d(3, 1)).await.unwrap().is_none());
        assert_eq!(svc.latest_state("asg-1").await.unwrap().unwrap().day, d(3, 5));

        let window = DateWindow::new(d(3, 2), d(3, 4)).unwrap();
        let days: Vec<_> = svc
            .list_daily_states("asg-1", &window)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.day)
            .collect();
        assert_eq!(days, vec![d(3, 2), d(3, 3), d(3, 4)]);
    }

    #[tokio::test]
    async fn triggered_activity_back_reference() {
        let svc = test_service().await;
        svc.upsert_daily_state(&state(d(3, 1), 60.0)).await.unwrap();
        svc.set_triggered_activity("asg-1", d(3, 1), "act-1").await.unwrap();
        let stored = svc.get_daily_state("asg-1", d(3, 1)).await.unwrap().unwrap();
        assert_eq!(stored.triggered_activity_id.as_deref(), Some("act-1"));
    }
}
