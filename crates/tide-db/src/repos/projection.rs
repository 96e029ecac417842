//! Forward projection runs and their per-day rows.
//!
//! Each `(assignment, as_of)` run is written whole inside a transaction.
//! Runs with an earlier `as_of` are kept until the retention window prunes them.

use chrono::NaiveDate;

use tide_core::entities::{ForwardProjection, ProjectionRun};

use crate::error::DatabaseError;
use crate::helpers::{
    fmt_date, fmt_datetime, get_opt_string, opt, parse_date, parse_datetime, parse_enum,
    parse_optional_date,
};
use crate::service::TideService;

const RUN_COLS: &str = "assignment_id, as_of, horizon_days, temperature_bias, target_weight_g, \
     crossing_date, tier, created_at";
const ROW_COLS: &str = "assignment_id, as_of, day, projected_weight_g, projected_population, \
     projected_biomass_kg, applied_temperature_bias, crossing_tier";

fn row_to_run(row: &libsql::Row) -> Result<ProjectionRun, DatabaseError> {
    Ok(ProjectionRun {
        assignment_id: row.get(0)?,
        as_of: parse_date(&row.get::<String>(1)?)?,
        horizon_days: row.get(2)?,
        temperature_bias: row.get(3)?,
        target_weight_g: row.get(4)?,
        crossing_date: parse_optional_date(get_opt_string(row, 5)?.as_deref())?,
        tier: parse_enum(&row.get::<String>(6)?)?,
        created_at: parse_datetime(&row.get::<String>(7)?)?,
    })
}

fn row_to_projection(row: &libsql::Row) -> Result<ForwardProjection, DatabaseError> {
    Ok(ForwardProjection {
        assignment_id: row.get(0)?,
        as_of: parse_date(&row.get::<String>(1)?)?,
        day: parse_date(&row.get::<String>(2)?)?,
        projected_weight_g: row.get(3)?,
        projected_population: row.get(4)?,
        projected_biomass_kg: row.get(5)?,
        applied_temperature_bias: row.get(6)?,
        crossing_tier: parse_enum(&row.get::<String>(7)?)?,
    })
}

impl TideService {
    /// Replace the run for `(run.assignment_id, run.as_of)` and all its rows.
    pub async fn save_projection(
        &self,
        run: &ProjectionRun,
        series: &[ForwardProjection],
    ) -> Result<(), DatabaseError> {
        let assignment_id = run.assignment_id.as_str();
        let as_of = fmt_date(run.as_of);

        let tx = self.db().conn().transaction().await?;
        tx.execute(
            "DELETE FROM forward_projections WHERE assignment_id = ?1 AND as_of = ?2",
            libsql::params_from_iter(vec![
                libsql::Value::from(assignment_id),
                libsql::Value::from(as_of.as_str()),
            ]),
        )
        .await?;
        tx.execute(
            &format!(
                "INSERT INTO projection_runs ({RUN_COLS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(assignment_id, as_of) DO UPDATE SET
                    horizon_days = excluded.horizon_days,
                    temperature_bias = excluded.temperature_bias,
                    target_weight_g = excluded.target_weight_g,
                    crossing_date = excluded.crossing_date,
                    tier = excluded.tier,
                    created_at = excluded.created_at"
            ),
            libsql::params_from_iter(vec![
                libsql::Value::from(assignment_id),
                as_of.as_str().into(),
                run.horizon_days.into(),
                run.temperature_bias.into(),
                run.target_weight_g.into(),
                opt(run.crossing_date.map(fmt_date)),
                run.tier.as_str().into(),
                fmt_datetime(run.created_at).into(),
            ]),
        )
        .await?;
        for p in series {
            tx.execute(
                &format!("INSERT INTO forward_projections ({ROW_COLS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
                libsql::params_from_iter(vec![
                    libsql::Value::from(p.assignment_id.as_str()),
                    fmt_date(p.as_of).into(),
                    fmt_date(p.day).into(),
                    p.projected_weight_g.into(),
                    p.projected_population.into(),
                    p.projected_biomass_kg.into(),
                    p.applied_temperature_bias.into(),
                    p.crossing_tier.as_str().into(),
                ]),
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// The newest run for the assignment.
    pub async fn latest_projection_run(
        &self,
        assignment_id: &str,
    ) -> Result<Option<ProjectionRun>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {RUN_COLS} FROM projection_runs
                     WHERE assignment_id = ?1 ORDER BY as_of DESC LIMIT 1"
                ),
                vec![assignment_id.into()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_run(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn list_projection_rows(
        &self,
        assignment_id: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<ForwardProjection>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {ROW_COLS} FROM forward_projections
                     WHERE assignment_id = ?1 AND as_of = ?2 ORDER BY day"
                ),
                vec![assignment_id.into(), fmt_date(as_of).into()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_projection(&row)?);
        }
        Ok(out)
    }

    /// The projected row for `day` from the newest run that covers it.
    pub async fn projection_for_day(
        &self,
        assignment_id: &str,
        day: NaiveDate,
    ) -> Result<Option<ForwardProjection>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {ROW_COLS} FROM forward_projections
                     WHERE assignment_id = ?1 AND day = ?2 ORDER BY as_of DESC LIMIT 1"
                ),
                vec![assignment_id.into(), fmt_date(day).into()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_projection(&row)?)),
            None => Ok(None),
        }
    }

    pub async fn count_projection_runs(&self, assignment_id: &str) -> Result<i64, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT COUNT(*) FROM projection_runs WHERE assignment_id = ?1",
                vec![assignment_id.into()],
            )
            .await?;
        let row = rows.next().await?.ok_or(DatabaseError::NoResult)?;
        Ok(row.get(0)?)
    }
}
