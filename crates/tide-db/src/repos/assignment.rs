//! Assignment repository: reference upserts, lookups and snapshot write-back.

use chrono::{NaiveDate, Utc};

use tide_core::entities::Assignment;
use tide_core::errors::CoreError;

use crate::error::DatabaseError;
use crate::helpers::{fmt_date, fmt_datetime, get_opt_string, opt, parse_date, parse_optional_date};
use crate::service::TideService;

const SELECT_COLS: &str = "id, cohort_id, enclosure_id, start_date, end_date, initial_population, \
     initial_weight_g, population_count, average_weight_g, lifecycle_stage";

fn row_to_assignment(row: &libsql::Row) -> Result<Assignment, DatabaseError> {
    Ok(Assignment {
        id: row.get(0)?,
        cohort_id: row.get(1)?,
        enclosure_id: row.get(2)?,
        start_date: parse_date(&row.get::<String>(3)?)?,
        end_date: parse_optional_date(get_opt_string(row, 4)?.as_deref())?,
        initial_population: row.get(5)?,
        initial_weight_g: row.get(6)?,
        population_count: row.get(7)?,
        average_weight_g: row.get(8)?,
        lifecycle_stage: get_opt_string(row, 9)?,
    })
}

impl TideService {
    /// Insert or replace an assignment as delivered by the batch subsystem.
    pub async fn upsert_assignment(&self, assignment: &Assignment) -> Result<(), DatabaseError> {
        if let Some(end) = assignment.end_date
            && end < assignment.start_date
        {
            return Err(CoreError::InvalidRange {
                from: assignment.start_date,
                to: end,
                reason: "assignment ends before it starts".into(),
            }
            .into());
        }
        self.db()
            .execute_with(
                &format!(
                    "INSERT INTO assignments ({SELECT_COLS}, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
                     ON CONFLICT(id) DO UPDATE SET
                        cohort_id = excluded.cohort_id,
                        enclosure_id = excluded.enclosure_id,
                        start_date = excluded.start_date,
                        end_date = excluded.end_date,
                        initial_population = excluded.initial_population,
                        initial_weight_g = excluded.initial_weight_g,
                        population_count = excluded.population_count,
                        average_weight_g = excluded.average_weight_g,
                        lifecycle_stage = excluded.lifecycle_stage,
                        updated_at = excluded.updated_at"
                ),
                vec![
                    assignment.id.as_str().into(),
                    assignment.cohort_id.as_str().into(),
                    assignment.enclosure_id.as_str().into(),
                    fmt_date(assignment.start_date).into(),
                    opt(assignment.end_date.map(fmt_date)),
                    assignment.initial_population.into(),
                    assignment.initial_weight_g.into(),
                    assignment.population_count.into(),
                    assignment.average_weight_g.into(),
                    opt(assignment.lifecycle_stage.clone()),
                    fmt_datetime(Utc::now()).into(),
                ],
            )
            .await?;
        Ok(())
    }

    /// Fetch one assignment, failing with `NotFound` when unknown.
    pub async fn get_assignment(&self, id: &str) -> Result<Assignment, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {SELECT_COLS} FROM assignments WHERE id = ?1"),
                vec![id.into()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => row_to_assignment(&row),
            None => Err(CoreError::not_found("assignment", id).into()),
        }
    }

    pub async fn list_cohort_assignments(
        &self,
        cohort_id: &str,
    ) -> Result<Vec<Assignment>, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {SELECT_COLS} FROM assignments WHERE cohort_id = ?1 ORDER BY start_date, id"
                ),
                vec![cohort_id.into()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_assignment(&row)?);
        }
        Ok(out)
    }

    /// Assignments active on `day` (started, and not ended before it).
    pub async fn list_active_assignments(
        &self,
        day: NaiveDate,
    ) -> Result<Vec<Assignment>, DatabaseError> {
        let day = fmt_date(day);
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {SELECT_COLS} FROM assignments
                     WHERE start_date <= ?1 AND (end_date IS NULL OR end_date >= ?1)
                     ORDER BY id"
                ),
                vec![day.into()],
            )
            .await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_assignment(&row)?);
        }
        Ok(out)
    }

    /// Write the latest reconstructed population and weight back to the
    /// assignment's mutable fields.
    pub async fn sync_assignment_snapshot(
        &self,
        assignment_id: &str,
        population_count: i64,
        average_weight_g: f64,
    ) -> Result<(), DatabaseError> {
        let changed = self
            .db()
            .execute_with(
                "UPDATE assignments
                 SET population_count = ?1, average_weight_g = ?2, updated_at = ?3
                 WHERE id = ?4",
                vec![
                    population_count.into(),
                    average_weight_g.into(),
                    fmt_datetime(Utc::now()).into(),
                    assignment_id.into(),
                ],
            )
            .await?;
        if changed == 0 {
            return Err(CoreError::not_found("assignment", assignment_id).into());
        }
        Ok(())
    }
}
