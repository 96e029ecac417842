//! Retention compaction for the time-partitioned tables.

use chrono::{Days, NaiveDate};
use serde::Serialize;

use crate::error::DatabaseError;
use crate::helpers::fmt_date;
use crate::service::TideService;

/// Rows removed by one compaction pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompactionReport {
    pub daily_states: u64,
    pub projection_runs: u64,
    pub projection_rows: u64,
    pub finished_tasks: u64,
}

impl TideService {
    /// Prune rows older than the given ages, measured back from `today`.
    ///
    /// * Daily states are pruned only for assignments that have ended, so the
    ///   no-gap range of an active assignment is never cut.
    /// * Projection runs are pruned only when superseded by a newer run.
    /// * Finished queue rows (`done`/`failed`) follow the projection age.
    ///
    /// An age of `0` disables that part.
    pub async fn compact(
        &self,
        today: NaiveDate,
        daily_state_days: i64,
        projection_days: i64,
    ) -> Result<CompactionReport, DatabaseError> {
        let mut report = CompactionReport::default();

        if let Some(cutoff) = cutoff(today, daily_state_days) {
            report.daily_states = self
                .db()
                .execute_with(
                    "DELETE FROM daily_states
                     WHERE day < ?1 AND assignment_id IN (
                        SELECT id FROM assignments WHERE end_date IS NOT NULL AND end_date < ?1
                     )",
                    vec![cutoff.into()],
                )
                .await?;
        }

        if let Some(cutoff) = cutoff(today, projection_days) {
            let superseded = "as_of < ?1 AND as_of < (
                    SELECT MAX(r.as_of) FROM projection_runs r WHERE r.assignment_id = t.assignment_id
                )";
            report.projection_rows = self
                .db()
                .execute_with(
                    &format!("DELETE FROM forward_projections AS t WHERE {superseded}"),
                    vec![cutoff.as_str().into()],
                )
                .await?;
            report.projection_runs = self
                .db()
                .execute_with(
                    &format!("DELETE FROM projection_runs AS t WHERE {superseded}"),
                    vec![cutoff.as_str().into()],
                )
                .await?;
            report.finished_tasks = self
                .db()
                .execute_with(
                    "DELETE FROM recompute_tasks
                     WHERE status IN ('done', 'failed') AND updated_at < ?1",
                    vec![cutoff.into()],
                )
                .await?;
        }

        tracing::info!(
            daily_states = report.daily_states,
            projection_runs = report.projection_runs,
            projection_rows = report.projection_rows,
            finished_tasks = report.finished_tasks,
            "compaction finished"
        );
        Ok(report)
    }
}

fn cutoff(today: NaiveDate, age_days: i64) -> Option<String> {
    let age = u64::try_from(age_days).ok().filter(|age| *age > 0)?;
    today.checked_sub_days(Days::new(age)).map(fmt_date)
}
