//! Nightly catch-up sweep.
//!
//! Re-enqueues every assignment active today or touched by an anchor within
//! the lookback. Recompute skips identical rows, so a sweep over unchanged
//! inputs writes nothing.

use std::collections::BTreeSet;
use std::time::Duration;

use chrono::{Days, NaiveDate, Utc};
use serde::Serialize;

use tide_core::entities::RecomputeScope;
use tide_core::errors::CoreError;
use tide_core::window::DateWindow;

use crate::error::SchedulerError;
use crate::scheduler::{RecomputeScheduler, SWEEP_PRIORITY};

/// Lease serializing sweeps across instances.
pub const SWEEP_LEASE: &str = "nightly-sweep";

#[derive(Debug, Clone, Default, Serialize)]
pub struct SweepReport {
    /// `false` when another instance holds the lease; nothing was done.
    pub acquired: bool,
    pub window: Option<DateWindow>,
    pub assignments: Vec<String>,
    pub enqueued: usize,
    pub merged: usize,
}

impl RecomputeScheduler {
    /// Run the sweep for `today` as `holder`.
    ///
    /// The lease is kept until it expires so a second instance skips the
    /// same night; it is released early only when the sweep fails.
    ///
    /// # Errors
    ///
    /// Store failures. The lease is released before returning them.
    pub async fn sweep(&self, today: NaiveDate, holder: &str) -> Result<SweepReport, SchedulerError> {
        let ttl = Duration::from_secs(self.config().sweep_lease_secs);
        if !self
            .store()
            .try_acquire_lease(SWEEP_LEASE, holder, ttl, Utc::now())
            .await?
        {
            tracing::info!(holder, "sweep lease held elsewhere, skipping");
            return Ok(SweepReport::default());
        }

        match self.enqueue_sweep(today).await {
            Ok(report) => Ok(report),
            Err(e) => {
                if let Err(release) = self.store().release_lease(SWEEP_LEASE, holder).await {
                    tracing::warn!(error = %release, "failed to release sweep lease");
                }
                Err(e)
            }
        }
    }

    async fn enqueue_sweep(&self, today: NaiveDate) -> Result<SweepReport, SchedulerError> {
        let lookback = u64::try_from(self.config().sweep_lookback_days).unwrap_or(0);
        let since = today
            .checked_sub_days(Days::new(lookback))
            .ok_or_else(|| CoreError::Validation(format!("sweep lookback before {today}")))?;
        let window = DateWindow::new(since, today)?;

        let mut ids: BTreeSet<String> = self
            .store()
            .list_active_assignments(today)
            .await?
            .into_iter()
            .map(|a| a.id)
            .collect();
        ids.extend(self.store().assignments_touched_since(since).await?);

        let dedupe_ttl = Duration::from_secs(self.config().dedupe_ttl_secs);
        let mut report = SweepReport {
            acquired: true,
            window: Some(window),
            ..SweepReport::default()
        };
        for id in ids {
            let outcome = self
                .store()
                .enqueue_recompute(
                    &RecomputeScope::assignment(id.clone()),
                    window,
                    SWEEP_PRIORITY,
                    dedupe_ttl,
                    Utc::now(),
                )
                .await?;
            if outcome.is_merged() {
                report.merged += 1;
            } else {
                report.enqueued += 1;
            }
            report.assignments.push(id);
        }

        tracing::info!(
            window = %window,
            assignments = report.assignments.len(),
            enqueued = report.enqueued,
            merged = report.merged,
            "sweep enqueued"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use tide_config::SchedulerConfig;
    use tide_core::entities::{Assignment, NewAnchor};
    use tide_core::enums::{AnchorSource, TaskStatus};
    use tide_db::service::TideService;

    fn d(month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, month, day).unwrap()
    }

    fn assignment(id: &str, start: NaiveDate, end: Option<NaiveDate>) -> Assignment {
        Assignment {
            id: id.into(),
            cohort_id: "coh-1".into(),
            enclosure_id: format!("pen-{id}"),
            start_date: start,
            end_date: end,
            initial_population: 100,
            initial_weight_g: 10.0,
            population_count: 100,
            average_weight_g: 10.0,
            lifecycle_stage: None,
        }
    }

    async fn scheduler() -> RecomputeScheduler {
        let store = Arc::new(TideService::in_memory().await.unwrap());
        store.upsert_assignment(&assignment("asg-live", d(1, 1), None)).await.unwrap();
        store
            .upsert_assignment(&assignment("asg-ended", d(1, 1), Some(d(2, 1))))
            .await
            .unwrap();
        store
            .upsert_assignment(&assignment("asg-late", d(1, 1), Some(d(3, 5))))
            .await
            .unwrap();
        RecomputeScheduler::new(store, SchedulerConfig::default())
    }

    #[tokio::test]
    async fn sweep_covers_active_and_recently_touched() {
        let scheduler = scheduler().await;
        scheduler
            .store()
            .append_anchor(&NewAnchor {
                source_type: AnchorSource::Sample,
                source_id: "gs-late".into(),
                cohort_id: "coh-1".into(),
                assignment_id: Some("asg-late".into()),
                occurred_on: d(3, 4),
                population_delta: 0,
                average_weight_g: Some(20.0),
                raw: serde_json::json!({}),
            })
            .await
            .unwrap();

        let report = scheduler.sweep(d(3, 10), "host-a").await.unwrap();
        assert!(report.acquired);
        assert_eq!(report.assignments, vec!["asg-late".to_string(), "asg-live".to_string()]);
        assert_eq!(report.window, Some(DateWindow::new(d(2, 24), d(3, 10)).unwrap()));

        let tasks = scheduler.store().list_tasks(Some(TaskStatus::Queued)).await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert!(tasks.iter().all(|t| t.priority == SWEEP_PRIORITY));
    }

    #[tokio::test]
    async fn second_instance_skips_while_lease_is_live() {
        let scheduler = scheduler().await;
        assert!(scheduler.sweep(d(3, 10), "host-a").await.unwrap().acquired);
        let other = scheduler.sweep(d(3, 10), "host-b").await.unwrap();
        assert!(!other.acquired);
        assert!(other.assignments.is_empty());
    }
}
