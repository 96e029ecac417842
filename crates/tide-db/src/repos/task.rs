//! Durable recompute queue.
//!
//! Status moves `queued -> running -> done | queued (retry) | failed`.
//! Claiming is one `UPDATE ... RETURNING` so two workers can never take the
//! same task, and a scope with a running task is skipped until it finishes.
//! A claim carries the claimant and a lease; only the claimant can move the
//! task on, and a running task is reclaimable once its lease has lapsed.

use std::time::Duration;

use chrono::{DateTime, Utc};

use tide_core::entities::{RecomputeScope, RecomputeTask};
use tide_core::enums::TaskStatus;
use tide_core::errors::CoreError;
use tide_core::ids::PREFIX_TASK;
use tide_core::window::DateWindow;

use crate::error::DatabaseError;
use crate::helpers::{fmt_date, fmt_datetime, get_opt_string, parse_date, parse_datetime, parse_enum};
use crate::service::TideService;

const SELECT_COLS: &str = "id, scope_kind, scope_id, window_start, window_end, dedupe_key, \
     priority, attempts, status, available_at, marker_expires_at, last_error, enqueued_at, \
     claimed_by, lease_expires_at";

fn row_to_task(row: &libsql::Row) -> Result<RecomputeTask, DatabaseError> {
    let attempts: i64 = row.get(7)?;
    Ok(RecomputeTask {
        id: row.get(0)?,
        scope: RecomputeScope {
            kind: parse_enum(&row.get::<String>(1)?)?,
            id: row.get(2)?,
        },
        window: DateWindow::new(
            parse_date(&row.get::<String>(3)?)?,
            parse_date(&row.get::<String>(4)?)?,
        )?,
        dedupe_key: row.get(5)?,
        priority: row.get(6)?,
        attempts: u32::try_from(attempts)
            .map_err(|_| DatabaseError::InvalidState(format!("negative attempts: {attempts}")))?,
        status: parse_enum(&row.get::<String>(8)?)?,
        available_at: parse_datetime(&row.get::<String>(9)?)?,
        marker_expires_at: parse_datetime(&row.get::<String>(10)?)?,
        last_error: get_opt_string(row, 11)?,
        enqueued_at: parse_datetime(&row.get::<String>(12)?)?,
        claimed_by: get_opt_string(row, 13)?,
        lease_expires_at: get_opt_string(row, 14)?
            .as_deref()
            .map(parse_datetime)
            .transpose()?,
    })
}

/// Result of an enqueue request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// A new task was queued.
    Enqueued(RecomputeTask),
    /// The request was absorbed by a queued task with a live dedupe marker;
    /// the task's window is now the union of both.
    Merged(RecomputeTask),
}

impl EnqueueOutcome {
    #[must_use]
    pub const fn task(&self) -> &RecomputeTask {
        match self {
            Self::Enqueued(task) | Self::Merged(task) => task,
        }
    }

    #[must_use]
    pub const fn is_merged(&self) -> bool {
        matches!(self, Self::Merged(_))
    }
}

impl TideService {
    /// Queue a recompute for `scope` over `window`, merging into a queued task
    /// for the same scope whose window overlaps or touches and whose dedupe
    /// marker has not expired.
    pub async fn enqueue_recompute(
        &self,
        scope: &RecomputeScope,
        window: DateWindow,
        priority: i64,
        dedupe_ttl: Duration,
        now: DateTime<Utc>,
    ) -> Result<EnqueueOutcome, DatabaseError> {
        let _guard = self.enqueue_lock().lock().await;
        let scope_key = scope.key();
        let now_s = fmt_datetime(now);

        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "SELECT {SELECT_COLS} FROM recompute_tasks
                     WHERE scope_key = ?1 AND status = 'queued' AND marker_expires_at > ?2
                       AND window_start <= date(?4, '+1 day') AND window_end >= date(?3, '-1 day')
                     ORDER BY enqueued_at LIMIT 1"
                ),
                vec![
                    scope_key.as_str().into(),
                    now_s.as_str().into(),
                    fmt_date(window.start).into(),
                    fmt_date(window.end).into(),
                ],
            )
            .await?;

        if let Some(row) = rows.next().await? {
            let existing = row_to_task(&row)?;
            let merged = existing.window.union(&window);
            let dedupe_key = scope.dedupe_key(&merged);
            let priority = existing.priority.max(priority);
            self.db()
                .execute_with(
                    "UPDATE recompute_tasks
                     SET window_start = ?1, window_end = ?2, dedupe_key = ?3, priority = ?4, updated_at = ?5
                     WHERE id = ?6",
                    vec![
                        fmt_date(merged.start).into(),
                        fmt_date(merged.end).into(),
                        dedupe_key.as_str().into(),
                        priority.into(),
                        now_s.as_str().into(),
                        existing.id.as_str().into(),
                    ],
                )
                .await?;
            tracing::debug!(task_id = %existing.id, window = %merged, "recompute merged");
            return Ok(EnqueueOutcome::Merged(RecomputeTask {
                window: merged,
                dedupe_key,
                priority,
                ..existing
            }));
        }

        let id = self.db().generate_id(PREFIX_TASK).await?;
        let marker_expires_at = now
            + chrono::Duration::from_std(dedupe_ttl)
                .map_err(|e| DatabaseError::InvalidState(format!("dedupe ttl: {e}")))?;
        let task = RecomputeTask {
            id,
            scope: scope.clone(),
            window,
            dedupe_key: scope.dedupe_key(&window),
            priority,
            attempts: 0,
            status: TaskStatus::Queued,
            available_at: now,
            marker_expires_at,
            last_error: None,
            enqueued_at: now,
            claimed_by: None,
            lease_expires_at: None,
        };
        self.db()
            .execute_with(
                "INSERT INTO recompute_tasks (id, scope_kind, scope_id, scope_key, window_start,
                    window_end, dedupe_key, priority, attempts, status, available_at,
                    marker_expires_at, last_error, enqueued_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0, ?9, ?10, ?11, NULL, ?10, ?10)",
                vec![
                    task.id.as_str().into(),
                    scope.kind.as_str().into(),
                    scope.id.as_str().into(),
                    scope_key.as_str().into(),
                    fmt_date(window.start).into(),
                    fmt_date(window.end).into(),
                    task.dedupe_key.as_str().into(),
                    priority.into(),
                    TaskStatus::Queued.as_str().into(),
                    now_s.as_str().into(),
                    fmt_datetime(marker_expires_at).into(),
                ],
            )
            .await?;
        tracing::debug!(task_id = %task.id, dedupe_key = %task.dedupe_key, "recompute enqueued");
        Ok(EnqueueOutcome::Enqueued(task))
    }

    /// Atomically claim the highest-priority, oldest available task whose
    /// scope has nothing running under a live lease. A running task whose
    /// lease has lapsed counts as available. Increments `attempts`.
    pub async fn claim_next_task(
        &self,
        now: DateTime<Utc>,
        claimant: &str,
        lease: Duration,
    ) -> Result<Option<RecomputeTask>, DatabaseError> {
        let now_s = fmt_datetime(now);
        let lease_until = fmt_datetime(lease_deadline(now, lease)?);
        let mut rows = self
            .db()
            .query_with(
                &format!(
                    "UPDATE recompute_tasks
                     SET status = 'running', attempts = attempts + 1, claimed_by = ?2,
                         lease_expires_at = ?3, updated_at = ?1
                     WHERE id = (
                        SELECT t.id FROM recompute_tasks t
                        WHERE ((t.status = 'queued' AND t.available_at <= ?1)
                               OR (t.status = 'running' AND t.lease_expires_at <= ?1))
                          AND NOT EXISTS (
                            SELECT 1 FROM recompute_tasks r
                            WHERE r.scope_key = t.scope_key AND r.id <> t.id
                              AND r.status = 'running' AND r.lease_expires_at > ?1
                          )
                        ORDER BY t.priority DESC, t.available_at, t.enqueued_at
                        LIMIT 1
                     )
                     RETURNING {SELECT_COLS}"
                ),
                vec![now_s.into(), claimant.into(), lease_until.into()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => Ok(Some(row_to_task(&row)?)),
            None => Ok(None),
        }
    }

    /// Push the lease of a task `claimant` still holds out to `now + lease`.
    /// Returns `false` when the claim has been lost.
    pub async fn renew_task_lease(
        &self,
        id: &str,
        claimant: &str,
        now: DateTime<Utc>,
        lease: Duration,
    ) -> Result<bool, DatabaseError> {
        let affected = self
            .db()
            .execute_with(
                "UPDATE recompute_tasks SET lease_expires_at = ?1, updated_at = ?2
                 WHERE id = ?3 AND status = 'running' AND claimed_by = ?4",
                vec![
                    fmt_datetime(lease_deadline(now, lease)?).into(),
                    fmt_datetime(now).into(),
                    id.into(),
                    claimant.into(),
                ],
            )
            .await?;
        Ok(affected == 1)
    }

    pub async fn complete_task(&self, id: &str, claimant: &str) -> Result<(), DatabaseError> {
        self.transition_task(id, claimant, TaskStatus::Done, None, None)
            .await
    }

    /// Put a failed attempt back in the queue, available again at `available_at`.
    pub async fn retry_task(
        &self,
        id: &str,
        claimant: &str,
        error: &str,
        available_at: DateTime<Utc>,
    ) -> Result<(), DatabaseError> {
        self.transition_task(id, claimant, TaskStatus::Queued, Some(error), Some(available_at))
            .await
    }

    pub async fn fail_task(&self, id: &str, claimant: &str, error: &str) -> Result<(), DatabaseError> {
        self.transition_task(id, claimant, TaskStatus::Failed, Some(error), None)
            .await
    }

    /// Move a running task held by `claimant` to `next` in one conditional
    /// update. Releases the claim.
    async fn transition_task(
        &self,
        id: &str,
        claimant: &str,
        next: TaskStatus,
        error: Option<&str>,
        available_at: Option<DateTime<Utc>>,
    ) -> Result<(), DatabaseError> {
        if !TaskStatus::Running.can_transition_to(next) {
            return Err(invalid_transition(id, TaskStatus::Running, next));
        }
        let now = fmt_datetime(Utc::now());
        let available_at = available_at.map_or_else(|| now.clone(), fmt_datetime);
        let affected = self
            .db()
            .execute_with(
                "UPDATE recompute_tasks
                 SET status = ?1, last_error = COALESCE(?2, last_error), available_at = ?3,
                     updated_at = ?4, claimed_by = NULL, lease_expires_at = NULL
                 WHERE id = ?5 AND status = 'running' AND claimed_by = ?6",
                vec![
                    next.as_str().into(),
                    crate::helpers::opt(error),
                    available_at.into(),
                    now.into(),
                    id.into(),
                    claimant.into(),
                ],
            )
            .await?;
        if affected == 1 {
            return Ok(());
        }
        let current = self.get_task(id).await?;
        if current.status == TaskStatus::Running {
            return Err(DatabaseError::ClaimLost {
                task_id: id.to_string(),
                claimant: claimant.to_string(),
            });
        }
        Err(invalid_transition(id, current.status, next))
    }

    pub async fn get_task(&self, id: &str) -> Result<RecomputeTask, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                &format!("SELECT {SELECT_COLS} FROM recompute_tasks WHERE id = ?1"),
                vec![id.into()],
            )
            .await?;
        match rows.next().await? {
            Some(row) => row_to_task(&row),
            None => Err(CoreError::not_found("recompute_task", id).into()),
        }
    }

    /// Tasks in `status`, or every task when `None`, oldest first.
    pub async fn list_tasks(
        &self,
        status: Option<TaskStatus>,
    ) -> Result<Vec<RecomputeTask>, DatabaseError> {
        let (sql, params) = match status {
            Some(status) => (
                format!(
                    "SELECT {SELECT_COLS} FROM recompute_tasks WHERE status = ?1 ORDER BY enqueued_at, id"
                ),
                vec![status.as_str().into()],
            ),
            None => (
                format!("SELECT {SELECT_COLS} FROM recompute_tasks ORDER BY enqueued_at, id"),
                vec![],
            ),
        };
        let mut rows = self.db().query_with(&sql, params).await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row_to_task(&row)?);
        }
        Ok(out)
    }

    /// Whether a queued or running task covers the assignment directly or via its cohort.
    pub async fn has_pending_recompute(
        &self,
        assignment_id: &str,
        cohort_id: &str,
    ) -> Result<bool, DatabaseError> {
        let mut rows = self
            .db()
            .query_with(
                "SELECT 1 FROM recompute_tasks
                 WHERE status IN ('queued', 'running') AND scope_key IN (?1, ?2)
                 LIMIT 1",
                vec![
                    RecomputeScope::assignment(assignment_id).key().into(),
                    RecomputeScope::cohort(cohort_id).key().into(),
                ],
            )
            .await?;
        Ok(rows.next().await?.is_some())
    }

    /// Return tasks left `running` under a lapsed lease to the queue.
    /// Tasks whose holder is still renewing are left alone. The interrupted
    /// attempt still counts.
    pub async fn requeue_orphaned_tasks(&self, now: DateTime<Utc>) -> Result<u64, DatabaseError> {
        let now = fmt_datetime(now);
        self.db()
            .execute_with(
                "UPDATE recompute_tasks
                 SET status = 'queued', available_at = ?1, updated_at = ?1,
                     claimed_by = NULL, lease_expires_at = NULL
                 WHERE status = 'running' AND (lease_expires_at IS NULL OR lease_expires_at <= ?1)",
                vec![now.into()],
            )
            .await
    }
}

fn lease_deadline(now: DateTime<Utc>, lease: Duration) -> Result<DateTime<Utc>, DatabaseError> {
    chrono::Duration::from_std(lease)
        .ok()
        .and_then(|lease| now.checked_add_signed(lease))
        .ok_or_else(|| DatabaseError::InvalidState(format!("task lease out of range: {lease:?}")))
}

fn invalid_transition(id: &str, from: TaskStatus, to: TaskStatus) -> DatabaseError {
    CoreError::InvalidTransition {
        entity_type: "recompute_task".into(),
        id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::helpers::{d, test_service};
    use pretty_assertions::assert_eq;

    const TTL: Duration = Duration::from_secs(30);
    const LEASE: Duration = Duration::from_secs(60);
    const WORKER: &str = "worker-a";

    #[tokio::test]
    async fn overlapping_requests_merge_into_union_window() {
        let svc = test_service().await;
        let scope = RecomputeScope::assignment("asg-1");
        let now = Utc::now();

        let first = svc
            .enqueue_recompute(&scope, DateWindow::around(d(3, 10), 2), 10, TTL, now)
            .await
            .unwrap();
        assert!(!first.is_merged());

        let second = svc
            .enqueue_recompute(&scope, DateWindow::around(d(3, 13), 2), 10, TTL, now)
            .await
            .unwrap();
        assert!(second.is_merged());
        assert_eq!(second.task().id, first.task().id);
        assert_eq!(second.task().window, DateWindow::new(d(3, 8), d(3, 15)).unwrap());

        let queued = svc.list_tasks(Some(TaskStatus::Queued)).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].window, DateWindow::new(d(3, 8), d(3, 15)).unwrap());
        assert_eq!(queued[0].dedupe_key, "assignment:asg-1@2026-03-08..2026-03-15");
    }

    #[tokio::test]
    async fn disjoint_windows_and_expired_markers_enqueue_separately() {
        let svc = test_service().await;
        let scope = RecomputeScope::assignment("asg-1");
        let now = Utc::now();

        svc.enqueue_recompute(&scope, DateWindow::around(d(3, 1), 2), 10, TTL, now)
            .await
            .unwrap();
        let far = svc
            .enqueue_recompute(&scope, DateWindow::around(d(4, 1), 2), 10, TTL, now)
            .await
            .unwrap();
        assert!(!far.is_merged());

        let later = now + chrono::Duration::seconds(60);
        let after_expiry = svc
            .enqueue_recompute(&scope, DateWindow::around(d(3, 1), 2), 10, TTL, later)
            .await
            .unwrap();
        assert!(!after_expiry.is_merged());
        assert_eq!(svc.list_tasks(None).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn claim_orders_by_priority_and_excludes_running_scope() {
        let svc = test_service().await;
        let now = Utc::now();
        let a = RecomputeScope::assignment("asg-a");
        let b = RecomputeScope::assignment("asg-b");

        svc.enqueue_recompute(&a, DateWindow::single(d(3, 1)), 1, TTL, now).await.unwrap();
        svc.enqueue_recompute(&b, DateWindow::single(d(3, 1)), 10, TTL, now).await.unwrap();
        svc.enqueue_recompute(&a, DateWindow::single(d(5, 1)), 10, TTL, now).await.unwrap();

        let first = svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();
        assert_eq!(first.priority, 10);
        assert_eq!(first.status, TaskStatus::Running);
        assert_eq!(first.attempts, 1);

        // one of the priority-10 tasks is running; the other is claimable
        let second = svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();
        assert_ne!(second.scope, first.scope);

        // both scopes now have a running task
        assert!(svc.claim_next_task(now, WORKER, LEASE).await.unwrap().is_none());

        svc.complete_task(&first.id, WORKER).await.unwrap();
        svc.complete_task(&second.id, WORKER).await.unwrap();
        let third = svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();
        assert_eq!(third.scope, a);
        assert_eq!(third.priority, 1);
    }

    #[tokio::test]
    async fn retry_respects_available_at_and_running_is_not_merged() {
        let svc = test_service().await;
        let now = Utc::now();
        let scope = RecomputeScope::assignment("asg-1");
        svc.enqueue_recompute(&scope, DateWindow::single(d(3, 1)), 10, TTL, now)
            .await
            .unwrap();
        let task = svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();

        let outcome = svc
            .enqueue_recompute(&scope, DateWindow::single(d(3, 2)), 10, TTL, now)
            .await
            .unwrap();
        assert!(!outcome.is_merged());

        let later = now + chrono::Duration::seconds(5);
        svc.retry_task(&task.id, WORKER, "boom", later).await.unwrap();
        let stored = svc.get_task(&task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Queued);
        assert_eq!(stored.last_error.as_deref(), Some("boom"));

        // the fresh task is claimable now; the retried one only after `later`
        let next = svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();
        assert_eq!(next.id, outcome.task().id);
        svc.complete_task(&next.id, WORKER).await.unwrap();
        assert!(svc.claim_next_task(now, WORKER, LEASE).await.unwrap().is_none());
        let retried = svc.claim_next_task(later, WORKER, LEASE).await.unwrap().unwrap();
        assert_eq!(retried.id, task.id);
        assert_eq!(retried.attempts, 2);
    }

    #[tokio::test]
    async fn invalid_transition_rejected() {
        let svc = test_service().await;
        let now = Utc::now();
        let outcome = svc
            .enqueue_recompute(
                &RecomputeScope::cohort("coh-1"),
                DateWindow::single(d(3, 1)),
                10,
                TTL,
                now,
            )
            .await
            .unwrap();
        let err = svc.complete_task(&outcome.task().id, WORKER).await.unwrap_err();
        assert!(matches!(
            err,
            DatabaseError::Core(CoreError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn pending_recompute_covers_cohort_scope() {
        let svc = test_service().await;
        assert!(!svc.has_pending_recompute("asg-1", "coh-1").await.unwrap());
        svc.enqueue_recompute(
            &RecomputeScope::cohort("coh-1"),
            DateWindow::single(d(3, 1)),
            10,
            TTL,
            Utc::now(),
        )
        .await
        .unwrap();
        assert!(svc.has_pending_recompute("asg-1", "coh-1").await.unwrap());
    }

    async fn enqueue_one(svc: &TideService, now: DateTime<Utc>) -> RecomputeTask {
        svc.enqueue_recompute(
            &RecomputeScope::assignment("asg-1"),
            DateWindow::single(d(3, 1)),
            10,
            TTL,
            now,
        )
        .await
        .unwrap()
        .task()
        .clone()
    }

    #[tokio::test]
    async fn only_lapsed_leases_are_requeued() {
        let svc = test_service().await;
        let now = Utc::now();
        enqueue_one(&svc, now).await;
        let claimed = svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();
        assert_eq!(claimed.claimed_by.as_deref(), Some(WORKER));

        assert_eq!(svc.requeue_orphaned_tasks(now).await.unwrap(), 0);

        let lapsed = now + chrono::Duration::seconds(61);
        assert_eq!(svc.requeue_orphaned_tasks(lapsed).await.unwrap(), 1);
        let queued = svc.list_tasks(Some(TaskStatus::Queued)).await.unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].claimed_by, None);
        assert_eq!(queued[0].lease_expires_at, None);
    }

    #[tokio::test]
    async fn second_process_cannot_take_a_live_claim() {
        let svc = test_service().await;
        let now = Utc::now();
        let task = enqueue_one(&svc, now).await;
        svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();

        // a second worker process starting up
        assert_eq!(svc.requeue_orphaned_tasks(now).await.unwrap(), 0);
        assert!(svc.claim_next_task(now, "worker-b", LEASE).await.unwrap().is_none());
        let err = svc.complete_task(&task.id, "worker-b").await.unwrap_err();
        assert!(matches!(err, DatabaseError::ClaimLost { .. }));

        svc.complete_task(&task.id, WORKER).await.unwrap();
        let stored = svc.get_task(&task.id).await.unwrap();
        assert_eq!(stored.status, TaskStatus::Done);
        assert_eq!(stored.attempts, 1);
    }

    #[tokio::test]
    async fn lapsed_claim_is_taken_over_and_old_holder_is_refused() {
        let svc = test_service().await;
        let now = Utc::now();
        let task = enqueue_one(&svc, now).await;
        svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();

        let lapsed = now + chrono::Duration::seconds(61);
        let taken = svc.claim_next_task(lapsed, "worker-b", LEASE).await.unwrap().unwrap();
        assert_eq!(taken.id, task.id);
        assert_eq!(taken.attempts, 2);
        assert_eq!(taken.claimed_by.as_deref(), Some("worker-b"));

        assert!(!svc.renew_task_lease(&task.id, WORKER, lapsed, LEASE).await.unwrap());
        let err = svc.complete_task(&task.id, WORKER).await.unwrap_err();
        assert!(matches!(err, DatabaseError::ClaimLost { .. }));
        svc.complete_task(&task.id, "worker-b").await.unwrap();
    }

    #[tokio::test]
    async fn renewed_lease_keeps_the_claim() {
        let svc = test_service().await;
        let now = Utc::now();
        let task = enqueue_one(&svc, now).await;
        svc.claim_next_task(now, WORKER, LEASE).await.unwrap().unwrap();

        let renewed_at = now + chrono::Duration::seconds(40);
        assert!(svc.renew_task_lease(&task.id, WORKER, renewed_at, LEASE).await.unwrap());

        let past_first_lease = now + chrono::Duration::seconds(61);
        assert!(svc.claim_next_task(past_first_lease, "worker-b", LEASE).await.unwrap().is_none());
        assert_eq!(svc.requeue_orphaned_tasks(past_first_lease).await.unwrap(), 0);
    }
}
