//! Worker pool draining the recompute queue.
//!
//! Claims are atomic in the store, so any number of workers (in one process
//! or several) can share a queue. A claim is leased to the pool's claimant
//! id and renewed while the task runs; only tasks whose lease lapsed are
//! handed to another worker. A failed attempt goes back to the queue
//! with exponential backoff; the last allowed failure marks the task failed,
//! logs it at error level and raises an ops alert.

use chrono::Utc;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinSet;

use tide_config::SchedulerConfig;
use tide_core::entities::RecomputeTask;
use tide_core::errors::CoreError;
use tide_db::alerts::KIND_TASK_RETRY_EXHAUSTED;
use tide_db::error::DatabaseError;
use tide_engine::Engine;

use crate::error::SchedulerError;

/// What happened to one claimed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TaskOutcome {
    Done,
    Retrying { attempt: u32, delay_ms: u64 },
    Exhausted { attempts: u32 },
}

/// Totals of a drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    pub done: usize,
    pub retried: usize,
    pub failed: usize,
}

impl DrainReport {
    fn record(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Done => self.done += 1,
            TaskOutcome::Retrying { .. } => self.retried += 1,
            TaskOutcome::Exhausted { .. } => self.failed += 1,
        }
    }
}

#[derive(Clone)]
pub struct WorkerPool {
    engine: Engine,
    config: SchedulerConfig,
    claimant: String,
}

impl WorkerPool {
    /// A pool claiming tasks as `tide-{pid}`.
    #[must_use]
    pub fn new(engine: Engine) -> Self {
        let config = engine.config().scheduler.clone();
        Self {
            engine,
            config,
            claimant: format!("tide-{}", std::process::id()),
        }
    }

    #[must_use]
    pub fn with_claimant(mut self, claimant: impl Into<String>) -> Self {
        self.claimant = claimant.into();
        self
    }

    #[must_use]
    pub fn claimant(&self) -> &str {
        &self.claimant
    }

    /// Claim and execute one available task.
    ///
    /// # Errors
    ///
    /// Store failures while claiming or recording the outcome. Recompute
    /// failures are outcomes, not errors.
    pub async fn run_once(&self) -> Result<Option<(RecomputeTask, TaskOutcome)>, SchedulerError> {
        let Some(task) = self
            .engine
            .store()
            .claim_next_task(Utc::now(), &self.claimant, self.config.task_lease())
            .await?
        else {
            return Ok(None);
        };
        let outcome = self.execute(&task).await?;
        Ok(Some((task, outcome)))
    }

    /// Run tasks until none is available right now. Tasks waiting out a
    /// backoff are left for a later call.
    ///
    /// # Errors
    ///
    /// As [`WorkerPool::run_once`].
    pub async fn drain(&self) -> Result<DrainReport, SchedulerError> {
        let mut report = DrainReport::default();
        while let Some((_, outcome)) = self.run_once().await? {
            report.record(outcome);
        }
        Ok(report)
    }

    /// Run `scheduler.workers` workers until `shutdown` flips to `true`.
    /// Each worker finishes its current task before stopping.
    ///
    /// # Errors
    ///
    /// When orphaned tasks cannot be requeued or a worker panics.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) -> Result<(), SchedulerError> {
        let requeued = self.engine.store().requeue_orphaned_tasks(Utc::now()).await?;
        if requeued > 0 {
            tracing::warn!(requeued, "requeued tasks whose lease lapsed");
        }

        let mut workers = JoinSet::new();
        for worker in 0..self.config.workers.max(1) {
            let pool = self.clone();
            let shutdown = shutdown.clone();
            workers.spawn(async move { pool.worker_loop(worker, shutdown).await });
        }
        tracing::info!(workers = self.config.workers.max(1), "worker pool started");

        while let Some(joined) = workers.join_next().await {
            joined.map_err(|e| SchedulerError::Worker(e.to_string()))?;
        }
        tracing::info!("worker pool stopped");
        Ok(())
    }

    async fn worker_loop(&self, worker: usize, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                return;
            }
            match self.run_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => tracing::error!(worker, error = %e, "worker iteration failed"),
            }
            tokio::select! {
                () = tokio::time::sleep(self.config.poll_interval()) => {}
                _ = shutdown.changed() => {}
            }
        }
    }

    /// Renew the lease on `task_id` until the claim is lost.
    async fn hold_lease(&self, task_id: &str) -> SchedulerError {
        let mut renewals = tokio::time::interval(self.config.lease_renewal_interval());
        renewals.tick().await;
        loop {
            renewals.tick().await;
            match self
                .engine
                .store()
                .renew_task_lease(task_id, &self.claimant, Utc::now(), self.config.task_lease())
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    return DatabaseError::ClaimLost {
                        task_id: task_id.to_string(),
                        claimant: self.claimant.clone(),
                    }
                    .into();
                }
                Err(e) => tracing::warn!(task_id, error = %e, "task lease renewal failed"),
            }
        }
    }

    async fn execute(&self, task: &RecomputeTask) -> Result<TaskOutcome, SchedulerError> {
        let store = self.engine.store();
        let result = tokio::select! {
            result = self.engine.recompute(&task.scope, task.window) => result,
            lost = self.hold_lease(&task.id) => {
                tracing::warn!(task_id = %task.id, error = %lost, "recompute task claim lost");
                return Err(lost);
            }
        };
        match result {
            Ok(report) => {
                store.complete_task(&task.id, &self.claimant).await?;
                tracing::info!(
                    task_id = %task.id,
                    scope = %task.scope.key(),
                    window = %task.window,
                    assignments = report.assignments.len(),
                    attempt = task.attempts,
                    "recompute task done"
                );
                Ok(TaskOutcome::Done)
            }
            Err(e) if task.attempts >= self.config.max_attempts => {
                let exhausted = CoreError::TaskRetryExhausted {
                    task_id: task.id.clone(),
                    attempts: task.attempts,
                    last_error: e.to_string(),
                };
                store.fail_task(&task.id, &self.claimant, &e.to_string()).await?;
                tracing::error!(
                    task_id = %task.id,
                    scope = %task.scope.key(),
                    window = %task.window,
                    error = %exhausted,
                    "recompute task abandoned"
                );
                store
                    .raise_alert(
                        KIND_TASK_RETRY_EXHAUSTED,
                        &task.scope.key(),
                        &exhausted.to_string(),
                        task.attempts,
                    )
                    .await?;
                Ok(TaskOutcome::Exhausted {
                    attempts: task.attempts,
                })
            }
            Err(e) => {
                let delay = self.config.backoff_for(task.attempts);
                let available_at = Utc::now()
                    + chrono::Duration::from_std(delay)
                        .map_err(|e| CoreError::Validation(format!("backoff out of range: {e}")))?;
                store
                    .retry_task(&task.id, &self.claimant, &e.to_string(), available_at)
                    .await?;
                tracing::warn!(
                    task_id = %task.id,
                    attempt = task.attempts,
                    delay_ms = delay.as_millis(),
                    error = %e,
                    "recompute task failed, will retry"
                );
                Ok(TaskOutcome::Retrying {
                    attempt: task.attempts,
                    delay_ms: u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }
}
