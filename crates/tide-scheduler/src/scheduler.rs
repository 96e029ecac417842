//! Recompute Scheduler: turns domain events into deduplicated tasks.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{broadcast, watch};

use tide_config::SchedulerConfig;
use tide_core::entities::RecomputeScope;
use tide_core::events::DomainEvent;
use tide_core::window::DateWindow;
use tide_db::repos::task::EnqueueOutcome;
use tide_db::service::TideService;
use tide_engine::EngineError;
use tide_engine::ingest::EventPublisher;

use crate::error::SchedulerError;

/// Priority of tasks raised by domain events.
pub const EVENT_PRIORITY: i64 = 10;
/// Priority of tasks raised by the nightly sweep.
pub const SWEEP_PRIORITY: i64 = 1;

/// Days either side of a sample, transfer or treatment.
pub const ASSIGNMENT_RADIUS_DAYS: i64 = 2;
/// Days either side of a mortality event.
pub const COHORT_RADIUS_DAYS: i64 = 1;

/// Scope and window a domain event invalidates.
#[must_use]
pub fn plan(event: &DomainEvent) -> (RecomputeScope, DateWindow) {
    match event {
        DomainEvent::SampleSaved { assignment_id, day }
        | DomainEvent::TransferSaved { assignment_id, day }
        | DomainEvent::TreatmentSaved { assignment_id, day } => (
            RecomputeScope::assignment(assignment_id.clone()),
            DateWindow::around(*day, ASSIGNMENT_RADIUS_DAYS),
        ),
        DomainEvent::MortalitySaved { cohort_id, day } => (
            RecomputeScope::cohort(cohort_id.clone()),
            DateWindow::around(*day, COHORT_RADIUS_DAYS),
        ),
    }
}

#[derive(Clone)]
pub struct RecomputeScheduler {
    store: Arc<TideService>,
    config: SchedulerConfig,
}

impl RecomputeScheduler {
    pub const fn new(store: Arc<TideService>, config: SchedulerConfig) -> Self {
        Self { store, config }
    }

    #[must_use]
    pub fn store(&self) -> &TideService {
        &self.store
    }

    #[must_use]
    pub const fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Enqueue the recompute an event calls for, merging into a queued task
    /// of the same scope with a live dedupe marker.
    ///
    /// # Errors
    ///
    /// Store failures.
    pub async fn on_domain_event(
        &self,
        event: &DomainEvent,
    ) -> Result<EnqueueOutcome, SchedulerError> {
        let (scope, window) = plan(event);
        let outcome = self
            .store
            .enqueue_recompute(
                &scope,
                window,
                EVENT_PRIORITY,
                Duration::from_secs(self.config.dedupe_ttl_secs),
                Utc::now(),
            )
            .await?;
        tracing::debug!(
            scope = %scope.key(),
            window = %outcome.task().window,
            merged = outcome.is_merged(),
            task_id = %outcome.task().id,
            "recompute scheduled"
        );
        Ok(outcome)
    }

    /// Consume events from the bus until shutdown or until every sender is gone.
    ///
    /// # Errors
    ///
    /// Never fails on a single event; enqueue failures are logged and the
    /// sweep covers them.
    pub async fn listen(
        &self,
        mut events: broadcast::Receiver<DomainEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), SchedulerError> {
        loop {
            tokio::select! {
                received = events.recv() => match received {
                    Ok(event) => {
                        if let Err(e) = self.on_domain_event(&event).await {
                            tracing::error!(?event, error = %e, "failed to enqueue recompute");
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "event listener lagged; sweep will catch up");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(()),
                },
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        return Ok(());
                    }
                }
            }
        }
    }
}

/// Direct delivery for single-process callers that have no bus.
#[async_trait]
impl EventPublisher for RecomputeScheduler {
    async fn publish(&self, event: DomainEvent) -> Result<(), EngineError> {
        self.on_domain_event(&event)
            .await
            .map(|_| ())
            .map_err(|e| EngineError::Publish(e.to_string()))
    }
}
