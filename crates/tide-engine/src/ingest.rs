//! Ingest of source events and reference records.
//!
//! Source events are normalized into anchors, appended, and announced as
//! domain events. Reference records (assignments, plans, feeds) are upserted
//! as-is; they change daily states only through the next recompute.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use tide_core::entities::{
    Anchor, Assignment, BaselinePlan, CohortConfig, FeedRecord, PlanTemplate, ProfilePoint,
    TemperatureReading,
};
use tide_core::events::DomainEvent;
use tide_core::normalizer::{SourceEvent, normalize};
use tide_db::repos::plan::NewActivity;

use crate::{Engine, EngineError};

/// Consumer side of the domain event bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: DomainEvent) -> Result<(), EngineError>;
}

/// Drops every event. For one-off loads that are followed by a sweep.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscardEvents;

#[async_trait]
impl EventPublisher for DiscardEvents {
    async fn publish(&self, event: DomainEvent) -> Result<(), EngineError> {
        tracing::trace!(?event, "event discarded");
        Ok(())
    }
}

/// Reference data consumed from the surrounding subsystems.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReferenceRecord {
    Assignment(Assignment),
    CohortConfig(CohortConfig),
    BaselinePlan(BaselinePlan),
    PlanTemplate(PlanTemplate),
    TemperatureReading(TemperatureReading),
    ProfilePoint(ProfilePoint),
    FeedRecord(FeedRecord),
    /// A manually planned activity, outside any template.
    PlannedActivity {
        cohort_id: String,
        assignment_id: Option<String>,
        activity_type: String,
        due_date: NaiveDate,
    },
    ActivityCompleted {
        activity_id: String,
        completed_on: NaiveDate,
    },
}

/// One line of an ingest file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum IngestRecord {
    Event(SourceEvent),
    Reference(ReferenceRecord),
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestOutcome {
    pub anchors: Vec<Anchor>,
    pub events: Vec<DomainEvent>,
    /// Anchors skipped because an identical one was already stored.
    pub duplicates: usize,
    pub references: usize,
}

impl IngestOutcome {
    fn absorb(&mut self, other: Self) {
        self.anchors.extend(other.anchors);
        self.events.extend(other.events);
        self.duplicates += other.duplicates;
        self.references += other.references;
    }
}

impl Engine {
    /// Normalize and append one source event, then publish one domain event
    /// per distinct (kind, scope, day) among the new anchors.
    ///
    /// # Errors
    ///
    /// `Validation` for impossible event values, store or publish failures.
    pub async fn ingest_event(
        &self,
        event: &SourceEvent,
        publisher: &dyn EventPublisher,
    ) -> Result<IngestOutcome, EngineError> {
        let mut outcome = IngestOutcome::default();
        for new in normalize(event)? {
            match self.store().append_anchor(&new).await? {
                Some(anchor) => {
                    if let Some(domain) = DomainEvent::for_anchor(&anchor)
                        && !outcome.events.contains(&domain)
                    {
                        outcome.events.push(domain);
                    }
                    outcome.anchors.push(anchor);
                }
                None => outcome.duplicates += 1,
            }
        }
        for domain in &outcome.events {
            publisher.publish(domain.clone()).await?;
        }
        tracing::info!(
            source_id = %event.source_id(),
            anchors = outcome.anchors.len(),
            duplicates = outcome.duplicates,
            "source event ingested"
        );
        Ok(outcome)
    }

    /// Store one reference record.
    ///
    /// # Errors
    ///
    /// Store failures, `NotFound` when completing an unknown activity.
    pub async fn ingest_reference(&self, record: &ReferenceRecord) -> Result<(), EngineError> {
        let store = self.store();
        match record {
            ReferenceRecord::Assignment(a) => store.upsert_assignment(a).await?,
            ReferenceRecord::CohortConfig(c) => store.upsert_cohort_config(c).await?,
            ReferenceRecord::BaselinePlan(p) => store.upsert_baseline_plan(p).await?,
            ReferenceRecord::PlanTemplate(t) => store.upsert_plan_template(t).await?,
            ReferenceRecord::TemperatureReading(r) => store.upsert_temperature_reading(r).await?,
            ReferenceRecord::ProfilePoint(p) => store.upsert_profile_point(p).await?,
            ReferenceRecord::FeedRecord(f) => store.upsert_feed_record(f).await?,
            ReferenceRecord::PlannedActivity {
                cohort_id,
                assignment_id,
                activity_type,
                due_date,
            } => {
                let (activity, _) = store
                    .insert_planned_activity(&NewActivity {
                        cohort_id,
                        assignment_id: assignment_id.as_deref(),
                        template_id: None,
                        activity_type,
                        due_date: *due_date,
                        idempotency_key: None,
                        trigger_day: None,
                    })
                    .await?;
                tracing::debug!(activity_id = %activity.id, "manual activity planned");
            }
            ReferenceRecord::ActivityCompleted {
                activity_id,
                completed_on,
            } => store.complete_activity(activity_id, *completed_on).await?,
        }
        Ok(())
    }

    /// Ingest a batch of records in order. Stops at the first failure.
    ///
    /// # Errors
    ///
    /// The first failing record's error.
    pub async fn ingest(
        &self,
        records: &[IngestRecord],
        publisher: &dyn EventPublisher,
    ) -> Result<IngestOutcome, EngineError> {
        let mut outcome = IngestOutcome::default();
        for record in records {
            match record {
                IngestRecord::Event(event) => {
                    outcome.absorb(self.ingest_event(event, publisher).await?);
                }
                IngestRecord::Reference(reference) => {
                    self.ingest_reference(reference).await?;
                    outcome.references += 1;
                }
            }
        }
        Ok(outcome)
    }
}
