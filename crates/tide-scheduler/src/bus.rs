//! In-process broadcast of domain events.
//!
//! Consumers must be idempotent: a lagging receiver skips events, and the
//! nightly sweep is what eventually covers them.

use async_trait::async_trait;
use tokio::sync::broadcast;

use tide_core::events::DomainEvent;
use tide_engine::EngineError;
use tide_engine::ingest::EventPublisher;

/// Events held for slow receivers before they start lagging.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }

    #[must_use]
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: DomainEvent) -> Result<(), EngineError> {
        if self.sender.send(event).is_err() {
            tracing::warn!("domain event published with no subscriber; left to the sweep");
        }
        Ok(())
    }
}
