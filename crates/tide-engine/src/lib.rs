//! # tide-engine
//!
//! Growth state assimilation and forward projection on top of `tide-db`:
//!
//! - [`reconstruct`]: day-by-day Daily State Reconstructor with FCR and
//!   confidence tiering
//! - [`triggers`]: exactly-once plan template triggering
//! - [`projector`]: temperature-biased forward projection with urgency tiers
//! - [`recompute`]: execution of one queued recompute scope
//! - [`ingest`]: source events and reference records into the store
//! - [`read`]: read shapes with staleness

pub mod error;
pub mod ingest;
pub mod projector;
pub mod read;
pub mod recompute;
pub mod reconstruct;
pub mod triggers;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use chrono::NaiveDate;
use tide_config::TideConfig;
use tide_core::clock::{Clock, SystemClock};
use tide_core::confidence::ConfidenceBands;
use tide_core::growth::{CubeRootTgc, GrowthModel};
use tide_db::service::TideService;

pub use error::EngineError;

/// Shared handle for every engine operation. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    store: Arc<TideService>,
    config: Arc<TideConfig>,
    model: Arc<dyn GrowthModel>,
    clock: Arc<dyn Clock>,
    bands: ConfidenceBands,
}

impl Engine {
    /// Engine with the cube-root TGC model and the system clock.
    pub fn new(store: Arc<TideService>, config: Arc<TideConfig>) -> Self {
        Self {
            store,
            config,
            model: Arc::new(CubeRootTgc),
            clock: Arc::new(SystemClock),
            bands: ConfidenceBands::default(),
        }
    }

    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn GrowthModel>) -> Self {
        self.model = model;
        self
    }

    #[must_use]
    pub fn store(&self) -> &TideService {
        &self.store
    }

    #[must_use]
    pub fn config(&self) -> &TideConfig {
        &self.config
    }

    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
