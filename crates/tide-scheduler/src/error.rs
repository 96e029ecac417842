//! Scheduler error type.

use thiserror::Error;
use tide_core::errors::CoreError;
use tide_db::error::DatabaseError;
use tide_engine::EngineError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A worker task panicked or was cancelled.
    #[error("Worker stopped abnormally: {0}")]
    Worker(String),
}
