//! Engine error type.

use thiserror::Error;
use tide_config::ConfigError;
use tide_core::errors::CoreError;
use tide_db::error::DatabaseError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A domain event could not be handed to its consumer.
    #[error("Event publish failed: {0}")]
    Publish(String),
}

impl EngineError {
    /// The domain error behind this one, whether raised here or by the store.
    #[must_use]
    pub const fn core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(e) | Self::Database(DatabaseError::Core(e)) => Some(e),
            _ => None,
        }
    }

    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self.core(), Some(CoreError::NotFound { .. }))
    }

    #[must_use]
    pub const fn is_missing_baseline(&self) -> bool {
        matches!(self.core(), Some(CoreError::MissingBaseline { .. }))
    }
}
