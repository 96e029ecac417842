//! # tide-config
//!
//! Layered configuration loading for Tide using figment.
//!
//! Configuration sources (in priority order, highest wins):
//! 1. Environment variables (`TIDE_*` prefix, `__` as separator)
//! 2. Project-level `.tide/config.toml`
//! 3. User-level `~/.config/tide/config.toml`
//! 4. Built-in defaults
//!
//! Figment maps `TIDE_SCHEDULER__WORKERS` -> `scheduler.workers`,
//! `TIDE_DATABASE__PATH` -> `database.path`, and so on.
//!
//! ```no_run
//! use tide_config::TideConfig;
//!
//! let config = TideConfig::load_with_dotenv().expect("config");
//! println!("store: {}", config.database.path);
//! ```

mod alerts;
mod database;
mod error;
mod growth;
mod projector;
mod retention;
mod scheduler;

pub use alerts::AlertsConfig;
pub use database::DatabaseConfig;
pub use error::ConfigError;
pub use growth::GrowthConfig;
pub use projector::ProjectorConfig;
pub use retention::RetentionConfig;
pub use scheduler::SchedulerConfig;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TideConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub growth: GrowthConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub projector: ProjectorConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

impl TideConfig {
    /// Load configuration from TOML files and environment variables, then validate.
    ///
    /// Does NOT call `dotenvy`; use [`Self::load_with_dotenv`] for `.env` support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(&Self::figment())
    }

    /// Load configuration with `.env` file support.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn load_with_dotenv() -> Result<Self, ConfigError> {
        Self::load_dotenv_from_workspace();
        Self::load()
    }

    /// Extract and validate from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if extraction fails or a value is out of range.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Build the figment provider chain.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            figment = figment.merge(Toml::file(global_path));
        }

        let local_path = PathBuf::from(".tide/config.toml");
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("TIDE_").split("__"))
    }

    /// Reject values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` or `ConfigError::UnknownCoefficientSet`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn invalid(field: &str, reason: &str) -> ConfigError {
            ConfigError::InvalidValue {
                field: field.to_string(),
                reason: reason.to_string(),
            }
        }

        if self.database.path.is_empty() {
            return Err(invalid("database.path", "must not be empty"));
        }
        self.growth.coefficients(None)?;
        for (name, set) in &self.growth.coefficient_sets {
            if !(set.tgc.is_finite() && set.tgc > 0.0) {
                return Err(invalid(
                    &format!("growth.coefficient_sets.{name}.tgc"),
                    "must be positive",
                ));
            }
        }
        if self.scheduler.workers == 0 {
            return Err(invalid("scheduler.workers", "must be at least 1"));
        }
        if self.scheduler.max_attempts == 0 {
            return Err(invalid("scheduler.max_attempts", "must be at least 1"));
        }
        if self.scheduler.task_lease_secs < 3 {
            return Err(invalid("scheduler.task_lease_secs", "must be at least 3"));
        }
        if self.scheduler.sweep_lookback_days < 0 {
            return Err(invalid("scheduler.sweep_lookback_days", "must not be negative"));
        }
        if self.projector.horizon_days <= 0 {
            return Err(invalid("projector.horizon_days", "must be positive"));
        }
        if self.projector.bias_window_days <= 0 {
            return Err(invalid("projector.bias_window_days", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.projector.daily_mortality_rate) {
            return Err(invalid(
                "projector.daily_mortality_rate",
                "must be in [0, 1)",
            ));
        }
        if self.projector.default_target_weight_g <= 0.0 {
            return Err(invalid("projector.default_target_weight_g", "must be positive"));
        }
        if self.retention.daily_state_days < 0 || self.retention.projection_days < 0 {
            return Err(invalid("retention", "days must not be negative"));
        }
        Ok(())
    }

    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("tide").join("config.toml"))
    }

    /// Load `.env` from the workspace root, walking up from `CARGO_MANIFEST_DIR`.
    /// Silently does nothing if no `.env` is found.
    fn load_dotenv_from_workspace() {
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            let mut dir = PathBuf::from(manifest_dir);
            for _ in 0..3 {
                let env_path = dir.join(".env");
                if env_path.exists() {
                    let _ = dotenvy::from_path(&env_path);
                    return;
                }
                if !dir.pop() {
                    break;
                }
            }
        }

        let _ = dotenvy::dotenv();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TideConfig::default();
        config.validate().unwrap();
        assert_eq!(config.scheduler.max_attempts, 3);
        assert_eq!(config.projector.bias_window_days, 14);
        assert!(config.alerts.is_enabled());
    }

    #[test]
    fn figment_builds_without_files() {
        let config: TideConfig = TideConfig::figment()
            .extract()
            .expect("should extract defaults");
        assert_eq!(config.growth.default_coefficient_set, "default");
    }

    #[test]
    fn zero_workers_rejected() {
        let mut config = TideConfig::default();
        config.scheduler.workers = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "scheduler.workers"
        ));
    }

    #[test]
    fn missing_default_coefficient_set_rejected() {
        let mut config = TideConfig::default();
        config.growth.default_coefficient_set = "nope".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownCoefficientSet { .. })
        ));
    }
}
