use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use tide_config::TideConfig;
use tide_db::service::TideService;
use tide_engine::Engine;
use tide_scheduler::{RecomputeScheduler, WorkerPool};

/// Shared application resources initialized once at startup.
pub struct AppContext {
    pub engine: Engine,
    pub scheduler: RecomputeScheduler,
    pub config: Arc<TideConfig>,
}

impl AppContext {
    /// Open the store named by `database.path` and wire the engine and scheduler to it.
    pub async fn init(config: TideConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);
        if !config.database.is_in_memory() {
            ensure_parent_dir(Path::new(&config.database.path))?;
        }

        let alert_dir = config
            .alerts
            .is_enabled()
            .then(|| PathBuf::from(&config.alerts.trail_dir));
        let store = Arc::new(
            TideService::new_local(&config.database.path, alert_dir)
                .await
                .with_context(|| format!("failed to open tide store at {}", config.database.path))?,
        );
        tracing::debug!(path = %config.database.path, "store opened");

        Ok(Self {
            engine: Engine::new(Arc::clone(&store), Arc::clone(&config)),
            scheduler: RecomputeScheduler::new(store, config.scheduler.clone()),
            config,
        })
    }

    #[must_use]
    pub fn workers(&self) -> WorkerPool {
        WorkerPool::new(self.engine.clone())
    }
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display())),
        _ => Ok(()),
    }
}
