use std::path::Path;

use anyhow::Context;
use figment::providers::Serialized;
use tide_config::TideConfig;

use crate::cli::GlobalFlags;

/// Load `.env`, layer the config files and environment, then apply `--db`.
pub fn load_config(flags: &GlobalFlags) -> anyhow::Result<TideConfig> {
    load_dotenv()?;
    config_from(TideConfig::figment(), flags)
}

fn config_from(figment: figment::Figment, flags: &GlobalFlags) -> anyhow::Result<TideConfig> {
    let figment = match &flags.db {
        Some(path) => figment.merge(Serialized::default("database.path", path)),
        None => figment,
    };
    TideConfig::from_figment(&figment).context("invalid tide configuration")
}

fn load_dotenv() -> anyhow::Result<()> {
    let project_env = Path::new(".tide").join(".env");
    if project_env.exists() {
        dotenvy::from_path(&project_env).with_context(|| {
            format!("failed to load dotenv file at {}", project_env.display())
        })?;
        return Ok(());
    }

    dotenvy::dotenv().ok();
    Ok(())
}
