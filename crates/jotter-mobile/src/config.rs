//! Runtime configuration for the app shell.

use std::path::{Path, PathBuf};

use jotter_core::config::ClientConfig;

use crate::error::AppError;

const CONFIG_FILE: &str = "config.json";
const ENV_CONFIG_PATH: &str = "JOTTER_CONFIG";

/// Config file location: `JOTTER_CONFIG`, else `<config dir>/jotter/config.json`.
pub fn default_config_path() -> PathBuf {
    std::env::var_os(ENV_CONFIG_PATH).map_or_else(
        || {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("jotter")
                .join(CONFIG_FILE)
        },
        PathBuf::from,
    )
}

/// Load the config file (when present) and apply environment overrides.
pub fn load_config() -> Result<ClientConfig, AppError> {
    load_config_from(&default_config_path(), |name| std::env::var(name).ok())
}

pub fn load_config_from<F>(path: &Path, lookup: F) -> Result<ClientConfig, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    let base = if path.exists() {
        tracing::debug!("Loading config from {}", path.display());
        ClientConfig::load_file(path).map_err(AppError::Config)?
    } else {
        ClientConfig::default()
    };

    let config = base.with_env_overrides(lookup).map_err(AppError::Config)?;
    config.validate().map_err(AppError::Config)?;
    Ok(config)
}
