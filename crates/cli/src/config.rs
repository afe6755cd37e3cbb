//! CLI configuration utilities

use anyhow::{Context, Result};
use energy_http::ClientConfig;
use energy_session::StorageKeys;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Backend used when nothing else is configured
const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// Effective CLI configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Backend client settings
    pub client: ClientConfig,

    /// Storage keys of the standard and dashboard sessions
    #[serde(default)]
    pub storage_keys: StorageKeys,

    /// Where sessions are persisted; defaults to `<data dir>/sessions`
    #[serde(default)]
    pub storage_dir: Option<PathBuf>,
}

/// Load configuration from defaults, an optional file and `ENERGY_*` variables
///
/// Nested keys use a double underscore, e.g. `ENERGY_CLIENT__BASE_URL`.
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let mut builder = config::Config::builder()
        .set_default("client.base_url", DEFAULT_BASE_URL)?;

    if let Some(path) = path {
        builder = builder.add_source(config::File::from(path).required(true));
    }

    let settings = builder
        .add_source(
            config::Environment::with_prefix("ENERGY")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("Failed to load configuration")?;

    settings
        .try_deserialize()
        .context("Invalid configuration")
}

/// Data directory: explicit flag/env, then the platform data dir
pub fn resolve_data_dir(data_dir: Option<PathBuf>) -> PathBuf {
    data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("energy")
    })
}

impl CliConfig {
    pub fn storage_dir(&self, data_dir: &Path) -> PathBuf {
        self.storage_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("sessions"))
    }
}
