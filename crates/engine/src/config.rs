use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::PathBuf;

use super::error::Error;

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Capacity of the admission queue's request channel.
    pub queue_capacity: usize,
    /// Capacity of the snapshot feed channel.
    pub snapshot_buffer_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SimulatorConfig {
    pub asset_count: usize,
    pub edge_probability: f64,
    pub min_rate: f64,
    pub max_rate: f64,
    pub refresh_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub engine: EngineConfig,
    pub simulator: SimulatorConfig,
}

/// Loads configuration from a file and environment variables.
pub fn load_config() -> Result<Config, Error> {
    let base_path = env::current_dir().map_err(|e| {
        Error::ConfigLoadError(format!("Failed to determine current directory: {}", e))
    })?;

    let config_file_path: PathBuf = base_path.join("crates").join("engine").join("Config.toml");

    if !config_file_path.exists() {
        return Err(Error::ConfigLoadError(format!(
            "Configuration file not found at calculated path: {}",
            config_file_path.display()
        )));
    }

    let s = ConfigLoader::builder()
        .add_source(File::from(config_file_path.as_path()).required(true))
        .add_source(
            Environment::with_prefix("ENGINE")
                .try_parsing(true)
                .separator("_"),
        )
        .build()
        .map_err(|e| Error::ConfigLoadError(e.to_string()))?;

    let app_config: Config = s
        .try_deserialize()
        .map_err(|e| Error::ConfigLoadError(format!("Failed to deserialize config: {}", e)))?;

    Ok(app_config)
}
