//! Layered settings for the command-line surface.
//!
//! Defaults come from an optional `smerkle.toml` in the working directory,
//! overridden by `SMERKLE_*` environment variables; command-line flags win
//! over both.

use crate::error::ConfigError;
use crate::logging::LoggingConfig;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Name of the optional settings file.
pub const CONFIG_FILE: &str = "smerkle.toml";

/// Resolved settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Store directory.
    #[serde(default = "default_store")]
    pub store: PathBuf,

    /// Default walker concurrency; 0 means the host CPU count.
    #[serde(default)]
    pub concurrency: usize,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_store() -> PathBuf {
    PathBuf::from(".smerkle")
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store: default_store(),
            concurrency: 0,
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings for a working directory: `smerkle.toml` if present,
    /// then `SMERKLE_*` environment variables (e.g. `SMERKLE_STORE`,
    /// `SMERKLE_LOGGING__LEVEL`).
    pub fn load(dir: &Path) -> Result<Settings, ConfigError> {
        let cfg = Config::builder()
            .add_source(File::from(dir.join(CONFIG_FILE)).required(false))
            .add_source(Environment::with_prefix("SMERKLE").separator("__"))
            .build()?;

        Ok(cfg.try_deserialize()?)
    }
}
