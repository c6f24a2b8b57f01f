//! CLI subcommands.

pub mod batch;
pub mod check;
pub mod config;
pub mod process;

use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

use billscan_core::BillscanConfig;

/// Location of the user configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("billscan")
        .join("config.json")
}

/// Load the explicit config file, else the user file if present, else
/// defaults. Environment overrides are applied last.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<BillscanConfig> {
    let mut config = match config_path {
        Some(path) => BillscanConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => {
            let path = default_config_path();
            if path.exists() {
                BillscanConfig::from_file(&path)
                    .with_context(|| format!("Failed to load config from {}", path.display()))?
            } else {
                BillscanConfig::default()
            }
        }
    };

    config.apply_env_overrides();
    debug!("Using config: {:?}", config);

    Ok(config)
}
