//! Command handlers -- one module per subcommand

pub mod config;
pub mod list;
pub mod port;
pub mod run;

use std::path::Path;

use peerlab_core::config::HarnessConfig;
use tracing::debug;

use crate::error::CliError;

/// Loads the effective configuration.
///
/// The file is optional: when it does not exist, defaults plus
/// `PEERLAB_*` environment overrides are used.
pub async fn load_config(config_path: &Path) -> Result<HarnessConfig, CliError> {
    if tokio::fs::try_exists(config_path).await? {
        debug!(path = %config_path.display(), "loading configuration file");
        Ok(HarnessConfig::load(config_path).await?)
    } else {
        debug!(path = %config_path.display(), "no configuration file, using environment");
        Ok(HarnessConfig::from_env()?)
    }
}

/// Human-readable source label for reports.
pub(crate) fn config_source(config_path: &Path) -> String {
    if config_path.exists() {
        config_path.display().to_string()
    } else {
        "defaults + environment".to_owned()
    }
}
