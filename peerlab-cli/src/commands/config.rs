//! `peerlab config` command handler

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use peerlab_core::config::HarnessConfig;

use crate::cli::{ConfigAction, ConfigArgs};
use crate::commands::{config_source, load_config};
use crate::error::CliError;
use crate::output::{OutputWriter, Render, verdict, write_detail};

const SECTIONS: [&str; 5] = ["general", "paths", "ports", "timeouts", "tls"];

/// Execute the `config` command.
pub async fn execute(
    args: ConfigArgs,
    config_path: &Path,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    match args.action {
        ConfigAction::Validate => execute_validate(config_path, writer).await,
        ConfigAction::Show { section } => execute_show(config_path, section, writer).await,
    }
}

/// Loads and validates the configuration, rendering a report either way.
///
/// # Errors
///
/// Returns `CliError::Config` if the configuration is invalid.
async fn execute_validate(config_path: &Path, writer: &OutputWriter) -> Result<(), CliError> {
    info!(path = %config_path.display(), "validating configuration");

    let report = validation_report(config_path).await;
    writer.render(&report)?;

    if !report.valid {
        return Err(CliError::Config("configuration is invalid".to_owned()));
    }
    Ok(())
}

pub async fn validation_report(config_path: &Path) -> ConfigValidationReport {
    let source = config_source(config_path);
    match load_config(config_path).await {
        Ok(_) => ConfigValidationReport {
            source,
            valid: true,
            errors: Vec::new(),
        },
        Err(e) => ConfigValidationReport {
            source,
            valid: false,
            errors: vec![e.to_string()],
        },
    }
}

/// Displays the effective configuration (file + env overrides + defaults).
///
/// # Errors
///
/// Returns `CliError::Config` if loading fails or `CliError::Command` if
/// the section name is unknown.
async fn execute_show(
    config_path: &Path,
    section: Option<String>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    info!(path = %config_path.display(), "loading configuration");

    let config = load_config(config_path).await?;
    let report = config_report(&config, config_source(config_path), section)?;
    writer.render(&report)
}

pub fn config_report(
    config: &HarnessConfig,
    source: String,
    section: Option<String>,
) -> Result<ConfigReport, CliError> {
    let config_toml = match section.as_deref() {
        None => to_toml(config),
        Some("general") => to_toml(&config.general),
        Some("paths") => to_toml(&config.paths),
        Some("ports") => to_toml(&config.ports),
        Some("timeouts") => to_toml(&config.timeouts),
        Some("tls") => to_toml(&config.tls),
        Some(other) => {
            return Err(CliError::Command(format!(
                "unknown section: {} (expected: {})",
                other,
                SECTIONS.join(", ")
            )));
        }
    };

    Ok(ConfigReport {
        source,
        section,
        config_toml,
    })
}

fn to_toml<T: Serialize>(value: &T) -> String {
    toml::to_string_pretty(value).unwrap_or_else(|e| format!("(serialization error: {})", e))
}

/// Configuration display report.
///
/// `config_toml` is only used for text rendering.
#[derive(Serialize)]
pub struct ConfigReport {
    /// Configuration source (file path, or defaults + environment)
    pub source: String,
    /// Optional section name (None = full config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip)]
    pub config_toml: String,
}

impl Render for ConfigReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let title = match self.section {
            Some(ref section) => format!("# [{section}] from {}", self.source),
            None => format!("# effective configuration from {}", self.source),
        };
        writeln!(w, "{}", title.dimmed())?;
        write!(w, "{}", self.config_toml)
    }
}

/// Configuration validation report.
#[derive(Serialize)]
pub struct ConfigValidationReport {
    pub source: String,
    pub valid: bool,
    /// Validation error messages (empty if valid)
    pub errors: Vec<String>,
}

impl Render for ConfigValidationReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        writeln!(w, "{}: {}", self.source, verdict(self.valid, "ok", "invalid"))?;
        for err in &self.errors {
            write_detail(w, format_args!("- {err}"))?;
        }
        Ok(())
    }
}
