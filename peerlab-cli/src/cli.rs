//! CLI argument parsing using clap derive API
//!
//! This module defines the command-line interface structure using clap's derive macros.
//! It is purely declarative with no side effects or I/O.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// peerlab -- integration scenarios for florestad, utreexod and bitcoind.
///
/// Use `peerlab <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "peerlab", version, about, long_about = None)]
pub struct Cli {
    /// Path to the peerlab.toml configuration file (optional).
    #[arg(short, long, default_value = "peerlab.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Expose Prometheus metrics on this address while the command runs.
    #[arg(long, global = true)]
    pub metrics_listen: Option<SocketAddr>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a built-in scenario against real node binaries.
    Run(RunArgs),

    /// List built-in scenarios.
    List,

    /// Draw free localhost ports.
    Port(PortArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- run ----

/// Run one built-in scenario.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Scenario name (see `peerlab list`).
    pub scenario: String,
}

// ---- port ----

/// Draw distinct ports nobody listens on.
#[derive(Args, Debug)]
pub struct PortArgs {
    /// Number of ports to draw.
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,

    /// Lowest port (inclusive). Defaults to `[ports] range_start`.
    #[arg(long)]
    pub start: Option<u16>,

    /// Highest port (inclusive). Defaults to `[ports] range_end`.
    #[arg(long)]
    pub end: Option<u16>,
}

// ---- config ----

/// Manage peerlab configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration and report errors.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only a specific section (general, paths, ports, timeouts, tls).
        #[arg(long)]
        section: Option<String>,
    },
}
