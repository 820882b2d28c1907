use std::path::Path;

use clap::Parser;

use peerlab_cli::cli::{Cli, Commands};
use peerlab_cli::commands;
use peerlab_cli::error::CliError;
use peerlab_cli::metrics_server;
use peerlab_cli::output::OutputWriter;
use peerlab_core::config::GeneralConfig;
use peerlab_harness::logging::init_tracing;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e}");
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let writer = OutputWriter::new(cli.output);

    match cli.command {
        // neither needs a valid configuration
        Commands::List => {
            init_logging(&GeneralConfig::default(), cli.log_level, None)?;
            commands::list::execute(&writer)
        }
        Commands::Config(args) => {
            init_logging(&GeneralConfig::default(), cli.log_level, None)?;
            commands::config::execute(args, &cli.config, &writer).await
        }
        Commands::Port(args) => {
            let config = commands::load_config(&cli.config).await?;
            init_logging(&config.general, cli.log_level, None)?;
            commands::port::execute(args, &config, &writer).await
        }
        Commands::Run(args) => {
            let config = commands::load_config(&cli.config).await?;
            let log_file = config
                .general
                .log_to_file
                .then(|| config.test_log_path(&args.scenario));
            init_logging(&config.general, cli.log_level, log_file.as_deref())?;
            tracing::info!(config = %cli.config.display(), scenario = %args.scenario, "peerlab starting");

            if let Some(addr) = cli.metrics_listen {
                metrics_server::serve_run_metrics(addr, &args.scenario)
                    .map_err(|e| CliError::Command(format!("{e:#}")))?;
            }
            commands::run::execute(args, config, &writer).await
        }
    }
}

fn init_logging(
    general: &GeneralConfig,
    log_level: Option<String>,
    log_file: Option<&Path>,
) -> Result<(), CliError> {
    let mut general = general.clone();
    if let Some(level) = log_level {
        general.log_level = level;
    }
    init_tracing(&general, log_file).map_err(|e| CliError::Command(e.to_string()))
}
