//! `peerlab port` command handler

use std::io::Write;

use serde::Serialize;
use tracing::info;

use peerlab_core::config::HarnessConfig;
use peerlab_core::ports::PortAllocator;

use crate::cli::PortArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render};

/// Execute the `port` command.
pub async fn execute(
    args: PortArgs,
    config: &HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let report = draw_ports(&args, config).await?;
    writer.render(&report)
}

/// Draws `args.count` distinct free ports.
///
/// # Errors
///
/// Returns `CliError::Config` for an invalid range, and `CliError::Command`
/// when the range is smaller than the requested count or runs out of free
/// ports.
pub async fn draw_ports(args: &PortArgs, config: &HarnessConfig) -> Result<PortReport, CliError> {
    let start = args.start.unwrap_or(config.ports.range_start);
    let end = args.end.unwrap_or(config.ports.range_end);
    let allocator = PortAllocator::new(start, end)?;

    let available = usize::from(end - start) + 1;
    if args.count > available {
        return Err(CliError::Command(format!(
            "cannot draw {} ports from {}-{} ({} ports)",
            args.count, start, end, available
        )));
    }

    let mut ports = Vec::with_capacity(args.count);
    for _ in 0..args.count {
        let port = allocator.next_port().await.map_err(|e| {
            CliError::Command(format!("drew {} of {} ports: {e}", ports.len(), args.count))
        })?;
        ports.push(port);
    }
    info!(count = ports.len(), start, end, "ports drawn");

    Ok(PortReport { start, end, ports })
}

/// Ports nobody was listening on when drawn.
#[derive(Debug, Serialize)]
pub struct PortReport {
    pub start: u16,
    pub end: u16,
    pub ports: Vec<u16>,
}

impl Render for PortReport {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        for port in &self.ports {
            writeln!(w, "{port}")?;
        }
        Ok(())
    }
}
