//! Scrape endpoint for `peerlab run --metrics-listen`.
//!
//! Node start, connection wait and assertion metrics recorded during the run
//! are served in Prometheus text format. Every series carries the scenario
//! name as a global label, so scrapes of back-to-back runs do not merge.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use peerlab_core::metrics as m;
use tracing::{info, warn};

/// Exporter for one scenario run: `_seconds` histograms use the harness
/// duration buckets.
fn run_exporter(addr: SocketAddr, scenario: &str) -> Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .add_global_label(m::LABEL_SCENARIO, scenario)
        .set_buckets_for_metric(
            Matcher::Suffix("_seconds".to_owned()),
            m::DURATION_BUCKETS,
        )
        .context("invalid duration buckets")
}

/// Installs the global recorder and starts serving `addr` for `scenario`.
///
/// Must run before the harness starts its first node; earlier samples are
/// dropped.
///
/// # Errors
///
/// Fails when `addr` cannot be bound or a recorder is already installed.
pub fn serve_run_metrics(addr: SocketAddr, scenario: &str) -> Result<()> {
    if !addr.ip().is_loopback() {
        warn!(listen_addr = %addr, "metrics endpoint reachable from other hosts");
    }

    run_exporter(addr, scenario)?
        .install()
        .with_context(|| format!("cannot serve metrics on {addr}"))?;
    m::describe_all();

    info!(listen_addr = %addr, scenario, "serving run metrics");
    Ok(())
}
