//! `peerlab run` command handler

use std::io::Write;
use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use peerlab_core::config::HarnessConfig;
use peerlab_harness::{HarnessError, RunReport};
use peerlab_node::{NodeBackend, ProcessBackend};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::output::{OutputWriter, Render, verdict, write_detail};
use crate::scenarios;

/// Execute the `run` command against real node binaries.
pub async fn execute(
    args: RunArgs,
    config: HarnessConfig,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    execute_with_backend(args, config, Arc::new(ProcessBackend), writer).await
}

/// Execute the `run` command with nodes bound through `backend`.
///
/// The outcome is rendered in both cases; a failed scenario is also
/// returned as `CliError::Harness` so the process exits non-zero.
pub async fn execute_with_backend(
    args: RunArgs,
    config: HarnessConfig,
    backend: Arc<dyn NodeBackend>,
    writer: &OutputWriter,
) -> Result<(), CliError> {
    let mut case = scenarios::find(&args.scenario).ok_or_else(|| {
        let known: Vec<String> = scenarios::builtin()
            .iter()
            .map(|c| c.name().to_owned())
            .collect();
        CliError::Command(format!(
            "unknown scenario: {} (expected one of: {})",
            args.scenario,
            known.join(", ")
        ))
    })?;

    info!(scenario = %args.scenario, "running scenario");
    match peerlab_harness::run_with_backend(case.as_mut(), config, backend).await {
        Ok(report) => {
            writer.render(&RunSummary::passed(&report))?;
            Ok(())
        }
        Err(e) => {
            writer.render(&RunSummary::failed(&args.scenario, &e))?;
            Err(e.into())
        }
    }
}

/// Outcome of one scenario run.
#[derive(Debug, Serialize)]
pub struct RunSummary {
    pub scenario: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Processes torn down after a failure.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pids: Vec<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    pub fn passed(report: &RunReport) -> Self {
        Self {
            scenario: report.case.clone(),
            passed: true,
            run_id: Some(report.run_id.to_string()),
            nodes: Some(report.nodes),
            duration_ms: Some(u64::try_from(report.duration.as_millis()).unwrap_or(u64::MAX)),
            pids: Vec::new(),
            error: None,
        }
    }

    pub fn failed(scenario: &str, err: &HarnessError) -> Self {
        let (pids, cause) = match err {
            HarnessError::TestFailed { pids, source } => (pids.clone(), source.to_string()),
            other => (Vec::new(), other.to_string()),
        };
        Self {
            scenario: scenario.to_owned(),
            passed: false,
            run_id: None,
            nodes: None,
            duration_ms: None,
            pids,
            error: Some(cause),
        }
    }
}

impl Render for RunSummary {
    fn render_text(&self, w: &mut dyn Write) -> std::io::Result<()> {
        use colored::Colorize;

        let heading = verdict(self.passed, "PASSED", "FAILED");
        match (self.nodes, self.duration_ms) {
            (Some(nodes), Some(ms)) => {
                writeln!(w, "{heading} {} ({nodes} nodes, {ms} ms)", self.scenario.bold())?
            }
            _ => writeln!(w, "{heading} {}", self.scenario.bold())?,
        }
        if let Some(ref run_id) = self.run_id {
            write_detail(w, format_args!("run id: {run_id}"))?;
        }
        if !self.pids.is_empty() {
            write_detail(w, format_args!("torn down pids: {:?}", self.pids))?;
        }
        if let Some(ref error) = self.error {
            for line in error.lines() {
                write_detail(w, line.red())?;
            }
        }
        Ok(())
    }
}
