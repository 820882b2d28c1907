//! Test case trait and the run entry point.
//!
//! ```text
//! run(case) ─► set_test_params ─► run_test ─► stop all ─► RunReport
//!                    │                │           │
//!                    └────── err ─────┴───────────┘
//!                                     ▼
//!                      teardown (stop / SIGTERM / SIGKILL)
//!                                     ▼
//!                         TestFailed { pids, source }
//! ```
//!
//! Cases only implement the two phases; the sequence above is fixed in
//! [`run`] and cannot be overridden.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use peerlab_core::config::HarnessConfig;
use peerlab_core::metrics as m;
use peerlab_node::{BoxFuture, NodeBackend, ProcessBackend};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::error::HarnessError;
use crate::harness::Harness;

/// One integration scenario.
pub trait TestCase: Send {
    /// Name used for data directories and log files.
    fn name(&self) -> &str;

    /// One-line summary shown by listings.
    fn description(&self) -> &str {
        ""
    }

    /// Registers the nodes the scenario needs.
    fn set_test_params(
        &mut self,
        harness: &mut Harness,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;

    /// Drives the scenario against the registered nodes.
    fn run_test(
        &mut self,
        harness: &mut Harness,
    ) -> impl Future<Output = Result<(), HarnessError>> + Send;
}

/// dyn-compatible counterpart of [`TestCase`], for registries of cases.
pub trait DynTestCase: Send {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn set_test_params<'a>(
        &'a mut self,
        harness: &'a mut Harness,
    ) -> BoxFuture<'a, Result<(), HarnessError>>;
    fn run_test<'a>(&'a mut self, harness: &'a mut Harness) -> BoxFuture<'a, Result<(), HarnessError>>;
}

impl<T: TestCase> DynTestCase for T {
    fn name(&self) -> &str {
        TestCase::name(self)
    }

    fn description(&self) -> &str {
        TestCase::description(self)
    }

    fn set_test_params<'a>(
        &'a mut self,
        harness: &'a mut Harness,
    ) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(TestCase::set_test_params(self, harness))
    }

    fn run_test<'a>(&'a mut self, harness: &'a mut Harness) -> BoxFuture<'a, Result<(), HarnessError>> {
        Box::pin(TestCase::run_test(self, harness))
    }
}

/// Summary of a passed case.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub case: String,
    pub run_id: Uuid,
    pub nodes: usize,
    pub duration: Duration,
}

/// Runs `case` against real node processes.
pub async fn run(case: &mut dyn DynTestCase, config: HarnessConfig) -> Result<RunReport, HarnessError> {
    run_with_backend(case, config, Arc::new(ProcessBackend)).await
}

/// Runs `case` with nodes bound through `backend`.
///
/// On any failure every node that had a process is torn down and the
/// error is wrapped in [`HarnessError::TestFailed`] with their pids.
pub async fn run_with_backend(
    case: &mut dyn DynTestCase,
    config: HarnessConfig,
    backend: Arc<dyn NodeBackend>,
) -> Result<RunReport, HarnessError> {
    let started = Instant::now();
    let name = case.name().to_owned();
    let mut harness = Harness::with_backend(&name, config, backend)?;
    let span = info_span!("test_case", case = %name, run_id = %harness.run_id());

    let outcome = async {
        info!("setting up nodes");
        case.set_test_params(&mut harness).await?;
        info!(nodes = harness.node_count(), "running scenario");
        case.run_test(&mut harness).await?;
        harness.stop().await
    }
    .instrument(span.clone())
    .await;

    match outcome {
        Ok(()) => {
            metrics::counter!(m::TEST_CASES_TOTAL, m::LABEL_RESULT => "passed").increment(1);
            let report = RunReport {
                case: name,
                run_id: harness.run_id(),
                nodes: harness.node_count(),
                duration: started.elapsed(),
            };
            span.in_scope(|| info!(duration_ms = report.duration.as_millis() as u64, "test case passed"));
            Ok(report)
        }
        Err(source) => {
            metrics::counter!(m::TEST_CASES_TOTAL, m::LABEL_RESULT => "failed").increment(1);
            let pids = harness.teardown().instrument(span.clone()).await;
            span.in_scope(|| error!(?pids, error = %source, "test case failed"));
            Err(HarnessError::TestFailed {
                pids,
                source: Box::new(source),
            })
        }
    }
}
