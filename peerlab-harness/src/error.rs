//! Harness error type.

use peerlab_core::error::ConfigError;
use peerlab_node::error::{NodeError, RpcError};

/// Errors surfaced to test cases and to the caller of [`run`](crate::run).
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("node error: {0}")]
    Node(#[from] NodeError),

    #[error("rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("node index {index} out of range: {count} nodes registered")]
    NodeNotFound { index: usize, count: usize },

    /// An assertion failed. Every node was stopped before this was returned.
    #[error("assertion failed: {0}")]
    AssertionFailed(String),

    /// A scenario-level failure that is not an assertion.
    #[error("scenario error: {0}")]
    Scenario(String),

    #[error("errors stopping nodes: {0}")]
    StopFailed(String),

    /// The test case failed; the nodes listed by pid were torn down.
    #[error("process with pids {} failed: {source}", join_pids(.pids))]
    TestFailed {
        pids: Vec<u32>,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// The failure that caused a [`HarnessError::TestFailed`], or `self`.
    pub fn root(&self) -> &HarnessError {
        match self {
            Self::TestFailed { source, .. } => source.root(),
            other => other,
        }
    }
}

fn join_pids(pids: &[u32]) -> String {
    let pids: Vec<String> = pids.iter().map(u32::to_string).collect();
    format!("[{}]", pids.join(", "))
}
