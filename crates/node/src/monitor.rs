//! Deadline-bounded polling for a bilateral peer-connection state.
//!
//! Connection state is never cached: every poll reads both peer lists again.

use std::time::Duration;

use peerlab_core::config::TimeoutsConfig;
use peerlab_core::metrics as m;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::NodeError;
use crate::node::Node;

/// Deadline and poll interval of [`wait_for_peers_connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitOptions {
    pub deadline: Duration,
    pub poll_interval: Duration,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(15),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl WaitOptions {
    pub fn from_timeouts(timeouts: &TimeoutsConfig) -> Self {
        Self {
            deadline: timeouts.connection_deadline(),
            poll_interval: timeouts.poll_interval(),
        }
    }
}

/// True when both directions of the `a`/`b` link equal `want_connected`.
///
/// Fails when neither node runs, or when only one runs and a connection is
/// wanted. A node that is down counts as not seeing its peer.
pub async fn check_connection(
    a: &mut Node,
    b: &mut Node,
    want_connected: bool,
) -> Result<bool, NodeError> {
    let a_running = a.is_running();
    let b_running = b.is_running();

    if !a_running && !b_running {
        return Err(NodeError::NeitherRunning {
            a: a.name().to_owned(),
            b: b.name().to_owned(),
        });
    }
    if a_running != b_running && want_connected {
        return Err(NodeError::OnlyOneRunning {
            a: a.name().to_owned(),
            b: b.name().to_owned(),
            a_running,
            b_running,
        });
    }

    let b_in_a = a_running && a.is_peer_connected(b).await?;
    let a_in_b = b_running && b.is_peer_connected(a).await?;
    debug!(a = %a.name(), b = %b.name(), b_in_a, a_in_b, want_connected, "connection state");

    Ok(b_in_a == want_connected && a_in_b == want_connected)
}

/// Polls [`check_connection`] until it holds or `options.deadline` passes.
///
/// Every running node is pinged between polls to keep peer handshakes
/// moving; ping failures are logged only.
pub async fn wait_for_peers_connection(
    a: &mut Node,
    b: &mut Node,
    want_connected: bool,
    options: WaitOptions,
) -> Result<(), NodeError> {
    let started = Instant::now();
    let deadline = started + options.deadline;
    let state = if want_connected { "connected" } else { "disconnected" };

    loop {
        if check_connection(a, b, want_connected).await? {
            record_wait("ok", started);
            info!(
                a = %a.name(),
                b = %b.name(),
                state,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "peers reached expected state"
            );
            return Ok(());
        }

        if Instant::now() >= deadline {
            record_wait("timeout", started);
            return Err(NodeError::ConnectionTimeout {
                a: a.name().to_owned(),
                b: b.name().to_owned(),
                want_connected,
                deadline: options.deadline,
            });
        }

        tokio::time::sleep(options.poll_interval).await;

        for node in [&mut *a, &mut *b] {
            if node.is_running() {
                if let Err(e) = node.rpc().ping().await {
                    warn!(node = %node.name(), error = %e, "ping failed while waiting for peers");
                }
            }
        }
    }
}

fn record_wait(result: &'static str, started: Instant) {
    metrics::counter!(m::CONNECTION_WAITS_TOTAL, m::LABEL_RESULT => result).increment(1);
    metrics::histogram!(m::CONNECTION_WAIT_DURATION_SECONDS, m::LABEL_RESULT => result)
        .record(started.elapsed().as_secs_f64());
}
