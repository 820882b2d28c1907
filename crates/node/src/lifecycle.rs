//! Bounded-retry node startup.
//!
//! ```text
//! attempt 1 ─► start ─ ok ──► lock config, done
//!                 │
//!                 └ err ─► stop (logged) ─► mutable? regenerate ports ─► attempt 2 ...
//!
//! last attempt failed ─► StartupFailed { attempts, source: last error }
//! ```

use std::time::Instant;

use peerlab_core::generator::ConfigGenerator;
use peerlab_core::metrics as m;
use tracing::{info, warn};

use crate::error::NodeError;
use crate::node::Node;

/// Default number of start attempts.
pub const DEFAULT_START_ATTEMPTS: u32 = 3;

/// Starts `node`, retrying up to `attempts` times.
///
/// Between attempts the node is stopped, and its endpoints are regenerated
/// when its configuration is still mutable, so a port lost to another
/// process is not retried. On success the configuration is locked.
pub async fn run_node(
    node: &mut Node,
    generator: &ConfigGenerator,
    attempts: u32,
) -> Result<(), NodeError> {
    let attempts = attempts.max(1);
    let started = Instant::now();
    let variant = node.variant().as_str();

    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match node.start().await {
            Ok(()) => {
                node.lock_config();
                metrics::counter!(m::NODE_STARTS_TOTAL, m::LABEL_VARIANT => variant).increment(1);
                metrics::histogram!(m::NODE_START_ATTEMPTS, m::LABEL_VARIANT => variant)
                    .record(f64::from(attempt));
                info!(
                    node = %node.name(),
                    attempt,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "node is up"
                );
                return Ok(());
            }
            Err(e) => e,
        };

        warn!(node = %node.name(), attempt, attempts, error = %err, "node failed to start");

        if let Err(stop_err) = node.stop().await {
            warn!(node = %node.name(), error = %stop_err, "cleanup after failed start also failed");
        }

        if attempt == attempts {
            metrics::counter!(m::NODE_START_FAILURES_TOTAL, m::LABEL_VARIANT => variant).increment(1);
            return Err(NodeError::StartupFailed {
                name: node.name().to_owned(),
                variant: node.variant(),
                attempts,
                source: Box::new(err),
            });
        }

        if !node.is_locked() {
            node.regenerate_configs(generator).await?;
        }
    }
}
