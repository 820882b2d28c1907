//! Harness factory for E2E tests.
//!
//! Every harness is bound to its own `MockNetwork`; node `i` of the harness
//! is node `i` of the network.

use peerlab_core::config::HarnessConfig;
use peerlab_harness::Harness;
use peerlab_node::mock::MockNetwork;

/// Harness for case `case` plus the network behind it.
#[allow(dead_code)]
pub fn mock_harness(case: &str, config: HarnessConfig) -> (Harness, MockNetwork) {
    let network = MockNetwork::new();
    let harness = Harness::with_backend(case, config, network.backend())
        .expect("harness should build from a valid config");
    (harness, network)
}

/// Registers `variants` with default configuration and starts each of them.
#[allow(dead_code)]
pub async fn start_all(harness: &mut Harness, variants: &[peerlab_core::types::NodeVariant]) {
    for &variant in variants {
        let idx = harness
            .add_node_default_args(variant)
            .await
            .expect("node should register");
        harness.run_node(idx).await.expect("node should start");
    }
}
