//! addnode -> bilateral convergence -> stop -> disconnection.

use std::time::Duration;

use crate::helpers::config::TestConfigBuilder;
use crate::helpers::harness::{mock_harness, start_all};

use peerlab_core::types::NodeVariant;
use peerlab_harness::HarnessError;
use peerlab_node::{AddNodeCommand, NodeError};

/// utreexod + bitcoind converge after addnode, then diverge when one stops.
#[tokio::test]
async fn test_e2e_connect_then_stop_converges_both_ways() {
    // Given: utreexod and bitcoind running, not yet peers
    let temp = tempfile::tempdir().unwrap();
    let (mut h, network) = mock_harness("Connectivity", TestConfigBuilder::new(temp.path()).build());
    start_all(&mut h, &[NodeVariant::Utreexod, NodeVariant::Bitcoind]).await;
    assert!(h.check_connection(0, 1, false).await.unwrap());

    // When: bitcoind dials utreexod
    let utreexod_url = h.get_node(0).unwrap().p2p_url();
    h.get_node(1)
        .unwrap()
        .rpc()
        .add_node(&utreexod_url, AddNodeCommand::Add, false)
        .await
        .unwrap();

    // Then
    h.wait_for_peers_connections(0, 1, true).await.unwrap();
    assert!(network.is_linked(0, 1));

    // When: bitcoind goes away
    h.stop_node(1).await.unwrap();

    // Then: "disconnected" holds with one side down
    h.wait_for_peers_connections(0, 1, false).await.unwrap();
    let err = h.check_connection(0, 1, true).await.unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Node(NodeError::OnlyOneRunning { .. })
    ));
}

/// Links that need a few pings to appear are waited for, not failed.
#[tokio::test(start_paused = true)]
async fn test_e2e_slow_handshake_is_polled_until_ready() {
    let temp = tempfile::tempdir().unwrap();
    let (mut h, network) = mock_harness("SlowHandshake", TestConfigBuilder::new(temp.path()).build());
    network.delay_links(3);
    start_all(&mut h, &[NodeVariant::Florestad, NodeVariant::Bitcoind]).await;

    let bitcoind_url = h.get_node(1).unwrap().p2p_url();
    h.get_node(0)
        .unwrap()
        .rpc()
        .add_node(&bitcoind_url, AddNodeCommand::Add, true)
        .await
        .unwrap();
    assert!(!network.is_linked(0, 1));

    h.wait_for_peers_connections(0, 1, true).await.unwrap();

    assert!(network.pings(0) >= 1);
    assert!(network.is_linked(0, 1));
}

/// bitcoind lists a utreexod that dialed it under an ephemeral port, so the
/// link never counts as bilateral.
#[tokio::test(start_paused = true)]
async fn test_e2e_utreexod_dialing_bitcoind_is_not_seen_by_address() {
    let temp = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(temp.path())
        .connection_deadline_secs(2)
        .poll_interval_ms(500)
        .build();
    let (mut h, network) = mock_harness("InboundUtreexod", config);
    start_all(&mut h, &[NodeVariant::Utreexod, NodeVariant::Bitcoind]).await;

    let bitcoind_url = h.get_node(1).unwrap().p2p_url();
    h.get_node(0)
        .unwrap()
        .rpc()
        .add_node(&bitcoind_url, AddNodeCommand::Add, false)
        .await
        .unwrap();

    assert!(network.is_linked(0, 1));
    let err = h.wait_for_peers_connections(0, 1, true).await.unwrap_err();
    assert!(matches!(
        err,
        HarnessError::Node(NodeError::ConnectionTimeout { .. })
    ));
}

/// A link that never forms fails after the configured deadline.
#[tokio::test(start_paused = true)]
async fn test_e2e_connection_deadline_names_participants() {
    let temp = tempfile::tempdir().unwrap();
    let config = TestConfigBuilder::new(temp.path())
        .connection_deadline_secs(4)
        .poll_interval_ms(500)
        .build();
    let (mut h, _network) = mock_harness("Deadline", config);
    start_all(&mut h, &[NodeVariant::Florestad, NodeVariant::Bitcoind]).await;

    let started = tokio::time::Instant::now();
    let err = h.wait_for_peers_connections(0, 1, true).await.unwrap_err();

    assert!(started.elapsed() >= Duration::from_secs(4));
    match err {
        HarnessError::Node(NodeError::ConnectionTimeout {
            a,
            b,
            want_connected,
            deadline,
        }) => {
            assert_eq!((a.as_str(), b.as_str()), ("florestad0", "bitcoind0"));
            assert!(want_connected);
            assert_eq!(deadline, Duration::from_secs(4));
        }
        other => panic!("expected ConnectionTimeout, got {other}"),
    }
}

/// Waiting on two stopped nodes is an error, not a silent success.
#[tokio::test]
async fn test_e2e_neither_running_fails_fast() {
    let temp = tempfile::tempdir().unwrap();
    let (mut h, _network) = mock_harness("NeitherRunning", TestConfigBuilder::new(temp.path()).build());
    h.add_node_default_args(NodeVariant::Florestad).await.unwrap();
    h.add_node_default_args(NodeVariant::Utreexod).await.unwrap();

    let err = h.wait_for_peers_connections(1, 0, false).await.unwrap_err();

    assert!(matches!(
        err,
        HarnessError::Node(NodeError::NeitherRunning { .. })
    ));
}
