//! Integration tests for the metrics server.

use peerlab_cli::metrics_server;
use serial_test::serial;

#[test]
#[serial]
fn test_run_metrics_installed_once_per_process() {
    // Given: a free loopback address
    let addr = "127.0.0.1:19181".parse().expect("valid address");

    // When: installing the recorder twice
    let first = metrics_server::serve_run_metrics(addr, "connectivity");
    let second =
        metrics_server::serve_run_metrics("127.0.0.1:19182".parse().unwrap(), "get-block");

    // Then: only the first install succeeds
    assert!(first.is_ok(), "first install should succeed: {:?}", first.err());
    assert!(second.is_err(), "a second global recorder must be rejected");
}
