//! Scenario assertions.
//!
//! A failed assertion stops every registered node before it returns
//! [`HarnessError::AssertionFailed`], so a failing case never leaves
//! daemons behind even when the caller drops the error.

use std::fmt::Debug;

use peerlab_core::metrics as m;
use regex::Regex;
use serde_json::Value;
use tracing::{error, warn};

use crate::error::HarnessError;
use crate::harness::Harness;

impl Harness {
    pub async fn assert_true(&mut self, condition: bool) -> Result<(), HarnessError> {
        if condition {
            return Ok(());
        }
        self.fail(format!("Actual: {condition}\nExpected: true")).await
    }

    pub async fn assert_false(&mut self, condition: bool) -> Result<(), HarnessError> {
        if !condition {
            return Ok(());
        }
        self.fail(format!("Actual: {condition}\nExpected: false")).await
    }

    pub async fn assert_is_none<T: Debug>(&mut self, value: &Option<T>) -> Result<(), HarnessError> {
        match value {
            None => Ok(()),
            Some(v) => self.fail(format!("Actual: {v:?}\nExpected: None")).await,
        }
    }

    pub async fn assert_is_some<T: Debug>(&mut self, value: &Option<T>) -> Result<(), HarnessError> {
        match value {
            Some(_) => Ok(()),
            None => self.fail("Actual: None\nExpected: not None".to_owned()).await,
        }
    }

    pub async fn assert_equal<A, E>(&mut self, actual: &A, expected: &E) -> Result<(), HarnessError>
    where
        A: PartialEq<E> + Debug + ?Sized,
        E: Debug + ?Sized,
    {
        if actual == expected {
            return Ok(());
        }
        self.fail(format!("Actual: {actual:?}\nExpected: {expected:?}"))
            .await
    }

    pub async fn assert_not_equal<A, E>(
        &mut self,
        actual: &A,
        unexpected: &E,
    ) -> Result<(), HarnessError>
    where
        A: PartialEq<E> + Debug + ?Sized,
        E: Debug + ?Sized,
    {
        if actual != unexpected {
            return Ok(());
        }
        self.fail(format!("Actual: {actual:?}\nExpected: !{unexpected:?}"))
            .await
    }

    pub async fn assert_in<T>(&mut self, element: &T, items: &[T]) -> Result<(), HarnessError>
    where
        T: PartialEq + Debug,
    {
        if items.contains(element) {
            return Ok(());
        }
        self.fail(format!(
            "Actual: {element:?} not in {items:?}\nExpected: {element:?} in {items:?}"
        ))
        .await
    }

    /// `actual` must match `pattern` as a whole, not just contain a match.
    pub async fn assert_match(&mut self, actual: &str, pattern: &str) -> Result<(), HarnessError> {
        let re = full_match(pattern)?;
        if re.is_match(actual) {
            return Ok(());
        }
        self.fail(format!(
            "Actual: {actual} !~ {pattern}\nExpected: {actual} ~ {pattern}"
        ))
        .await
    }

    /// Some value of some object in `objects` fully matches `pattern`.
    ///
    /// String values are matched without their JSON quotes. Entries that are
    /// not objects contribute themselves.
    pub async fn assert_has_any(&mut self, objects: &[Value], pattern: &str) -> Result<(), HarnessError> {
        let re = full_match(pattern)?;
        let values: Vec<String> = objects
            .iter()
            .flat_map(|obj| match obj {
                Value::Object(map) => map.values().map(plain).collect::<Vec<_>>(),
                other => vec![plain(other)],
            })
            .collect();

        if values.iter().any(|v| re.is_match(v)) {
            return Ok(());
        }
        self.fail(format!(
            "Actual: any({values:?}) !~ {pattern}\nExpected: any({values:?}) ~ {pattern}"
        ))
        .await
    }

    /// Expects `result` to be an error accepted by `is_expected`.
    ///
    /// - `Ok`: nodes are stopped and "`expected` was not raised" is returned.
    /// - an error `is_expected` rejects: propagated unchanged.
    /// - an error `is_expected` accepts: handed back for inspection.
    pub async fn assert_raises<T, E, F>(
        &mut self,
        expected: &str,
        is_expected: F,
        result: Result<T, E>,
    ) -> Result<HarnessError, HarnessError>
    where
        T: Debug,
        E: Into<HarnessError>,
        F: FnOnce(&HarnessError) -> bool,
    {
        match result {
            Ok(value) => {
                self.fail(format!("{expected} was not raised, got Ok({value:?})"))
                    .await
            }
            Err(e) => {
                let err = e.into();
                if is_expected(&err) {
                    Ok(err)
                } else {
                    warn!(expected, error = %err, "unexpected error kind");
                    Err(err)
                }
            }
        }
    }

    async fn fail<T>(&mut self, message: String) -> Result<T, HarnessError> {
        metrics::counter!(m::ASSERTION_FAILURES_TOTAL).increment(1);
        error!(case = %self.case(), run_id = %self.run_id(), "{message}");

        if let Err(e) = self.stop().await {
            warn!(case = %self.case(), error = %e, "stopping nodes after failed assertion");
        }
        Err(HarnessError::AssertionFailed(message))
    }
}

fn full_match(pattern: &str) -> Result<Regex, HarnessError> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|e| HarnessError::Scenario(format!("invalid pattern '{pattern}': {e}")))
}

fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use peerlab_core::config::HarnessConfig;
    use peerlab_core::types::NodeVariant;
    use peerlab_node::RpcError;
    use peerlab_node::mock::MockNetwork;
    use serde_json::json;

    use super::*;

    async fn running(temp: &tempfile::TempDir, network: &MockNetwork) -> Harness {
        let mut config = HarnessConfig::default();
        config.paths.temp_dir = temp.path().display().to_string();
        let mut h = Harness::with_backend("Assertions", config, network.backend()).unwrap();
        h.add_node_default_args(NodeVariant::Florestad).await.unwrap();
        h.run_node(0).await.unwrap();
        h
    }

    #[tokio::test]
    async fn passing_assertions_leave_nodes_running() {
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let mut h = running(&temp, &network).await;

        h.assert_true(true).await.unwrap();
        h.assert_false(false).await.unwrap();
        h.assert_is_none::<u32>(&None).await.unwrap();
        h.assert_is_some(&Some(1)).await.unwrap();
        h.assert_equal(&json!(1), &json!(1)).await.unwrap();
        h.assert_not_equal("a", "b").await.unwrap();
        h.assert_in(&2, &[1, 2, 3]).await.unwrap();
        h.assert_match("0.1.0-alpha", r"\d+\.\d+\.\d+.*").await.unwrap();

        assert!(network.is_running(0));
    }

    #[tokio::test]
    async fn failed_assertion_stops_nodes_before_returning() {
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let mut h = running(&temp, &network).await;

        let err = h.assert_equal(&3u64, &4u64).await.unwrap_err();

        assert!(!network.is_running(0));
        match err {
            HarnessError::AssertionFailed(msg) => assert_eq!(msg, "Actual: 3\nExpected: 4"),
            other => panic!("expected AssertionFailed, got {other}"),
        }
    }

    #[tokio::test]
    async fn match_requires_whole_string() {
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let mut h = running(&temp, &network).await;

        let err = h.assert_match("abc123", r"\d+").await.unwrap_err();

        assert!(err.to_string().contains("abc123 !~ \\d+"), "{err}");
    }

    #[tokio::test]
    async fn has_any_looks_inside_every_object() {
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let mut h = running(&temp, &network).await;
        let peers = vec![
            json!({"id": 0, "subver": "/Satoshi:27.0.0/"}),
            json!({"id": 1, "subver": "/Floresta:0.7.0/"}),
        ];

        h.assert_has_any(&peers, r"/Floresta:.*/").await.unwrap();
        h.assert_has_any(&peers, "1").await.unwrap();
        assert!(h.assert_has_any(&peers, "Floresta").await.is_err());
    }

    #[tokio::test]
    async fn raises_returns_expected_error_for_inspection() {
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let mut h = running(&temp, &network).await;
        let result: Result<Value, RpcError> = Err(RpcError::Http {
            method: "disconnectnode".to_owned(),
            status: 400,
            body: "Peer not found".to_owned(),
        });

        let err = h
            .assert_raises(
                "HTTP error",
                |e| matches!(e, HarnessError::Rpc(RpcError::Http { .. })),
                result,
            )
            .await
            .unwrap();

        assert!(matches!(err, HarnessError::Rpc(RpcError::Http { status: 400, .. })));
        assert!(network.is_running(0));
    }

    #[tokio::test]
    async fn raises_fails_and_stops_when_nothing_was_raised() {
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let mut h = running(&temp, &network).await;

        let err = h
            .assert_raises("HTTP error", |_| true, Ok::<_, RpcError>(Value::Null))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("HTTP error was not raised"), "{err}");
        assert!(!network.is_running(0));
    }

    #[tokio::test]
    async fn raises_propagates_other_error_kinds() {
        let temp = tempfile::tempdir().unwrap();
        let network = MockNetwork::new();
        let mut h = running(&temp, &network).await;
        let result: Result<(), RpcError> = Err(RpcError::Transport {
            method: "disconnectnode".to_owned(),
            reason: "connection refused".to_owned(),
        });

        let err = h
            .assert_raises(
                "HTTP error",
                |e| matches!(e, HarnessError::Rpc(RpcError::Http { .. })),
                result,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, HarnessError::Rpc(RpcError::Transport { .. })));
    }
}
