//! HTTP JSON-RPC transport shared by all variant clients.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use peerlab_core::endpoint::RpcConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::RpcError;

#[derive(Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: &'a [Value],
}

#[derive(Deserialize)]
struct Response {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<ErrorObject>,
}

#[derive(Deserialize)]
struct ErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

/// POSTs JSON-RPC requests to one node, with basic auth when configured.
pub struct JsonRpcTransport {
    client: reqwest::Client,
    config: RpcConfig,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    /// Every request is bounded by `request_timeout`.
    pub fn new(config: RpcConfig, request_timeout: Duration) -> Result<Self, RpcError> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| RpcError::Transport {
                method: "<client>".to_owned(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            client,
            config,
            next_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RpcConfig) {
        self.config = config;
    }

    /// Sends `method` and returns its `result`, `Null` when absent.
    pub async fn call(&self, method: &str, params: &[Value]) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        debug!(url = %self.config.url(), method, id, "rpc request");

        let mut builder = self.client.post(self.config.url()).json(&request);
        if let Some((user, password)) = self.config.credentials() {
            builder = builder.basic_auth(user, Some(password));
        }

        let response = builder.send().await.map_err(|e| RpcError::Transport {
            method: method.to_owned(),
            reason: e.to_string(),
        })?;
        let status = response.status();
        let body = response.text().await.map_err(|e| RpcError::Transport {
            method: method.to_owned(),
            reason: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(RpcError::Http {
                method: method.to_owned(),
                status: status.as_u16(),
                body,
            });
        }

        parse_response(method, &body)
    }
}

fn parse_response(method: &str, body: &str) -> Result<Value, RpcError> {
    let response: Response = serde_json::from_str(body).map_err(|e| RpcError::Decode {
        method: method.to_owned(),
        reason: e.to_string(),
    })?;
    if let Some(error) = response.error {
        return Err(RpcError::Rpc {
            method: method.to_owned(),
            code: error.code,
            message: error.message,
        });
    }
    Ok(response.result)
}
