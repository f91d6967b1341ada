//! HTTP client for the IDA plugin's JSON-RPC endpoint.

use super::envelope::{Request, Response, RpcErrorObject};
use super::RpcError;
use crate::config::{DEFAULT_IDA_HOST, DEFAULT_IDA_PORT};
use reqwest::header::CONNECTION;
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Endpoint path the plugin serves JSON-RPC on.
pub const RPC_PATH: &str = "/mcp";
/// Returned in place of a `null` result.
pub const NULL_RESULT_SENTINEL: &str = "success";

/// Where the plugin listens and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RpcConfig {
    pub host: String,
    pub port: u16,
    /// Per-request timeout. `None` waits until the transport gives up.
    pub timeout: Option<Duration>,
}

impl RpcConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoint_url(&self) -> String {
        format!("http://{}:{}{}", self.host, self.port, RPC_PATH)
    }
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self::new(DEFAULT_IDA_HOST, DEFAULT_IDA_PORT)
    }
}

/// JSON-RPC client. Every call opens its own connection and the request id
/// counter lives with the client instance.
#[derive(Debug)]
pub struct RpcClient {
    config: RpcConfig,
    http: Client,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(config: RpcConfig) -> Result<Self, RpcError> {
        // No idle connections are kept, so each call connects from scratch.
        let http = Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| RpcError::Client(e.to_string()))?;
        Ok(Self {
            config,
            http,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn config(&self) -> &RpcConfig {
        &self.config
    }

    /// Number of requests issued so far, failed ones included.
    pub fn requests_issued(&self) -> u64 {
        self.next_id.load(Ordering::Relaxed) - 1
    }

    /// Invoke `method` with positional `params` and return the unwrapped result.
    pub async fn call(&self, method: &str, params: Vec<Value>) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = Request::new(method, params, id);
        debug!(method, id, "Sending JSON-RPC request");

        let mut builder = self
            .http
            .post(self.config.endpoint_url())
            .header(CONNECTION, "close")
            .json(&request);
        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| {
            warn!(method, id, error = %e, "JSON-RPC transport failure");
            RpcError::Transport(e)
        })?;
        let body = response.bytes().await?;
        let decoded: Response =
            serde_json::from_slice(&body).map_err(|e| RpcError::Decode(e.to_string()))?;
        unwrap_response(decoded)
    }
}

/// Turn a decoded response into the call result.
pub fn unwrap_response(response: Response) -> Result<Value, RpcError> {
    if let Some(RpcErrorObject {
        code,
        message,
        data,
    }) = response.error
    {
        return Err(RpcError::Remote {
            code,
            message,
            data,
        });
    }
    match response.result {
        Some(Value::Null) => Ok(Value::String(NULL_RESULT_SENTINEL.to_string())),
        Some(result) => Ok(result),
        None => Err(RpcError::Decode(
            "response has neither result nor error".to_string(),
        )),
    }
}
