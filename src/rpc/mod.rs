//! Remote call client for the IDA plugin.

mod client;
pub mod envelope;

pub use client::{unwrap_response, RpcClient, RpcConfig, NULL_RESULT_SENTINEL, RPC_PATH};

use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RpcError {
    /// Well-formed error envelope returned by the plugin.
    #[error("JSON-RPC error {code}: {message}{}", data_suffix(.data))]
    Remote {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("HTTP request to IDA plugin failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid JSON-RPC response: {0}")]
    Decode(String),

    #[error("Failed to create HTTP client: {0}")]
    Client(String),
}

fn data_suffix(data: &Option<Value>) -> String {
    match data {
        Some(Value::String(s)) => format!("\n{s}"),
        Some(other) => format!("\n{other}"),
        None => String::new(),
    }
}
