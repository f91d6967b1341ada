//! Error types for tool calls.
//!
//! Tool execution errors are returned with `is_error: true` in CallToolResult,
//! while protocol errors (unknown tool name) are reported to rmcp as `McpError`.

use crate::rpc::RpcError;
use rmcp::model::{CallToolResult, Content};
use thiserror::Error;

/// Tool execution errors - returned with is_error: true in CallToolResult
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// Failure reported by, or on the way to, the IDA plugin. Rendered verbatim.
    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl ToolError {
    /// Convert to MCP CallToolResult with is_error: true
    pub fn to_tool_result(&self) -> CallToolResult {
        CallToolResult::error(vec![Content::text(self.to_string())])
    }
}
