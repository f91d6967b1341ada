//! MCP server exposing the generated stubs as tools.

mod connection;

pub use connection::{check_connection, connection_hint, plugin_shortcut, PROBE_METHOD};

use crate::rpc::RpcClient;
use crate::tool_registry::{ToolAction, ToolCatalog};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

/// MCP server that forwards tool calls to the IDA plugin.
#[derive(Clone)]
pub struct BridgeServer {
    client: Arc<RpcClient>,
    catalog: Arc<ToolCatalog>,
    /// Held for the whole of a tool call; calls run one at a time.
    in_flight: Arc<Mutex<()>>,
}

impl BridgeServer {
    pub fn new(client: Arc<RpcClient>, catalog: Arc<ToolCatalog>) -> Self {
        info!(
            tools = catalog.len(),
            plugin = %client.config().endpoint_url(),
            "Creating IDA MCP bridge server"
        );
        Self {
            client,
            catalog,
            in_flight: Arc::new(Mutex::new(())),
        }
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    fn instructions(&self) -> String {
        format!(
            "Bridge to the IDA Pro MCP plugin running inside the IDA GUI. \
             \n\nEvery tool forwards one call to the plugin at {}. \
             \nCall check_connection first; if it fails, start the plugin in IDA with \
             Edit -> Plugins -> MCP ({}).",
            self.client.config().endpoint_url(),
            plugin_shortcut()
        )
    }

    /// Run one tool. Unknown names are protocol errors, everything else
    /// becomes a tool result.
    #[instrument(skip(self, arguments))]
    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<Map<String, Value>>,
    ) -> Result<CallToolResult, McpError> {
        let Some(entry) = self.catalog.get(name) else {
            return Err(McpError::invalid_params(format!("Unknown tool: {name}"), None));
        };
        let _guard = self.in_flight.lock().await;

        match &entry.action {
            ToolAction::CheckConnection => {
                let text = check_connection(&self.client).await;
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            ToolAction::Forward(stub) => match stub.invoke(&self.client, arguments.as_ref()).await {
                Ok(value) => {
                    debug!(tool = name, "Tool call succeeded");
                    Ok(CallToolResult::success(vec![Content::text(render_result(&value))]))
                }
                Err(e) => {
                    debug!(tool = name, error = %e, "Tool call failed");
                    Ok(e.to_tool_result())
                }
            },
        }
    }
}

/// Strings are passed through as-is; anything else is pretty JSON.
pub fn render_result(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    }
}

impl ServerHandler for BridgeServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: self.catalog.tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        self.dispatch(&params.name, params.arguments).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcConfig;
    use crate::stub::load_stubs;
    use serde_json::json;

    fn server() -> BridgeServer {
        let set = load_stubs(
            "@mcp.tool()\ndef get_metadata() -> Metadata:\n    return make_jsonrpc_request('get_metadata')\n",
        )
        .unwrap();
        let client = RpcClient::new(RpcConfig::new("127.0.0.1", 9)).unwrap();
        BridgeServer::new(Arc::new(client), Arc::new(ToolCatalog::new(&set)))
    }

    #[test]
    fn results_render_raw_strings_and_pretty_json() {
        assert_eq!(render_result(&json!("success")), "success");
        assert_eq!(render_result(&json!({"a": 1})), "{\n  \"a\": 1\n}");
        assert_eq!(render_result(&json!(3)), "3");
    }

    #[tokio::test]
    async fn unknown_tool_is_protocol_error() {
        let err = server().dispatch("nope", None).await.unwrap_err();
        assert!(err.message.contains("Unknown tool: nope"));
    }

    #[tokio::test]
    async fn invalid_arguments_are_tool_errors() {
        let mut args = Map::new();
        args.insert("extra".to_string(), json!(1));
        let result = server().dispatch("get_metadata", Some(args)).await.unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
