//! The `check_connection` probe.

use crate::rpc::RpcClient;
use tracing::warn;

/// Plugin method used to probe the connection.
pub const PROBE_METHOD: &str = "get_metadata";

/// Keyboard shortcut that starts the plugin inside IDA.
pub fn plugin_shortcut() -> &'static str {
    if cfg!(target_os = "macos") {
        "Ctrl+Option+M"
    } else {
        "Ctrl+Alt+M"
    }
}

pub fn connection_hint() -> String {
    format!(
        "Failed to connect to IDA Pro! Did you run Edit -> Plugins -> MCP ({}) to start the server?",
        plugin_shortcut()
    )
}

/// Probe the plugin. Never fails: any problem turns into the hint text.
pub async fn check_connection(client: &RpcClient) -> String {
    match client.call(PROBE_METHOD, Vec::new()).await {
        Ok(metadata) => match metadata.get("module").and_then(|m| m.as_str()) {
            Some(module) => format!("Successfully connected to IDA Pro (open file: {module})"),
            None => {
                warn!(%metadata, "Metadata response has no module name");
                connection_hint()
            }
        },
        Err(e) => {
            warn!(error = %e, "Connection check failed");
            connection_hint()
        }
    }
}
