//! Tool catalog exposed in tools/list.
//!
//! `check_connection` always comes first, followed by one tool per generated
//! stub in collection order. The catalog is built once at startup and never
//! changes afterwards.

use crate::schema::input_schema;
use crate::stub::{Stub, StubSet};
use rmcp::model::Tool;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

/// Name of the fixed connectivity probe.
pub const CHECK_CONNECTION: &str = "check_connection";

const CHECK_CONNECTION_DESC: &str = "Check if the IDA plugin is running";

/// What calling a tool does.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolAction {
    /// Probe the plugin with `get_metadata`.
    CheckConnection,
    /// Forward to the plugin method of the same name.
    Forward(Stub),
}

/// A listed tool together with its action.
#[derive(Debug, Clone)]
pub struct ToolEntry {
    pub tool: Tool,
    pub action: ToolAction,
}

impl ToolEntry {
    pub fn name(&self) -> &str {
        &self.tool.name
    }
}

#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    entries: Vec<ToolEntry>,
}

impl ToolCatalog {
    pub fn new(set: &StubSet) -> Self {
        let mut entries = vec![ToolEntry {
            tool: Tool::new(CHECK_CONNECTION, CHECK_CONNECTION_DESC, Arc::new(empty_schema())),
            action: ToolAction::CheckConnection,
        }];

        for stub in &set.stubs {
            if stub.name == CHECK_CONNECTION {
                warn!(tool = CHECK_CONNECTION, "Generated stub shadowed by the built-in tool");
                continue;
            }
            let description = stub.description.clone().unwrap_or_default();
            entries.push(ToolEntry {
                tool: Tool::new(
                    stub.name.clone(),
                    description,
                    Arc::new(input_schema(stub, &set.records)),
                ),
                action: ToolAction::Forward(stub.clone()),
            });
        }

        info!(tools = entries.len(), "Tool catalog ready");
        Self { entries }
    }

    /// Tools in listing order.
    pub fn tools(&self) -> Vec<Tool> {
        self.entries.iter().map(|e| e.tool.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&ToolEntry> {
        self.entries.iter().find(|e| e.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(ToolEntry::name).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn empty_schema() -> Map<String, Value> {
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), json!({}));
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::load_stubs;

    const SOURCE: &str = r#"
@mcp.tool()
def get_metadata() -> Metadata:
    """Get metadata about the current IDB"""
    return make_jsonrpc_request('get_metadata')

@mcp.tool()
def check_connection() -> str:
    return make_jsonrpc_request('check_connection')

@mcp.tool()
def decompile_function(address: Annotated[str, Field(description='Address of the function to decompile')]) -> str:
    """Decompile a function at the given address"""
    return make_jsonrpc_request('decompile_function', address)
"#;

    #[test]
    fn check_connection_is_listed_first() {
        let catalog = ToolCatalog::new(&load_stubs(SOURCE).unwrap());
        assert_eq!(
            catalog.names(),
            vec!["check_connection", "get_metadata", "decompile_function"]
        );
        assert_eq!(
            catalog.get(CHECK_CONNECTION).unwrap().action,
            ToolAction::CheckConnection
        );
    }

    #[test]
    fn stub_tools_carry_description_and_schema() {
        let catalog = ToolCatalog::new(&load_stubs(SOURCE).unwrap());
        let entry = catalog.get("decompile_function").unwrap();
        assert_eq!(
            entry.tool.description.as_deref(),
            Some("Decompile a function at the given address")
        );
        assert_eq!(entry.tool.input_schema["required"], json!(["address"]));
        assert!(matches!(entry.action, ToolAction::Forward(ref s) if s.name == "decompile_function"));
    }

    #[test]
    fn empty_stub_set_still_has_probe() {
        let catalog = ToolCatalog::new(&StubSet::default());
        assert_eq!(catalog.len(), 1);
        assert!(catalog.get("get_metadata").is_none());
    }
}
