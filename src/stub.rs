//! Live stubs: callable forms of the generated functions.
//!
//! Stubs are built from rewritten [`FunctionDef`]s, either straight from the
//! generator's output or by loading the rendered `server_generated.py` back in.
//! Both paths run the same structural checks, so a hand-edited or stale
//! generated file is rejected instead of silently forwarding the wrong call.

use crate::error::ToolError;
use crate::generator::{tool_decorator, Collected, ANNOTATED, FIELD, RECORD_BASE, RPC_HELPER};
use crate::python::syntax::{ClassDef, Declaration, Expr, Field, FunctionDef, ParamKind, Statement};
use crate::python::{parse_module, ParseError};
use crate::rpc::RpcClient;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to parse generated module: {0}")]
    Parse(#[from] ParseError),

    #[error("{function} is not a forwarding stub: {reason}")]
    NotAStub { function: String, reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StubParam {
    pub name: String,
    /// Declared type with any `Annotated` wrapper removed.
    pub ty: Expr,
    pub description: Option<String>,
    pub default: Option<Expr>,
}

impl StubParam {
    pub fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// A callable that forwards one JSON-RPC call to the plugin.
#[derive(Debug, Clone, PartialEq)]
pub struct Stub {
    pub name: String,
    pub description: Option<String>,
    pub params: Vec<StubParam>,
    pub returns: Option<Expr>,
}

/// A `TypedDict` record, kept for schema resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub name: String,
    pub fields: Vec<Field>,
}

impl From<&ClassDef> for Record {
    fn from(class: &ClassDef) -> Self {
        Self {
            name: class.name.clone(),
            fields: class.fields.clone(),
        }
    }
}

/// Every stub and record of one generated module, in collection order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StubSet {
    pub records: Vec<Record>,
    pub stubs: Vec<Stub>,
}

impl StubSet {
    pub fn from_definitions<'a>(
        records: impl IntoIterator<Item = &'a ClassDef>,
        functions: impl IntoIterator<Item = &'a FunctionDef>,
    ) -> Result<Self, LoadError> {
        Ok(Self {
            records: records.into_iter().map(Record::from).collect(),
            stubs: functions
                .into_iter()
                .map(Stub::from_definition)
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn names(&self) -> Vec<&str> {
        self.stubs.iter().map(|s| s.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&Stub> {
        self.stubs.iter().find(|s| s.name == name)
    }

    pub fn record(&self, name: &str) -> Option<&Record> {
        self.records.iter().find(|r| r.name == name)
    }
}

/// Load the stubs declared by rendered generated source.
///
/// Functions decorated with `@mcp.tool()` become stubs; classes deriving from
/// `TypedDict` become records. Later definitions replace earlier ones of the
/// same name, as they would when the module is executed.
pub fn load_stubs(source: &str) -> Result<StubSet, LoadError> {
    let module = parse_module(source)?;
    let marker = tool_decorator();

    let mut records = Collected::default();
    let mut functions = Collected::default();
    for declaration in &module.declarations {
        match declaration {
            Declaration::Class(class) if class.has_base(RECORD_BASE) => {
                records.insert(class.name.clone(), class);
            }
            Declaration::Function(func) if func.decorators.contains(&marker) => {
                functions.insert(func.name.clone(), func);
            }
            _ => {}
        }
    }

    let set = StubSet::from_definitions(records.values().copied(), functions.values().copied())?;
    debug!(stubs = set.stubs.len(), records = set.records.len(), "Loaded generated stubs");
    Ok(set)
}

impl Stub {
    /// Check that `func` has the exact stub shape and extract its signature.
    pub fn from_definition(func: &FunctionDef) -> Result<Self, LoadError> {
        let not_a_stub = |reason: String| LoadError::NotAStub {
            function: func.name.clone(),
            reason,
        };

        let mut params = Vec::with_capacity(func.params.len());
        for param in &func.params {
            if param.kind != ParamKind::Positional {
                return Err(not_a_stub(format!("unsupported parameter `{}`", param.name)));
            }
            let annotation = param
                .annotation
                .as_ref()
                .ok_or_else(|| not_a_stub(format!("parameter `{}` has no type", param.name)))?;
            let (ty, description) = split_annotation(annotation);
            params.push(StubParam {
                name: param.name.clone(),
                ty,
                description,
                default: param.default.clone(),
            });
        }

        let description = func.docstring().map(str::to_string);
        let rest = if description.is_some() {
            &func.body[1..]
        } else {
            &func.body[..]
        };
        let [Statement::Return(Some(Expr::Call {
            func: callee,
            args,
            keywords,
        }))] = rest
        else {
            return Err(not_a_stub(format!(
                "body must be a single `return {RPC_HELPER}(...)`"
            )));
        };
        if callee.as_name() != Some(RPC_HELPER) || !keywords.is_empty() {
            return Err(not_a_stub(format!("body does not call {RPC_HELPER}")));
        }
        let Some((method, forwarded)) = args.split_first() else {
            return Err(not_a_stub("call has no method name".to_string()));
        };
        if method.as_str() != Some(func.name.as_str()) {
            return Err(not_a_stub(format!("forwards to method {method}")));
        }
        let forwarded: Vec<Option<&str>> = forwarded.iter().map(Expr::as_name).collect();
        let declared: Vec<Option<&str>> = params.iter().map(|p| Some(p.name.as_str())).collect();
        if forwarded != declared {
            return Err(not_a_stub(
                "forwarded arguments do not match the parameter list".to_string(),
            ));
        }

        Ok(Self {
            name: func.name.clone(),
            description,
            params,
            returns: func.returns.clone(),
        })
    }

    /// Map named tool arguments onto the positional parameter list.
    pub fn bind_arguments(&self, arguments: Option<&Map<String, Value>>) -> Result<Vec<Value>, ToolError> {
        let empty = Map::new();
        let arguments = arguments.unwrap_or(&empty);

        if let Some(unknown) = arguments
            .keys()
            .find(|key| !self.params.iter().any(|p| &p.name == *key))
        {
            return Err(ToolError::InvalidParams(format!(
                "{} got an unexpected argument: {unknown}",
                self.name
            )));
        }

        self.params
            .iter()
            .map(|param| match (arguments.get(&param.name), &param.default) {
                (Some(value), _) => Ok(value.clone()),
                (None, Some(Expr::Constant(constant))) => Ok(constant.to_json()),
                (None, Some(_)) => Err(ToolError::InvalidParams(format!(
                    "{}: parameter {} has a non-literal default and must be provided",
                    self.name, param.name
                ))),
                (None, None) => Err(ToolError::InvalidParams(format!(
                    "{}: missing required parameter {}",
                    self.name, param.name
                ))),
            })
            .collect()
    }

    /// Forward one call to the plugin.
    pub async fn invoke(
        &self,
        client: &RpcClient,
        arguments: Option<&Map<String, Value>>,
    ) -> Result<Value, ToolError> {
        let params = self.bind_arguments(arguments)?;
        Ok(client.call(&self.name, params).await?)
    }
}

/// `Annotated[T, Field(description=...)]` → (T, description).
fn split_annotation(annotation: &Expr) -> (Expr, Option<String>) {
    if let Expr::Subscript { value, slice } = annotation {
        if value.as_name() == Some(ANNOTATED) {
            if let Expr::Tuple(elements) = slice.as_ref() {
                if let [ty, Expr::Call { func, keywords, .. }] = elements.as_slice() {
                    if func.as_name() == Some(FIELD) {
                        let description = keywords
                            .iter()
                            .find(|k| k.arg == "description")
                            .and_then(|k| k.value.as_str())
                            .map(str::to_string);
                        return (ty.clone(), description);
                    }
                }
            }
        }
    }
    (annotation.clone(), None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::syntax::Constant;
    use serde_json::json;

    const GENERATED: &str = r#"# NOTE: This file has been automatically generated, do not modify!
from typing import Annotated, Optional, TypedDict, Generic, TypeVar
from pydantic import Field

T = TypeVar("T")

class Function(TypedDict):
    address: str
    name: str
    size: str

@mcp.tool()
def get_function_by_address(address: Annotated[str, Field(description='Address of the function to get')]) -> Function:
    """Get a function by its address"""
    return make_jsonrpc_request('get_function_by_address', address)

@mcp.tool()
def list_functions(offset: Annotated[int, Field(description='Offset to start listing from')], count: int = 100) -> list[Function]:
    return make_jsonrpc_request('list_functions', offset, count)

def not_a_tool():
    return 1
"#;

    fn args(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn loads_stubs_and_records() {
        let set = load_stubs(GENERATED).unwrap();
        assert_eq!(set.names(), vec!["get_function_by_address", "list_functions"]);
        let record = set.record("Function").unwrap();
        assert_eq!(record.fields.len(), 3);

        let stub = set.get("get_function_by_address").unwrap();
        assert_eq!(stub.description.as_deref(), Some("Get a function by its address"));
        assert_eq!(stub.params[0].ty, Expr::name("str"));
        assert_eq!(
            stub.params[0].description.as_deref(),
            Some("Address of the function to get")
        );

        let list = set.get("list_functions").unwrap();
        assert_eq!(list.description, None);
        assert!(list.params[0].is_required());
        assert!(!list.params[1].is_required());
        assert_eq!(list.params[1].default, Some(Expr::Constant(Constant::Int(100))));
    }

    #[test]
    fn rejects_stub_forwarding_wrong_method() {
        let source = "@mcp.tool()\ndef a(x: int):\n    return make_jsonrpc_request('b', x)\n";
        let err = load_stubs(source).unwrap_err();
        assert!(matches!(err, LoadError::NotAStub { ref function, .. } if function == "a"));
    }

    #[test]
    fn rejects_stub_with_reordered_arguments() {
        let source =
            "@mcp.tool()\ndef a(x: int, y: int):\n    return make_jsonrpc_request('a', y, x)\n";
        assert!(load_stubs(source).is_err());
    }

    #[test]
    fn rejects_stub_with_extra_statements() {
        let source = "@mcp.tool()\ndef a():\n    print('hi')\n    return make_jsonrpc_request('a')\n";
        assert!(load_stubs(source).is_err());
    }

    #[test]
    fn binds_arguments_in_declaration_order() {
        let set = load_stubs(GENERATED).unwrap();
        let list = set.get("list_functions").unwrap();
        let bound = list
            .bind_arguments(Some(&args(json!({"count": 5, "offset": 10}))))
            .unwrap();
        assert_eq!(bound, vec![json!(10), json!(5)]);
    }

    #[test]
    fn literal_defaults_fill_omitted_arguments() {
        let set = load_stubs(GENERATED).unwrap();
        let list = set.get("list_functions").unwrap();
        let bound = list.bind_arguments(Some(&args(json!({"offset": 0})))).unwrap();
        assert_eq!(bound, vec![json!(0), json!(100)]);
    }

    #[test]
    fn missing_and_unknown_arguments_are_rejected() {
        let set = load_stubs(GENERATED).unwrap();
        let list = set.get("list_functions").unwrap();
        let err = list.bind_arguments(None).unwrap_err();
        assert!(err.to_string().contains("missing required parameter offset"));

        let err = list
            .bind_arguments(Some(&args(json!({"offset": 0, "limit": 3}))))
            .unwrap_err();
        assert!(err.to_string().contains("unexpected argument: limit"));
    }
}
