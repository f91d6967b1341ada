//! JSON Schema derivation for stub parameters.
//!
//! Schemas are built from the Python type expressions carried by each stub,
//! the way the MCP runtime on the other side of a Python bridge would infer
//! them. Types it cannot map are left unconstrained (`{}`).

use crate::python::syntax::{Constant, Expr};
use crate::stub::{Record, Stub};
use serde_json::{json, Map, Value};

/// Deepest record nesting expanded before falling back to a bare object.
const MAX_RECORD_DEPTH: usize = 8;

/// Input schema (`{"type": "object", ...}`) for one stub.
pub fn input_schema(stub: &Stub, records: &[Record]) -> Map<String, Value> {
    let resolver = Resolver { records };
    let mut properties = Map::new();
    let mut required = Vec::new();

    for param in &stub.params {
        let mut schema = resolver.resolve(&param.ty, &mut Vec::new());
        if let Value::Object(ref mut map) = schema {
            if let Some(description) = &param.description {
                map.insert("description".to_string(), json!(description));
            }
            if let Some(Expr::Constant(default)) = &param.default {
                map.insert("default".to_string(), default.to_json());
            }
        }
        if param.is_required() {
            required.push(json!(param.name));
        }
        properties.insert(param.name.clone(), schema);
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema
}

struct Resolver<'a> {
    records: &'a [Record],
}

impl Resolver<'_> {
    /// `visiting` holds the records currently being expanded.
    fn resolve(&self, ty: &Expr, visiting: &mut Vec<String>) -> Value {
        match ty {
            Expr::Name(name) => self.resolve_name(name, visiting),
            Expr::Constant(Constant::None) => json!({"type": "null"}),
            Expr::Constant(Constant::Str(forward)) => self.resolve_name(forward, visiting),
            Expr::Subscript { value, slice } => {
                let args: Vec<&Expr> = match slice.as_ref() {
                    Expr::Tuple(elements) => elements.iter().collect(),
                    single => vec![single],
                };
                self.resolve_generic(value.as_name().unwrap_or_default(), &args, visiting)
            }
            Expr::BinOp { op, .. } if op == "|" => {
                let mut members = Vec::new();
                flatten_union(ty, &mut members);
                any_of(members.into_iter().map(|m| self.resolve(m, visiting)).collect())
            }
            _ => json!({}),
        }
    }

    fn resolve_name(&self, name: &str, visiting: &mut Vec<String>) -> Value {
        match name {
            "str" => json!({"type": "string"}),
            "int" => json!({"type": "integer"}),
            "float" => json!({"type": "number"}),
            "bool" => json!({"type": "boolean"}),
            "list" | "List" => json!({"type": "array"}),
            "dict" | "Dict" => json!({"type": "object"}),
            "None" => json!({"type": "null"}),
            _ => match self.records.iter().find(|r| r.name == name) {
                Some(record) => self.resolve_record(record, visiting),
                None => json!({}),
            },
        }
    }

    fn resolve_generic(&self, wrapper: &str, args: &[&Expr], visiting: &mut Vec<String>) -> Value {
        match (wrapper, args) {
            ("list" | "List" | "Sequence" | "set" | "Set", [item]) => {
                json!({"type": "array", "items": self.resolve(item, visiting)})
            }
            // Homogeneous `tuple[X, ...]` keeps `X` as the item type.
            ("tuple" | "Tuple", [item, ..]) => {
                json!({"type": "array", "items": self.resolve(item, visiting)})
            }
            ("dict" | "Dict", [_, value]) => {
                json!({"type": "object", "additionalProperties": self.resolve(value, visiting)})
            }
            ("Optional", [inner]) => any_of(vec![self.resolve(inner, visiting), json!({"type": "null"})]),
            ("Union", members) => any_of(members.iter().map(|m| self.resolve(m, visiting)).collect()),
            ("Literal", values) => {
                let values: Vec<Value> = values
                    .iter()
                    .filter_map(|v| match v {
                        Expr::Constant(c) => Some(c.to_json()),
                        _ => None,
                    })
                    .collect();
                json!({"enum": values})
            }
            ("Annotated", [inner, ..]) => self.resolve(inner, visiting),
            ("list" | "List" | "tuple" | "Tuple", _) => json!({"type": "array"}),
            ("dict" | "Dict", _) => json!({"type": "object"}),
            _ => json!({}),
        }
    }

    fn resolve_record(&self, record: &Record, visiting: &mut Vec<String>) -> Value {
        if visiting.len() >= MAX_RECORD_DEPTH || visiting.contains(&record.name) {
            return json!({"type": "object"});
        }
        visiting.push(record.name.clone());
        let mut properties = Map::new();
        for field in &record.fields {
            properties.insert(field.name.clone(), self.resolve(&field.annotation, visiting));
        }
        visiting.pop();

        let required: Vec<Value> = record.fields.iter().map(|f| json!(f.name)).collect();
        json!({
            "type": "object",
            "title": record.name,
            "properties": properties,
            "required": required,
        })
    }
}

fn flatten_union<'e>(ty: &'e Expr, out: &mut Vec<&'e Expr>) {
    match ty {
        Expr::BinOp { left, op, right } if op == "|" => {
            flatten_union(left, out);
            flatten_union(right, out);
        }
        other => out.push(other),
    }
}

fn any_of(members: Vec<Value>) -> Value {
    json!({"anyOf": members})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::load_stubs;

    const SOURCE: &str = r#"
class Xref(TypedDict):
    address: str
    kind: str
    function: Optional[Xref]

@mcp.tool()
def get_xrefs_to(address: Annotated[str, Field(description='Address to get cross references to')]) -> list[Xref]:
    return make_jsonrpc_request('get_xrefs_to', address)

@mcp.tool()
def list_strings(offset: int, count: int = 100, filter: str | None = None) -> list[str]:
    return make_jsonrpc_request('list_strings', offset, count, filter)

@mcp.tool()
def set_mode(mode: Literal['fast', 'slow'], xrefs: list[Xref], opaque: idaapi.ea_t) -> None:
    return make_jsonrpc_request('set_mode', mode, xrefs, opaque)
"#;

    fn schema_for(name: &str) -> Value {
        let set = load_stubs(SOURCE).unwrap();
        Value::Object(input_schema(set.get(name).unwrap(), &set.records))
    }

    #[test]
    fn descriptions_and_required() {
        let schema = schema_for("get_xrefs_to");
        assert_eq!(
            schema,
            json!({
                "type": "object",
                "properties": {
                    "address": {
                        "type": "string",
                        "description": "Address to get cross references to",
                    }
                },
                "required": ["address"],
            })
        );
    }

    #[test]
    fn defaulted_params_are_optional() {
        let schema = schema_for("list_strings");
        assert_eq!(schema["required"], json!(["offset"]));
        assert_eq!(schema["properties"]["count"], json!({"type": "integer", "default": 100}));
        assert_eq!(
            schema["properties"]["filter"],
            json!({"anyOf": [{"type": "string"}, {"type": "null"}], "default": null})
        );
    }

    #[test]
    fn literals_records_and_unknown_types() {
        let schema = schema_for("set_mode");
        assert_eq!(schema["properties"]["mode"], json!({"enum": ["fast", "slow"]}));
        assert_eq!(schema["properties"]["opaque"], json!({}));

        let xrefs = &schema["properties"]["xrefs"];
        assert_eq!(xrefs["type"], "array");
        assert_eq!(xrefs["items"]["title"], "Xref");
        assert_eq!(xrefs["items"]["properties"]["address"], json!({"type": "string"}));
        // Self reference stops at the record being expanded.
        assert_eq!(
            xrefs["items"]["properties"]["function"],
            json!({"anyOf": [{"type": "object"}, {"type": "null"}]})
        );
    }
}
