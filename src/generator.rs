//! Stub generation from the IDA plugin source.
//!
//! The plugin marks every function it serves over JSON-RPC with `@jsonrpc`.
//! Each marked function is rewritten into a stub with the same signature
//! whose body forwards the call to `make_jsonrpc_request`, and every
//! `TypedDict` record is collected so the stubs' annotations stay resolvable.
//!
//! Annotation rules per parameter:
//!
//! - missing annotation: error
//! - bare name (`str`, `Function`): kept as is
//! - `Annotated[T, "description"]`: rewritten to
//!   `Annotated[T, Field(description="description")]`
//! - anything else: error
//!
//! Generation is all-or-nothing; the first validation error aborts it.

use crate::python::syntax::{ClassDef, Declaration, Expr, FunctionDef, Keyword, Module, Param, ParamKind, Statement};
use crate::python::{parse_module, ParseError};
use crate::stub::{LoadError, StubSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Decorator marking plugin functions exposed over JSON-RPC.
pub const JSONRPC_MARKER: &str = "jsonrpc";
/// Base class of structured records referenced by the functions.
pub const RECORD_BASE: &str = "TypedDict";
/// Wrapper carrying a parameter description.
pub const ANNOTATED: &str = "Annotated";
/// Descriptor the MCP runtime reads parameter descriptions from.
pub const FIELD: &str = "Field";
/// Helper every stub delegates to.
pub const RPC_HELPER: &str = "make_jsonrpc_request";

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("IDA plugin not found at {} (did you move it?)", .0.display())]
    DefinitionNotFound(PathBuf),

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse definition file: {0}")]
    Parse(#[from] ParseError),

    #[error("Missing argument type for {function}.{param}")]
    MissingAnnotation { function: String, param: String },

    #[error("Malformed Annotated type for {function}.{param}: {reason}")]
    MalformedAnnotated {
        function: String,
        param: String,
        reason: String,
    },

    #[error("Unexpected type annotation for {function}.{param} -> {shape}")]
    UnexpectedAnnotation {
        function: String,
        param: String,
        shape: String,
    },

    #[error("Unsupported parameter `{param}` in {function}: only positional-or-keyword parameters can be forwarded")]
    UnsupportedParameter { function: String, param: String },
}

/// Name-keyed collection that keeps first-seen order.
///
/// Inserting an existing name replaces its value in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Collected<T> {
    entries: Vec<(String, T)>,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> Collected<T> {
    /// Returns the replaced value when `name` was already present.
    pub fn insert(&mut self, name: impl Into<String>, value: T) -> Option<T> {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.entries.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Visitor over the top-level declarations of a [`Module`].
pub trait Visitor {
    type Error;

    fn visit_module(&mut self, module: &Module) -> Result<(), Self::Error> {
        walk_module(self, module)
    }

    fn visit_function(&mut self, _func: &FunctionDef) -> Result<(), Self::Error> {
        Ok(())
    }

    fn visit_class(&mut self, _class: &ClassDef) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Visit declarations in file order.
pub fn walk_module<V: Visitor + ?Sized>(visitor: &mut V, module: &Module) -> Result<(), V::Error> {
    for declaration in &module.declarations {
        match declaration {
            Declaration::Function(func) => visitor.visit_function(func)?,
            Declaration::Class(class) => visitor.visit_class(class)?,
            Declaration::Other => {}
        }
    }
    Ok(())
}

/// Output of a successful generation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Generated {
    records: Collected<ClassDef>,
    functions: Collected<FunctionDef>,
}

impl Generated {
    /// Collected records, verbatim, in collection order.
    pub fn records(&self) -> impl Iterator<Item = &ClassDef> {
        self.records.values()
    }

    /// Rewritten stub definitions in collection order.
    pub fn functions(&self) -> impl Iterator<Item = &FunctionDef> {
        self.functions.values()
    }

    pub fn function_names(&self) -> Vec<&str> {
        self.functions.names().collect()
    }

    pub fn function(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Build live stubs directly, without rendering to text first.
    pub fn stubs(&self) -> Result<StubSet, LoadError> {
        StubSet::from_definitions(self.records(), self.functions())
    }
}

/// Visitor that validates and rewrites `@jsonrpc` functions.
#[derive(Debug, Default)]
pub struct StubGenerator {
    generated: Generated,
}

impl StubGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> Generated {
        self.generated
    }

    fn rewrite_param(&self, function: &str, param: &Param) -> Result<Param, GenerateError> {
        if param.kind == ParamKind::Unsupported {
            return Err(GenerateError::UnsupportedParameter {
                function: function.to_string(),
                param: param.name.clone(),
            });
        }
        let annotation =
            param
                .annotation
                .as_ref()
                .ok_or_else(|| GenerateError::MissingAnnotation {
                    function: function.to_string(),
                    param: param.name.clone(),
                })?;
        Ok(Param {
            annotation: Some(rewrite_annotation(function, &param.name, annotation)?),
            ..param.clone()
        })
    }
}

impl Visitor for StubGenerator {
    type Error = GenerateError;

    fn visit_function(&mut self, func: &FunctionDef) -> Result<(), GenerateError> {
        if !func.has_decorator(JSONRPC_MARKER) {
            return Ok(());
        }

        let params = func
            .params
            .iter()
            .map(|p| self.rewrite_param(&func.name, p))
            .collect::<Result<Vec<_>, _>>()?;

        let mut body = Vec::with_capacity(2);
        if let Some(doc) = func.docstring() {
            body.push(Statement::Expr(Expr::string(doc)));
        }
        let mut call_args = vec![Expr::string(func.name.as_str())];
        call_args.extend(params.iter().map(|p| Expr::name(p.name.as_str())));
        body.push(Statement::Return(Some(Expr::call(
            Expr::name(RPC_HELPER),
            call_args,
            Vec::new(),
        ))));

        let stub = FunctionDef {
            name: func.name.clone(),
            decorators: vec![tool_decorator()],
            params,
            returns: func.returns.clone(),
            body,
            line: func.line,
        };

        debug!(function = %func.name, line = func.line, "Generated stub");
        if self.generated.functions.insert(func.name.clone(), stub).is_some() {
            warn!(function = %func.name, line = func.line, "Function redefined; the later definition wins");
        }
        Ok(())
    }

    fn visit_class(&mut self, class: &ClassDef) -> Result<(), GenerateError> {
        if !class.has_base(RECORD_BASE) {
            return Ok(());
        }
        if self
            .generated
            .records
            .insert(class.name.clone(), class.clone())
            .is_some()
        {
            warn!(record = %class.name, line = class.line, "Record redefined; the later definition wins");
        }
        Ok(())
    }
}

/// `@mcp.tool()`
pub fn tool_decorator() -> Expr {
    Expr::call(Expr::attribute(Expr::name("mcp"), "tool"), Vec::new(), Vec::new())
}

/// `Annotated[ty, Field(description=...)]`
pub fn annotated_field(ty: Expr, description: &str) -> Expr {
    Expr::subscript(
        Expr::name(ANNOTATED),
        Expr::Tuple(vec![
            ty,
            Expr::call(
                Expr::name(FIELD),
                Vec::new(),
                vec![Keyword {
                    arg: "description".to_string(),
                    value: Expr::string(description),
                }],
            ),
        ]),
    )
}

fn rewrite_annotation(function: &str, param: &str, annotation: &Expr) -> Result<Expr, GenerateError> {
    let malformed = |reason: String| GenerateError::MalformedAnnotated {
        function: function.to_string(),
        param: param.to_string(),
        reason,
    };

    match annotation {
        Expr::Name(_) => Ok(annotation.clone()),
        Expr::Subscript { value, slice } => {
            if value.as_name() != Some(ANNOTATED) {
                return Err(malformed(format!(
                    "wrapper is `{value}`, expected `{ANNOTATED}`"
                )));
            }
            let Expr::Tuple(elements) = slice.as_ref() else {
                return Err(malformed(format!(
                    "expected {ANNOTATED}[type, description], found {ANNOTATED}[{}]",
                    slice.shape()
                )));
            };
            let [ty, description] = elements.as_slice() else {
                return Err(malformed(format!(
                    "expected 2 elements, found {}",
                    elements.len()
                )));
            };
            let Some(text) = description.as_str() else {
                return Err(malformed(format!(
                    "description must be a string constant, found {}",
                    description.shape()
                )));
            };
            Ok(annotated_field(ty.clone(), text))
        }
        other => Err(GenerateError::UnexpectedAnnotation {
            function: function.to_string(),
            param: param.to_string(),
            shape: other.shape(),
        }),
    }
}

/// Run the generator over a parsed module.
pub fn generate(module: &Module) -> Result<Generated, GenerateError> {
    let mut generator = StubGenerator::new();
    generator.visit_module(module)?;
    Ok(generator.finish())
}

/// Parse `source` and run the generator over it.
pub fn generate_from_source(source: &str) -> Result<Generated, GenerateError> {
    let module = parse_module(source)?;
    generate(&module)
}

/// Read the plugin source. A missing file is fatal.
pub fn load_definition_file(path: &Path) -> Result<String, GenerateError> {
    if !path.exists() {
        return Err(GenerateError::DefinitionNotFound(path.to_path_buf()));
    }
    std::fs::read_to_string(path).map_err(|source| GenerateError::Io {
        path: path.to_path_buf(),
        source,
    })
}
