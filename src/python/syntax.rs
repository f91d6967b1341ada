//! Tagged-variant syntax tree for plugin definition files.
//!
//! Only the parts of Python the generator cares about are modelled
//! structurally. Everything else is kept as verbatim source text so it can be
//! rendered back unchanged.

/// A parsed source file: its top-level declarations in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub declarations: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Declaration {
    Function(FunctionDef),
    Class(ClassDef),
    /// Imports, assignments, expressions and anything else at module level.
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub decorators: Vec<Expr>,
    pub params: Vec<Param>,
    pub returns: Option<Expr>,
    pub body: Vec<Statement>,
    /// 1-based line of the `def` keyword.
    pub line: usize,
}

impl FunctionDef {
    /// The leading bare string of the body, if any.
    pub fn docstring(&self) -> Option<&str> {
        match self.body.first() {
            Some(Statement::Expr(Expr::Constant(Constant::Str(s)))) => Some(s),
            _ => None,
        }
    }

    pub fn has_decorator(&self, name: &str) -> bool {
        self.decorators
            .iter()
            .any(|d| matches!(d, Expr::Name(id) if id == name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub annotation: Option<Expr>,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// An ordinary positional-or-keyword parameter.
    Positional,
    /// `*args`, `**kwargs` or a bare `*` / `/` separator.
    Unsupported,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassDef {
    pub name: String,
    pub bases: Vec<Expr>,
    /// Annotated class-level fields (`name: type`) in declaration order.
    pub fields: Vec<Field>,
    /// Verbatim source of the whole definition, decorators included.
    pub source: String,
    pub line: usize,
}

impl ClassDef {
    pub fn has_base(&self, name: &str) -> bool {
        self.bases
            .iter()
            .any(|b| matches!(b, Expr::Name(id) if id == name))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub annotation: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A bare expression statement.
    Expr(Expr),
    Return(Option<Expr>),
    /// Any other statement, kept as source text.
    Other(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Name(String),
    Constant(Constant),
    Attribute {
        value: Box<Expr>,
        attr: String,
    },
    Subscript {
        value: Box<Expr>,
        slice: Box<Expr>,
    },
    Tuple(Vec<Expr>),
    List(Vec<Expr>),
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        keywords: Vec<Keyword>,
    },
    BinOp {
        left: Box<Expr>,
        op: String,
        right: Box<Expr>,
    },
    /// Anything else: the tree-sitter node kind and its verbatim text.
    Other {
        kind: String,
        text: String,
    },
}

impl Expr {
    pub fn name(id: impl Into<String>) -> Self {
        Expr::Name(id.into())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expr::Constant(Constant::Str(value.into()))
    }

    pub fn call(func: Expr, args: Vec<Expr>, keywords: Vec<Keyword>) -> Self {
        Expr::Call {
            func: Box::new(func),
            args,
            keywords,
        }
    }

    pub fn attribute(value: Expr, attr: impl Into<String>) -> Self {
        Expr::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
    }

    pub fn subscript(value: Expr, slice: Expr) -> Self {
        Expr::Subscript {
            value: Box::new(value),
            slice: Box::new(slice),
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Expr::Name(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Expr::Constant(Constant::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// Short label for the shape of this expression, used in diagnostics.
    pub fn shape(&self) -> String {
        match self {
            Expr::Name(_) => "Name".to_string(),
            Expr::Constant(c) => format!("Constant({})", c.type_name()),
            Expr::Attribute { .. } => "Attribute".to_string(),
            Expr::Subscript { .. } => "Subscript".to_string(),
            Expr::Tuple(_) => "Tuple".to_string(),
            Expr::List(_) => "List".to_string(),
            Expr::Call { .. } => "Call".to_string(),
            Expr::BinOp { op, .. } => format!("BinOp({op})"),
            Expr::Other { kind, .. } => kind.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyword {
    pub arg: String,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
}

impl Constant {
    pub fn type_name(&self) -> &'static str {
        match self {
            Constant::Str(_) => "str",
            Constant::Int(_) => "int",
            Constant::Float(_) => "float",
            Constant::Bool(_) => "bool",
            Constant::None => "None",
        }
    }

    /// JSON value the plugin receives when this constant is passed as an argument.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Constant::Str(s) => serde_json::Value::String(s.clone()),
            Constant::Int(i) => serde_json::Value::from(*i),
            Constant::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Constant::Bool(b) => serde_json::Value::Bool(*b),
            Constant::None => serde_json::Value::Null,
        }
    }
}
