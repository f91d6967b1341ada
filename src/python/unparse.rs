//! Render syntax tree nodes back into Python source.

use super::syntax::{Constant, Expr, FunctionDef, Param, Statement};
use std::fmt::{self, Write as _};

const INDENT: &str = "    ";

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Name(id) => f.write_str(id),
            Expr::Constant(c) => write!(f, "{c}"),
            Expr::Attribute { value, attr } => write!(f, "{value}.{attr}"),
            Expr::Subscript { value, slice } => match slice.as_ref() {
                Expr::Tuple(elements) if !elements.is_empty() => {
                    write!(f, "{value}[{}]", join(elements))
                }
                other => write!(f, "{value}[{other}]"),
            },
            Expr::Tuple(elements) => match elements.as_slice() {
                [single] => write!(f, "({single},)"),
                _ => write!(f, "({})", join(elements)),
            },
            Expr::List(elements) => write!(f, "[{}]", join(elements)),
            Expr::Call {
                func,
                args,
                keywords,
            } => {
                let mut parts: Vec<String> = args.iter().map(ToString::to_string).collect();
                parts.extend(keywords.iter().map(|k| format!("{}={}", k.arg, k.value)));
                write!(f, "{func}({})", parts.join(", "))
            }
            Expr::BinOp { left, op, right } => write!(f, "{left} {op} {right}"),
            Expr::Other { text, .. } => f.write_str(text),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Str(s) => f.write_str(&repr(s)),
            Constant::Int(i) => write!(f, "{i}"),
            Constant::Float(v) if v.is_finite() && v.fract() == 0.0 && v.abs() < 1e16 => {
                write!(f, "{v:.1}")
            }
            Constant::Float(v) => write!(f, "{v}"),
            Constant::Bool(true) => f.write_str("True"),
            Constant::Bool(false) => f.write_str("False"),
            Constant::None => f.write_str("None"),
        }
    }
}

fn join(elements: &[Expr]) -> String {
    elements
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Python `repr()` of a string.
pub fn repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// Docstrings are rendered triple-quoted when that is lossless.
fn docstring_literal(s: &str) -> String {
    let plain = !s.contains("\"\"\"")
        && !s.contains('\\')
        && !s.contains('\r')
        && !s.ends_with('"')
        && !s.chars().any(|c| (c as u32) < 0x20 && c != '\n' && c != '\t');
    if plain {
        format!("\"\"\"{s}\"\"\"")
    } else {
        repr(s)
    }
}

fn render_param(param: &Param) -> String {
    match (&param.annotation, &param.default) {
        (None, None) => param.name.clone(),
        (Some(ann), None) => format!("{}: {ann}", param.name),
        (None, Some(default)) => format!("{}={default}", param.name),
        (Some(ann), Some(default)) => format!("{}: {ann} = {default}", param.name),
    }
}

fn render_statement(stmt: &Statement, docstring: bool) -> String {
    match stmt {
        Statement::Expr(Expr::Constant(Constant::Str(s))) if docstring => docstring_literal(s),
        Statement::Expr(expr) => expr.to_string(),
        Statement::Return(None) => "return".to_string(),
        Statement::Return(Some(expr)) => format!("return {expr}"),
        Statement::Other(text) => text.clone(),
    }
}

/// Render a function definition, decorators included.
pub fn render_function(func: &FunctionDef) -> String {
    let mut out = String::new();
    for decorator in &func.decorators {
        let _ = writeln!(out, "@{decorator}");
    }
    let params: Vec<String> = func.params.iter().map(render_param).collect();
    let _ = write!(out, "def {}({})", func.name, params.join(", "));
    if let Some(returns) = &func.returns {
        let _ = write!(out, " -> {returns}");
    }
    out.push_str(":\n");

    if func.body.is_empty() {
        let _ = writeln!(out, "{INDENT}pass");
    }
    for (i, stmt) in func.body.iter().enumerate() {
        let _ = writeln!(out, "{INDENT}{}", render_statement(stmt, i == 0));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::python::syntax::{Keyword, ParamKind};

    #[test]
    fn repr_matches_python() {
        assert_eq!(repr("plain"), "'plain'");
        assert_eq!(repr("it's"), "\"it's\"");
        assert_eq!(repr("both ' and \""), "'both \\' and \"'");
        assert_eq!(repr("a\nb\\c"), "'a\\nb\\\\c'");
        assert_eq!(repr("\u{1}"), "'\\x01'");
    }

    #[test]
    fn renders_annotated_field() {
        let expr = Expr::subscript(
            Expr::name("Annotated"),
            Expr::Tuple(vec![
                Expr::name("str"),
                Expr::call(
                    Expr::name("Field"),
                    vec![],
                    vec![Keyword {
                        arg: "description".to_string(),
                        value: Expr::string("Address of the function"),
                    }],
                ),
            ]),
        );
        assert_eq!(
            expr.to_string(),
            "Annotated[str, Field(description='Address of the function')]"
        );
    }

    #[test]
    fn renders_constants() {
        assert_eq!(Constant::Float(1.0).to_string(), "1.0");
        assert_eq!(Constant::Float(0.25).to_string(), "0.25");
        assert_eq!(Constant::Bool(true).to_string(), "True");
        assert_eq!(Constant::None.to_string(), "None");
        assert_eq!(Expr::Tuple(vec![Expr::name("a")]).to_string(), "(a,)");
    }

    #[test]
    fn renders_function() {
        let func = FunctionDef {
            name: "rename".to_string(),
            decorators: vec![Expr::call(
                Expr::attribute(Expr::name("mcp"), "tool"),
                vec![],
                vec![],
            )],
            params: vec![
                Param {
                    name: "address".to_string(),
                    kind: ParamKind::Positional,
                    annotation: Some(Expr::name("str")),
                    default: None,
                },
                Param {
                    name: "force".to_string(),
                    kind: ParamKind::Positional,
                    annotation: Some(Expr::name("bool")),
                    default: Some(Expr::Constant(Constant::Bool(false))),
                },
            ],
            returns: Some(Expr::name("str")),
            body: vec![
                Statement::Expr(Expr::string("Rename something")),
                Statement::Return(Some(Expr::call(
                    Expr::name("make_jsonrpc_request"),
                    vec![Expr::string("rename"), Expr::name("address"), Expr::name("force")],
                    vec![],
                ))),
            ],
            line: 1,
        };
        assert_eq!(
            render_function(&func),
            "@mcp.tool()\n\
             def rename(address: str, force: bool = False) -> str:\n    \
             \"\"\"Rename something\"\"\"\n    \
             return make_jsonrpc_request('rename', address, force)\n"
        );
    }
}
