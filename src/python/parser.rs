//! tree-sitter based parser producing the [`Module`] tree.

use super::syntax::{
    ClassDef, Constant, Declaration, Expr, Field, FunctionDef, Keyword, Module, Param, ParamKind,
    Statement,
};
use super::ParseError;
use tree_sitter::{Node, Parser, Tree};

/// Parse Python source into its top-level declarations.
pub fn parse_module(source: &str) -> Result<Module, ParseError> {
    let tree = parse_tree(source)?;
    let root = tree.root_node();
    if root.has_error() {
        let (line, column) = first_error_position(root);
        return Err(ParseError::Syntax { line, column });
    }

    let declarations = named_children(root)
        .into_iter()
        .map(|node| convert_declaration(node, source))
        .collect();
    Ok(Module { declarations })
}

fn parse_tree(source: &str) -> Result<Tree, ParseError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_python::LANGUAGE.into())
        .map_err(|e| ParseError::Language(e.to_string()))?;
    parser.parse(source, None).ok_or(ParseError::Aborted)
}

fn first_error_position(root: Node) -> (usize, usize) {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            let pos = node.start_position();
            return (pos.row + 1, pos.column + 1);
        }
        if node.has_error() {
            let mut cursor = node.walk();
            let children: Vec<_> = node.children(&mut cursor).collect();
            // Push in reverse so the leftmost child is visited first.
            stack.extend(children.into_iter().rev());
        }
    }
    let pos = root.start_position();
    (pos.row + 1, pos.column + 1)
}

/// Named children without comments.
fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|c| c.kind() != "comment")
        .collect()
}

fn text<'a>(node: Node, source: &'a str) -> &'a str {
    &source[node.byte_range()]
}

fn first_named(node: Node) -> Option<Node> {
    named_children(node).into_iter().next()
}

fn convert_declaration(node: Node, source: &str) -> Declaration {
    match node.kind() {
        "function_definition" => Declaration::Function(convert_function(node, node, Vec::new(), source)),
        "class_definition" => Declaration::Class(convert_class(node, node, source)),
        "decorated_definition" => {
            let decorators = named_children(node)
                .into_iter()
                .filter(|c| c.kind() == "decorator")
                .filter_map(first_named)
                .map(|expr| convert_expr(expr, source))
                .collect();
            match node.child_by_field_name("definition") {
                Some(def) if def.kind() == "function_definition" => {
                    Declaration::Function(convert_function(def, node, decorators, source))
                }
                Some(def) if def.kind() == "class_definition" => {
                    Declaration::Class(convert_class(def, node, source))
                }
                _ => Declaration::Other,
            }
        }
        _ => Declaration::Other,
    }
}

fn convert_function(node: Node, outer: Node, decorators: Vec<Expr>, source: &str) -> FunctionDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();
    let params = node
        .child_by_field_name("parameters")
        .map(|p| convert_params(p, source))
        .unwrap_or_default();
    let returns = node
        .child_by_field_name("return_type")
        .map(|t| convert_type(t, source));
    let body = node
        .child_by_field_name("body")
        .map(|b| named_children(b).into_iter().map(|s| convert_statement(s, source)).collect())
        .unwrap_or_default();

    FunctionDef {
        name,
        decorators,
        params,
        returns,
        body,
        line: outer.start_position().row + 1,
    }
}

fn convert_params(node: Node, source: &str) -> Vec<Param> {
    named_children(node)
        .into_iter()
        .map(|p| convert_param(p, source))
        .collect()
}

fn convert_param(node: Node, source: &str) -> Param {
    let unsupported = || Param {
        name: text(node, source).to_string(),
        kind: ParamKind::Unsupported,
        annotation: None,
        default: None,
    };

    match node.kind() {
        "identifier" => Param {
            name: text(node, source).to_string(),
            kind: ParamKind::Positional,
            annotation: None,
            default: None,
        },
        "typed_parameter" => {
            let Some(target) = first_named(node) else {
                return unsupported();
            };
            if target.kind() != "identifier" {
                return unsupported();
            }
            Param {
                name: text(target, source).to_string(),
                kind: ParamKind::Positional,
                annotation: node.child_by_field_name("type").map(|t| convert_type(t, source)),
                default: None,
            }
        }
        "default_parameter" | "typed_default_parameter" => {
            let Some(name) = node.child_by_field_name("name") else {
                return unsupported();
            };
            if name.kind() != "identifier" {
                return unsupported();
            }
            Param {
                name: text(name, source).to_string(),
                kind: ParamKind::Positional,
                annotation: node.child_by_field_name("type").map(|t| convert_type(t, source)),
                default: node.child_by_field_name("value").map(|v| convert_expr(v, source)),
            }
        }
        _ => unsupported(),
    }
}

fn convert_class(node: Node, outer: Node, source: &str) -> ClassDef {
    let name = node
        .child_by_field_name("name")
        .map(|n| text(n, source).to_string())
        .unwrap_or_default();
    let bases = node
        .child_by_field_name("superclasses")
        .map(|args| {
            named_children(args)
                .into_iter()
                .filter(|a| a.kind() != "keyword_argument")
                .map(|a| convert_expr(a, source))
                .collect()
        })
        .unwrap_or_default();

    let mut fields = Vec::new();
    if let Some(body) = node.child_by_field_name("body") {
        for stmt in named_children(body) {
            if stmt.kind() != "expression_statement" {
                continue;
            }
            let Some(assign) = first_named(stmt) else {
                continue;
            };
            if assign.kind() != "assignment" {
                continue;
            }
            if let (Some(left), Some(ty)) = (
                assign.child_by_field_name("left"),
                assign.child_by_field_name("type"),
            ) {
                if left.kind() == "identifier" {
                    fields.push(Field {
                        name: text(left, source).to_string(),
                        annotation: convert_type(ty, source),
                    });
                }
            }
        }
    }

    ClassDef {
        name,
        bases,
        fields,
        source: text(outer, source).to_string(),
        line: outer.start_position().row + 1,
    }
}

fn convert_statement(node: Node, source: &str) -> Statement {
    match node.kind() {
        "expression_statement" => {
            let children = named_children(node);
            match children.as_slice() {
                [only] if !matches!(only.kind(), "assignment" | "augmented_assignment") => {
                    Statement::Expr(convert_expr(*only, source))
                }
                _ => Statement::Other(text(node, source).to_string()),
            }
        }
        "return_statement" => Statement::Return(first_named(node).map(|e| convert_expr(e, source))),
        _ => Statement::Other(text(node, source).to_string()),
    }
}

/// Convert a `type` node (annotation position) into an expression.
///
/// Depending on the grammar version, annotations are either plain expressions
/// or dedicated type nodes (`generic_type`, `union_type`, `member_type`). Both
/// map onto the same [`Expr`] shapes.
fn convert_type(node: Node, source: &str) -> Expr {
    match node.kind() {
        "type" => match first_named(node) {
            Some(inner) => convert_type(inner, source),
            None => other(node, source),
        },
        "generic_type" => {
            let children = named_children(node);
            let value = children
                .iter()
                .find(|c| c.kind() != "type_parameter")
                .map(|c| convert_type(*c, source));
            let params: Vec<Expr> = children
                .iter()
                .find(|c| c.kind() == "type_parameter")
                .map(|tp| {
                    named_children(*tp)
                        .into_iter()
                        .map(|t| convert_type(t, source))
                        .collect()
                })
                .unwrap_or_default();
            match value {
                Some(value) => Expr::subscript(value, slice_from(params)),
                None => other(node, source),
            }
        }
        "union_type" => {
            let children = named_children(node);
            match children.as_slice() {
                [left, right] => Expr::BinOp {
                    left: Box::new(convert_type(*left, source)),
                    op: "|".to_string(),
                    right: Box::new(convert_type(*right, source)),
                },
                _ => other(node, source),
            }
        }
        "member_type" => {
            let children = named_children(node);
            match children.as_slice() {
                [value, attr] => Expr::attribute(convert_type(*value, source), text(*attr, source)),
                _ => other(node, source),
            }
        }
        _ => convert_expr(node, source),
    }
}

fn slice_from(mut elements: Vec<Expr>) -> Expr {
    if elements.len() == 1 {
        elements.remove(0)
    } else {
        Expr::Tuple(elements)
    }
}

fn other(node: Node, source: &str) -> Expr {
    Expr::Other {
        kind: node.kind().to_string(),
        text: text(node, source).to_string(),
    }
}

fn convert_expr(node: Node, source: &str) -> Expr {
    match node.kind() {
        "identifier" => Expr::Name(text(node, source).to_string()),
        "true" => Expr::Constant(Constant::Bool(true)),
        "false" => Expr::Constant(Constant::Bool(false)),
        "none" => Expr::Constant(Constant::None),
        "integer" => parse_int(text(node, source))
            .map(|i| Expr::Constant(Constant::Int(i)))
            .unwrap_or_else(|| other(node, source)),
        "float" => parse_float(text(node, source))
            .map(|f| Expr::Constant(Constant::Float(f)))
            .unwrap_or_else(|| other(node, source)),
        "string" => string_literal(node, source)
            .map(|s| Expr::Constant(Constant::Str(s)))
            .unwrap_or_else(|| other(node, source)),
        "concatenated_string" => {
            let parts: Option<Vec<String>> = named_children(node)
                .into_iter()
                .map(|part| string_literal(part, source))
                .collect();
            parts
                .map(|p| Expr::Constant(Constant::Str(p.concat())))
                .unwrap_or_else(|| other(node, source))
        }
        "attribute" => match (
            node.child_by_field_name("object"),
            node.child_by_field_name("attribute"),
        ) {
            (Some(object), Some(attr)) => {
                Expr::attribute(convert_expr(object, source), text(attr, source))
            }
            _ => other(node, source),
        },
        "subscript" => {
            let Some(value) = node.child_by_field_name("value") else {
                return other(node, source);
            };
            let mut cursor = node.walk();
            let elements: Vec<Expr> = node
                .children_by_field_name("subscript", &mut cursor)
                .map(|s| convert_expr(s, source))
                .collect();
            Expr::subscript(convert_expr(value, source), slice_from(elements))
        }
        "tuple" => Expr::Tuple(
            named_children(node)
                .into_iter()
                .map(|e| convert_expr(e, source))
                .collect(),
        ),
        "list" => Expr::List(
            named_children(node)
                .into_iter()
                .map(|e| convert_expr(e, source))
                .collect(),
        ),
        "parenthesized_expression" => match named_children(node).as_slice() {
            [inner] => convert_expr(*inner, source),
            _ => other(node, source),
        },
        "call" => convert_call(node, source),
        "binary_operator" => match (
            node.child_by_field_name("left"),
            node.child_by_field_name("operator"),
            node.child_by_field_name("right"),
        ) {
            (Some(left), Some(op), Some(right)) => Expr::BinOp {
                left: Box::new(convert_expr(left, source)),
                op: text(op, source).to_string(),
                right: Box::new(convert_expr(right, source)),
            },
            _ => other(node, source),
        },
        "unary_operator" => {
            let negated = node
                .child_by_field_name("operator")
                .is_some_and(|op| text(op, source) == "-");
            let argument = node.child_by_field_name("argument").map(|a| convert_expr(a, source));
            match (negated, argument) {
                (true, Some(Expr::Constant(Constant::Int(i)))) => {
                    Expr::Constant(Constant::Int(-i))
                }
                (true, Some(Expr::Constant(Constant::Float(f)))) => {
                    Expr::Constant(Constant::Float(-f))
                }
                _ => other(node, source),
            }
        }
        "type" | "generic_type" | "union_type" | "member_type" => convert_type(node, source),
        _ => other(node, source),
    }
}

fn convert_call(node: Node, source: &str) -> Expr {
    let Some(func) = node.child_by_field_name("function") else {
        return other(node, source);
    };
    let Some(arguments) = node.child_by_field_name("arguments") else {
        return other(node, source);
    };
    if arguments.kind() != "argument_list" {
        return other(node, source);
    }

    let mut args = Vec::new();
    let mut keywords = Vec::new();
    for arg in named_children(arguments) {
        match arg.kind() {
            "keyword_argument" => match (
                arg.child_by_field_name("name"),
                arg.child_by_field_name("value"),
            ) {
                (Some(name), Some(value)) => keywords.push(Keyword {
                    arg: text(name, source).to_string(),
                    value: convert_expr(value, source),
                }),
                _ => return other(node, source),
            },
            "list_splat" | "dictionary_splat" => return other(node, source),
            _ => args.push(convert_expr(arg, source)),
        }
    }
    Expr::call(convert_expr(func, source), args, keywords)
}

fn parse_int(raw: &str) -> Option<i64> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    let lower = cleaned.to_ascii_lowercase();
    if let Some(hex) = lower.strip_prefix("0x") {
        i64::from_str_radix(hex, 16).ok()
    } else if let Some(oct) = lower.strip_prefix("0o") {
        i64::from_str_radix(oct, 8).ok()
    } else if let Some(bin) = lower.strip_prefix("0b") {
        i64::from_str_radix(bin, 2).ok()
    } else {
        lower.parse().ok()
    }
}

fn parse_float(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != '_').collect();
    cleaned.parse().ok()
}

/// Decode a plain (non-f, non-bytes) string literal node.
fn string_literal(node: Node, source: &str) -> Option<String> {
    if node.kind() != "string" {
        return None;
    }
    let mut cursor = node.walk();
    if node
        .children(&mut cursor)
        .any(|c| c.kind() == "interpolation")
    {
        return None;
    }

    let raw = text(node, source);
    let quote_start = raw.find(['\'', '"'])?;
    let prefix = raw[..quote_start].to_ascii_lowercase();
    if prefix.contains('f') || prefix.contains('b') {
        return None;
    }
    let quoted = &raw[quote_start..];
    let body = ["\"\"\"", "'''", "\"", "'"]
        .iter()
        .find_map(|q| quoted.strip_prefix(q).and_then(|rest| rest.strip_suffix(q)))?;

    if prefix.contains('r') {
        Some(body.to_string())
    } else {
        Some(decode_escapes(body))
    }
}

fn decode_escapes(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(next) = chars.next() else {
            out.push('\\');
            break;
        };
        match next {
            '\n' => {}
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'a' => out.push('\u{07}'),
            'b' => out.push('\u{08}'),
            'f' => out.push('\u{0c}'),
            'v' => out.push('\u{0b}'),
            'x' | 'u' | 'U' => {
                let width = match next {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let digits: String = (0..width).filter_map(|_| chars.next()).collect();
                match u32::from_str_radix(&digits, 16).ok().and_then(char::from_u32) {
                    Some(decoded) if digits.len() == width => out.push(decoded),
                    _ => {
                        out.push('\\');
                        out.push(next);
                        out.push_str(&digits);
                    }
                }
            }
            '0'..='7' => {
                let mut digits = String::from(next);
                while digits.len() < 3 {
                    match chars.peek() {
                        Some(d @ '0'..='7') => {
                            digits.push(*d);
                            chars.next();
                        }
                        _ => break,
                    }
                }
                match u32::from_str_radix(&digits, 8).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push('\\');
                        out.push_str(&digits);
                    }
                }
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    out
}
