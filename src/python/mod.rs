//! Python source handling for plugin definition files.
//!
//! - [`parser`]: tree-sitter parse into the [`syntax`] tree
//! - [`unparse`]: render tree nodes back to Python source

pub mod parser;
pub mod syntax;
pub mod unparse;

pub use parser::parse_module;
pub use syntax::{ClassDef, Constant, Declaration, Expr, FunctionDef, Module, Param, Statement};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("syntax error at line {line}, column {column}")]
    Syntax { line: usize, column: usize },

    #[error("failed to load Python grammar: {0}")]
    Language(String),

    #[error("parser aborted without producing a tree")]
    Aborted,
}
