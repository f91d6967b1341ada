//! Rendering and persisting the generated stub module.

use crate::generator::Generated;
use crate::python::unparse::render_function;
use std::io;
use std::path::Path;
use tracing::info;

/// Fixed preamble of every generated module.
pub const HEADER: &str = "\
# NOTE: This file has been automatically generated, do not modify!
# Architecture based on https://github.com/mrexodia/ida-pro-mcp (MIT License)
from typing import Annotated, Optional, TypedDict, Generic, TypeVar
from pydantic import Field

T = TypeVar(\"T\")

";

/// Render the generated module: header, records, then stubs.
///
/// Records are emitted verbatim. Each block is followed by one blank line.
pub fn render(generated: &Generated) -> String {
    let mut out = String::from(HEADER);
    for record in generated.records() {
        out.push_str(record.source.trim_end());
        out.push_str("\n\n");
    }
    for func in generated.functions() {
        out.push_str(&render_function(func));
        out.push('\n');
    }
    out
}

/// Write `text` to `path`, replacing any previous content.
pub fn persist(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

/// Render and persist, returning the rendered text.
pub fn emit(generated: &Generated, path: &Path) -> io::Result<String> {
    let text = render(generated);
    persist(path, &text)?;
    info!(
        path = %path.display(),
        stubs = generated.function_names().len(),
        bytes = text.len(),
        "Wrote generated stubs"
    );
    Ok(text)
}
