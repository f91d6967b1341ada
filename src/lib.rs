//! MCP bridge for the IDA Pro plugin
//!
//! The IDA Pro MCP plugin runs inside the IDA GUI and serves JSON-RPC at
//! `POST /mcp`. This crate turns that endpoint into an MCP tool server:
//!
//! 1. **Generate**: the plugin source (`mcp-plugin.py`) is parsed, every
//!    `@jsonrpc` function is validated and rewritten into a forwarding stub,
//!    and every `TypedDict` record is collected (`generator`).
//! 2. **Emit**: the stubs are rendered into `server_generated.py` next to the
//!    executable, overwriting any previous copy (`emitter`).
//! 3. **Load**: the rendered module is read back into live stubs (`stub`).
//! 4. **Serve**: the tool catalog (`check_connection` plus one tool per stub)
//!    is served over stdio or HTTP (`server`, `transport`). Each tool call is
//!    one JSON-RPC request to the plugin (`rpc`).

pub mod config;
pub mod emitter;
pub mod error;
pub mod generator;
pub mod python;
pub mod rpc;
pub mod schema;
pub mod server;
pub mod stub;
pub mod tool_registry;
pub mod transport;

pub use config::{BridgeConfig, GenerationPaths, TransportKind};
pub use error::ToolError;
pub use generator::{generate, generate_from_source, load_definition_file, GenerateError, Generated};
pub use rpc::{RpcClient, RpcConfig, RpcError};
pub use server::BridgeServer;
pub use stub::{load_stubs, LoadError, Stub, StubSet};
pub use tool_registry::{ToolCatalog, CHECK_CONNECTION};
