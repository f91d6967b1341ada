//! Process configuration.
//!
//! Values come from the command line (see `main.rs`) and are passed around
//! explicitly; nothing here is global state.

use crate::rpc::RpcConfig;
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_IDA_HOST: &str = "localhost";
pub const DEFAULT_IDA_PORT: u16 = 13337;

/// Plugin source the stubs are generated from.
pub const PLUGIN_FILE_NAME: &str = "mcp-plugin.py";
/// Rendered stub module, rewritten on every start.
pub const GENERATED_FILE_NAME: &str = "server_generated.py";

/// Event stream endpoint of the network transport.
pub const SSE_PATH: &str = "/sse";
/// Client message endpoint of the network transport.
pub const MESSAGE_PATH: &str = "/messages/";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TransportKind {
    /// Serve over stdin/stdout
    #[default]
    Stdio,
    /// Serve over HTTP with a streamed event endpoint
    Sse,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Stdio => f.write_str("stdio"),
            TransportKind::Sse => f.write_str("sse"),
        }
    }
}

/// Where the definition file is read from and the generated file written to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPaths {
    pub plugin: PathBuf,
    pub generated: PathBuf,
}

impl GenerationPaths {
    /// Defaults live next to the running executable.
    pub fn beside(dir: &Path) -> Self {
        Self {
            plugin: dir.join(PLUGIN_FILE_NAME),
            generated: dir.join(GENERATED_FILE_NAME),
        }
    }

    pub fn beside_executable() -> Self {
        let dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."));
        Self::beside(&dir)
    }
}

/// Everything needed to start serving.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub transport: TransportKind,
    pub bind: SocketAddr,
    pub allowed_origins: Vec<String>,
    pub remote: RpcConfig,
    pub paths: GenerationPaths,
}
