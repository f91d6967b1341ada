//! IDA Pro MCP bridge
//!
//! Generates forwarding stubs from the IDA plugin source, then serves them as
//! MCP tools over stdin/stdout or HTTP.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ida_mcp_bridge::config::{
    BridgeConfig, GenerationPaths, TransportKind, DEFAULT_HOST, DEFAULT_IDA_HOST,
    DEFAULT_IDA_PORT, DEFAULT_PORT,
};
use ida_mcp_bridge::transport::{serve_http, serve_stdio};
use ida_mcp_bridge::{
    emitter, generate_from_source, load_definition_file, load_stubs, BridgeServer, RpcClient,
    RpcConfig, StubSet, ToolCatalog,
};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "ida-mcp-bridge", version, about = "MCP bridge to the IDA Pro plugin")]
struct Cli {
    #[command(flatten)]
    args: BridgeArgs,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Generate server_generated.py from the plugin source and exit
    Generate,
}

#[derive(Args)]
struct BridgeArgs {
    /// Host to bind the HTTP transport to
    #[arg(long, env = "IDA_MCP_HOST", default_value = DEFAULT_HOST)]
    host: String,
    /// Port of the HTTP transport
    #[arg(long, env = "IDA_MCP_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,
    /// MCP transport
    #[arg(long, env = "IDA_MCP_TRANSPORT", value_enum, default_value_t = TransportKind::Stdio)]
    transport: TransportKind,
    /// Host the IDA plugin listens on
    #[arg(long, env = "IDA_MCP_IDA_HOST", default_value = DEFAULT_IDA_HOST)]
    ida_host: String,
    /// Port the IDA plugin listens on
    #[arg(long, env = "IDA_MCP_IDA_PORT", default_value_t = DEFAULT_IDA_PORT)]
    ida_port: u16,
    /// Per-request timeout for plugin calls in seconds (unset waits indefinitely)
    #[arg(long, env = "IDA_MCP_IDA_TIMEOUT_SECS")]
    ida_timeout_secs: Option<u64>,
    /// Plugin source to generate stubs from (defaults to mcp-plugin.py next to the executable)
    #[arg(long, env = "IDA_MCP_PLUGIN_PATH")]
    plugin_path: Option<PathBuf>,
    /// Where to write the generated stubs (defaults to server_generated.py next to the executable)
    #[arg(long, env = "IDA_MCP_GENERATED_PATH")]
    generated_path: Option<PathBuf>,
    /// Allowed Origin values for the HTTP transport (comma-separated)
    #[arg(
        long,
        env = "IDA_MCP_ALLOW_ORIGIN",
        value_delimiter = ',',
        default_value = "http://localhost,http://127.0.0.1"
    )]
    allow_origin: Vec<String>,
}

impl BridgeArgs {
    fn paths(&self) -> GenerationPaths {
        let defaults = GenerationPaths::beside_executable();
        GenerationPaths {
            plugin: self.plugin_path.clone().unwrap_or(defaults.plugin),
            generated: self.generated_path.clone().unwrap_or(defaults.generated),
        }
    }

    fn into_config(self) -> anyhow::Result<BridgeConfig> {
        let paths = self.paths();
        let bind: SocketAddr = (self.host.as_str(), self.port)
            .to_socket_addrs()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))?
            .next()
            .with_context(|| format!("{} did not resolve to an address", self.host))?;
        let remote = RpcConfig::new(self.ida_host, self.ida_port)
            .with_timeout(self.ida_timeout_secs.map(Duration::from_secs));
        Ok(BridgeConfig {
            transport: self.transport,
            bind,
            allowed_origins: self.allow_origin,
            remote,
            paths,
        })
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging to stderr (stdout is used for MCP protocol)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ida_mcp_bridge=info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Command::Generate) => run_generate(&cli.args.paths()),
        None => run_server(cli.args.into_config()?),
    }
}

/// Generate, persist and reload the stubs.
fn prepare_stubs(paths: &GenerationPaths) -> anyhow::Result<StubSet> {
    let source = load_definition_file(&paths.plugin)?;
    let generated = generate_from_source(&source)
        .with_context(|| format!("failed to generate stubs from {}", paths.plugin.display()))?;
    let text = emitter::emit(&generated, &paths.generated)
        .with_context(|| format!("failed to write {}", paths.generated.display()))?;
    let stubs = load_stubs(&text)
        .with_context(|| format!("failed to load {}", paths.generated.display()))?;
    Ok(stubs)
}

fn run_generate(paths: &GenerationPaths) -> anyhow::Result<()> {
    let stubs = prepare_stubs(paths)?;
    let catalog = ToolCatalog::new(&stubs);
    for name in catalog.names() {
        println!("{name}");
    }
    Ok(())
}

async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => {},
            _ = sigint.recv() => {},
            _ = tokio::signal::ctrl_c() => {},
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }

    Ok(())
}

fn run_server(config: BridgeConfig) -> anyhow::Result<()> {
    info!(transport = %config.transport, "Starting IDA MCP bridge");

    let stubs = prepare_stubs(&config.paths)?;
    let catalog = Arc::new(ToolCatalog::new(&stubs));
    let client = Arc::new(RpcClient::new(config.remote.clone())?);
    let server = BridgeServer::new(client, catalog);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    rt.block_on(async move {
        let cancel = CancellationToken::new();
        let cancel_for_signal = cancel.clone();
        tokio::spawn(async move {
            if wait_for_shutdown_signal().await.is_ok() {
                info!("Shutdown signal received");
                cancel_for_signal.cancel();
            } else {
                info!("Shutdown signal handler failed; server will continue running");
            }
        });

        match config.transport {
            TransportKind::Stdio => serve_stdio(server, cancel).await,
            TransportKind::Sse => {
                let listener = tokio::net::TcpListener::bind(config.bind)
                    .await
                    .with_context(|| format!("bind failed on {}", config.bind))?;
                serve_http(listener, server, &config.allowed_origins, cancel).await
            }
        }
    })?;

    info!("Server stopped");
    Ok(())
}
