//! mcpshield server binary.
//!
//! Loads the YAML configuration, builds the orchestrator client, starts the
//! upstream fleet, and serves the JSON-RPC endpoint until SIGINT/SIGTERM.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use mcpshield_core::{Config, ConfigError};
use mcpshield_proxy::ProxyCore;
use mcpshield_runtime::{KubernetesOrchestrator, OrchestratorClient};
use mcpshield_server::{create_router, AppState};

/// Time allowed for in-flight HTTP requests to drain after the shutdown
/// signal, and for the upstream fleet to tear down afterwards.
const DRAIN_WINDOW: Duration = Duration::from_secs(5);
const STOP_DEADLINE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "mcpshield-server", version, about = "MCP aggregating proxy")]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "/app/config.yaml")]
    config: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the server
    Run,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Run => run(&cli).await,
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let config = Config::from_file(&cli.config)
        .with_context(|| format!("failed to read config {}", cli.config))?;

    init_tracing(if cli.verbose {
        "debug"
    } else {
        config.log_level()
    });

    info!(
        address = %config.server_address(),
        namespace = %config.kubernetes_namespace(),
        "server configuration loaded"
    );

    if !config.has_kubernetes_runtime() {
        return Err(ConfigError::MissingRuntime.into());
    }

    let namespace = config.kubernetes_namespace().to_string();
    let orchestrator: Arc<dyn OrchestratorClient> = match config.kubeconfig() {
        Some(path) => {
            Arc::new(KubernetesOrchestrator::from_kubeconfig(path, namespace.clone()).await?)
        }
        None => Arc::new(KubernetesOrchestrator::try_default(namespace.clone()).await?),
    };

    let proxy = Arc::new(ProxyCore::new(config.mcp_servers.clone(), orchestrator));
    let root = CancellationToken::new();

    proxy
        .start(&root)
        .await
        .context("failed to start MCP servers")?;

    let app = create_router(AppState::new(Arc::clone(&proxy)))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr: SocketAddr = config
        .server_address()
        .parse()
        .context("invalid server address")?;
    let listener = TcpListener::bind(addr).await?;
    info!(
        address = %addr,
        servers = proxy.server_count(),
        namespace = %namespace,
        "MCP bridge proxy ready"
    );

    tokio::spawn(watch_shutdown_signal(root.clone()));

    let serve = {
        let root = root.clone();
        async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { root.cancelled().await })
                .await
        }
    };
    tokio::select! {
        result = serve => result?,
        () = async {
            root.cancelled().await;
            tokio::time::sleep(DRAIN_WINDOW).await;
        } => {
            warn!("drain window elapsed, closing remaining connections");
        }
    }

    info!("server shutting down");
    let stop_token = CancellationToken::new();
    if tokio::time::timeout(STOP_DEADLINE, proxy.stop(&stop_token))
        .await
        .is_err()
    {
        warn!("timed out waiting for MCP servers to stop");
    }

    Ok(())
}

/// Cancel the root token on SIGINT or SIGTERM.
async fn watch_shutdown_signal(root: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
    info!("shutdown signal received");
    root.cancel();
}

fn init_tracing(level: &str) {
    let level = match level {
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .init();
}
