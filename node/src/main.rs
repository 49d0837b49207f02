// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Rebase Ledger Node
//!
//! Entry point for the `rebase-node` binary. Parses CLI arguments, loads the
//! node configuration, restores or creates the ledger, and serves the
//! HTTP/WS API and Prometheus metrics.
//!
//! The binary supports four subcommands:
//!
//! - `run`     start the node
//! - `init`    create a data directory with a default `config.toml`
//! - `status`  query a running node's status endpoint
//! - `version` print build version information

mod api;
mod cli;
mod logging;
mod metrics;
mod settings;
mod state;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use rebase_protocol::storage::LedgerDb;
use rebase_protocol::{SharedClock, SystemClock};

use cli::{Commands, RebaseNodeCli};
use logging::LogFormat;
use metrics::NodeMetrics;
use settings::NodeConfig;
use state::NodeState;

/// File name of the node configuration inside the data directory.
const CONFIG_FILE: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = RebaseNodeCli::parse();

    match cli.command {
        Commands::Run(args) => run_node(args).await,
        Commands::Init(args) => init_node(args),
        Commands::Status(args) => query_status(args).await,
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Reads the config named on the command line, or `config.toml` in the
/// data directory, then applies flag overrides.
fn resolve_config(args: &cli::RunArgs) -> Result<NodeConfig> {
    let mut config = match &args.config {
        Some(path) => NodeConfig::load(path)?,
        None => NodeConfig::load_or_default(&args.data_dir.join(CONFIG_FILE))?,
    };
    if let Some(port) = args.rpc_port {
        config.rpc_port = port;
    }
    if let Some(port) = args.metrics_port {
        config.metrics_port = port;
    }
    if let Some(chain) = args.chain_selector {
        config.chain_selector = chain;
    }
    if let Some(format) = &args.log_format {
        config.log_format = format.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Starts the node: restores the ledger, then serves the API and metrics
/// until a shutdown signal arrives.
async fn run_node(args: cli::RunArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    logging::init_logging(
        &config.log_filter,
        LogFormat::from_str_lossy(&config.log_format),
    );

    tracing::info!(
        chain_selector = config.chain_selector,
        rpc_port = config.rpc_port,
        metrics_port = config.metrics_port,
        data_dir = %args.data_dir.display(),
        "starting rebase-node"
    );

    // --- Persistent storage ---
    let db_path = args.data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let db = LedgerDb::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    // --- Ledger ---
    let clock: SharedClock = Arc::new(SystemClock);
    let node = NodeState::load_or_genesis(&db, &config, clock)?;

    // --- Metrics ---
    let node_metrics =
        Arc::new(NodeMetrics::new().context("failed to create prometheus registry")?);

    // --- Application state ---
    let app_state = api::AppState::new(
        format!(
            "{} (protocol {})",
            env!("CARGO_PKG_VERSION"),
            rebase_protocol::config::PROTOCOL_VERSION,
        ),
        node,
        db.clone(),
        Arc::clone(&node_metrics),
    );

    // --- API server ---
    let api_router = api::create_router(app_state);
    let api_addr = format!("0.0.0.0:{}", config.rpc_port);
    let api_listener = tokio::net::TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("failed to bind RPC listener on {}", api_addr))?;
    tracing::info!("RPC/API server listening on {}", api_addr);

    // --- Metrics server ---
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(metrics::metrics_handler))
        .with_state(Arc::clone(&node_metrics));
    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    let metrics_listener = tokio::net::TcpListener::bind(&metrics_addr)
        .await
        .with_context(|| format!("failed to bind metrics listener on {}", metrics_addr))?;
    tracing::info!("Metrics server listening on {}", metrics_addr);

    // --- Serve ---
    tokio::select! {
        res = axum::serve(api_listener, api_router) => {
            if let Err(e) = res {
                tracing::error!("API server error: {}", e);
            }
        }
        res = axum::serve(metrics_listener, metrics_router) => {
            if let Err(e) = res {
                tracing::error!("Metrics server error: {}", e);
            }
        }
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, draining connections");
        }
    }

    db.flush().context("failed to flush database")?;
    tracing::info!("rebase-node stopped");
    Ok(())
}

/// Creates the data directory and writes a default configuration.
fn init_node(args: cli::InitArgs) -> Result<()> {
    logging::init_logging("rebase_node=info", LogFormat::Pretty);

    let data_dir = &args.data_dir;
    tracing::info!(data_dir = %data_dir.display(), chain = args.chain_selector, "initializing node");

    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("failed to create data directory: {}", data_dir.display()))?;

    let config_path = data_dir.join(CONFIG_FILE);
    write_default_config(&config_path, args.chain_selector, args.force)?;

    println!("Node initialized successfully.");
    println!("  Data directory : {}", data_dir.display());
    println!("  Config         : {}", config_path.display());
    println!("  Chain selector : {}", args.chain_selector);

    Ok(())
}

fn write_default_config(path: &Path, chain_selector: u64, force: bool) -> Result<NodeConfig> {
    if path.exists() && !force {
        anyhow::bail!(
            "{} already exists; pass --force to overwrite",
            path.display()
        );
    }
    let config = NodeConfig {
        chain_selector,
        ..NodeConfig::default()
    };
    config.validate()?;
    config.write(path)?;
    tracing::info!(path = %path.display(), "default configuration written");
    Ok(config)
}

/// Queries a running node's status endpoint and prints the result.
async fn query_status(args: cli::StatusArgs) -> Result<()> {
    let url = format!("{}/status", args.rpc_url.trim_end_matches('/'));
    let body = http_get(&url).await?;
    println!("{}", body);
    Ok(())
}

/// Plain HTTP/1.1 GET over a tokio TCP stream.
async fn http_get(url: &str) -> Result<String> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let target = Target::parse(url)?;
    let addr = format!("{}:{}", target.host, target.port);
    let mut stream = tokio::net::TcpStream::connect(&addr)
        .await
        .with_context(|| format!("failed to connect to {}", addr))?;

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
        target.path, target.host,
    );
    stream.write_all(request.as_bytes()).await?;
    stream.shutdown().await?;

    let mut buf = Vec::new();
    stream.read_to_end(&mut buf).await?;
    let response = String::from_utf8_lossy(&buf);

    let body = response
        .split_once("\r\n\r\n")
        .map(|(_, b)| b.to_string())
        .unwrap_or_else(|| response.to_string());
    Ok(body)
}

/// Host, port and path of an `http://` URL.
#[derive(Debug, PartialEq, Eq)]
struct Target {
    host: String,
    port: u16,
    path: String,
}

impl Target {
    fn parse(url: &str) -> Result<Self> {
        let rest = url.strip_prefix("http://").unwrap_or(url);
        if rest.starts_with("https://") {
            anyhow::bail!("https is not supported: {url}");
        }
        let (authority, path) = match rest.find('/') {
            Some(i) => (&rest[..i], &rest[i..]),
            None => (rest, "/"),
        };
        let (host, port) = match authority.rsplit_once(':') {
            Some((host, port)) => (
                host,
                port.parse::<u16>()
                    .with_context(|| format!("bad port in {url}"))?,
            ),
            None => (authority, 80),
        };
        if host.is_empty() {
            anyhow::bail!("missing host in {url}");
        }
        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("rebase-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol    {}", rebase_protocol::config::PROTOCOL_VERSION);
    println!(
        "payload     v{}",
        rebase_protocol::config::BRIDGE_PAYLOAD_VERSION
    );
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// On non-Unix platforms, only Ctrl+C is supported.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
