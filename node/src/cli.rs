//! # CLI Interface
//!
//! `rebase-node` subcommands: `run`, `init`, `status` and `version`. Every
//! `run` flag can also come from the environment; flags win over
//! `config.toml`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Rebase ledger node.
///
/// Hosts one ledger instance with its custody vault and token pool, serves
/// the REST/WebSocket API and exposes Prometheus metrics.
#[derive(Parser, Debug)]
#[command(
    name = "rebase-node",
    about = "Rebase ledger node",
    version,
    propagate_version = true
)]
pub struct RebaseNodeCli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the node.
    Run(RunArgs),
    /// Create the data directory and write a default `config.toml`.
    Init(InitArgs),
    /// Query the status of a running node via its API.
    Status(StatusArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments for the `run` subcommand.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to the node configuration file (TOML).
    ///
    /// When omitted, the node looks for `config.toml` in the data directory
    /// and falls back to built-in defaults.
    #[arg(long, short = 'c', env = "REBASE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Data directory holding the ledger database.
    #[arg(long, short = 'd', env = "REBASE_DATA_DIR", default_value = "./rebase-data")]
    pub data_dir: PathBuf,

    /// Overrides `rpc_port`.
    #[arg(long, env = "REBASE_RPC_PORT")]
    pub rpc_port: Option<u16>,

    /// Overrides `metrics_port`.
    #[arg(long, env = "REBASE_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Overrides `chain_selector`.
    #[arg(long, env = "REBASE_CHAIN_SELECTOR")]
    pub chain_selector: Option<u64>,

    /// Overrides `log_format` (`pretty` or `json`).
    #[arg(long, env = "REBASE_LOG_FORMAT")]
    pub log_format: Option<String>,
}

/// Arguments for the `init` subcommand.
#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Data directory to initialize.
    #[arg(long, short = 'd', env = "REBASE_DATA_DIR", default_value = "./rebase-data")]
    pub data_dir: PathBuf,

    /// Chain selector written into the new config.
    #[arg(long, default_value_t = 1)]
    pub chain_selector: u64,

    /// Overwrite an existing `config.toml`.
    #[arg(long)]
    pub force: bool,
}

/// Arguments for the `status` subcommand.
#[derive(Parser, Debug)]
pub struct StatusArgs {
    /// API endpoint of the running node.
    #[arg(long, default_value = "http://127.0.0.1:9841")]
    pub rpc_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        RebaseNodeCli::command().debug_assert();
    }

    #[test]
    fn run_overrides_parse() {
        let cli = RebaseNodeCli::try_parse_from([
            "rebase-node",
            "run",
            "--rpc-port",
            "8000",
            "--chain-selector",
            "421614",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.rpc_port, Some(8000));
                assert_eq!(args.chain_selector, Some(421_614));
                assert_eq!(args.metrics_port, None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
