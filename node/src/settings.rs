//! # Node Configuration
//!
//! `config.toml` in the data directory, overridable from the command line
//! and environment. Everything the node needs to bootstrap a ledger lives
//! here: token metadata, the admin identity, the adapter addresses, trusted
//! remote pools and genesis funding for the base asset.
//!
//! TOML integers are 64-bit, so the initial rate is a `u64` here and
//! genesis amounts are decimal strings.

use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use rebase_protocol::config::{
    LedgerConfig, DEFAULT_DECIMALS, DEFAULT_GLOBAL_RATE, DEFAULT_METRICS_PORT, DEFAULT_RPC_PORT,
    DEFAULT_TOKEN_NAME, DEFAULT_TOKEN_SYMBOL,
};
use rebase_protocol::{Address, Amount, ChainSelector};

/// Default `RUST_LOG`-style filter.
pub const DEFAULT_LOG_FILTER: &str =
    "rebase_node=info,rebase_protocol=info,rebase_contracts=info,tower_http=debug";

/// Top-level node configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Chain selector of this ledger instance.
    pub chain_selector: ChainSelector,
    /// REST/WebSocket port.
    pub rpc_port: u16,
    /// Prometheus port.
    pub metrics_port: u16,
    /// `pretty` or `json`.
    pub log_format: String,
    /// Default log filter when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Ledger owner. Holds `Admin`.
    pub admin: Address,
    /// Custody vault identity. Granted `MintBurn` at genesis.
    pub vault_address: Address,
    /// Token pool identity. Granted `MintBurn` at genesis.
    pub pool_address: Address,
    /// Token metadata and starting rate.
    pub ledger: LedgerSettings,
    /// Trusted pools on other chains.
    pub remotes: Vec<RemotePool>,
    /// Base-asset balances created at genesis.
    pub genesis_funds: Vec<GenesisFund>,
}

/// TOML-friendly mirror of [`LedgerConfig`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerSettings {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    pub initial_global_rate: u64,
}

/// One trusted remote pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePool {
    pub chain_selector: ChainSelector,
    pub pool: Address,
}

/// Base asset credited to `account` at genesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisFund {
    pub account: Address,
    /// Decimal string; may exceed 64 bits.
    pub amount: String,
}

impl GenesisFund {
    /// Parsed amount.
    pub fn amount(&self) -> Result<Amount> {
        self.amount
            .parse()
            .with_context(|| format!("invalid genesis amount for {}: {}", self.account, self.amount))
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOKEN_NAME.to_string(),
            symbol: DEFAULT_TOKEN_SYMBOL.to_string(),
            decimals: DEFAULT_DECIMALS,
            initial_global_rate: DEFAULT_GLOBAL_RATE as u64,
        }
    }
}

impl From<&LedgerSettings> for LedgerConfig {
    fn from(s: &LedgerSettings) -> Self {
        LedgerConfig {
            name: s.name.clone(),
            symbol: s.symbol.clone(),
            decimals: s.decimals,
            initial_global_rate: u128::from(s.initial_global_rate),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            chain_selector: 1,
            rpc_port: DEFAULT_RPC_PORT,
            metrics_port: DEFAULT_METRICS_PORT,
            log_format: "pretty".to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            admin: Address::from_label("rebase-admin"),
            vault_address: Address::from_label("rebase-vault"),
            pool_address: Address::from_label("rebase-pool"),
            ledger: LedgerSettings::default(),
            remotes: Vec::new(),
            genesis_funds: Vec::new(),
        }
    }
}

impl NodeConfig {
    /// Reads and validates a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: NodeConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise returns the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Writes the configuration as pretty TOML.
    pub fn write(&self, path: &Path) -> Result<()> {
        let body = toml::to_string_pretty(self).context("failed to render config")?;
        std::fs::write(path, body)
            .with_context(|| format!("failed to write config {}", path.display()))
    }

    /// Checks that the ledger settings are usable and that the three
    /// system identities are distinct and non-zero.
    pub fn validate(&self) -> Result<()> {
        LedgerConfig::from(&self.ledger)
            .validate()
            .context("invalid [ledger] section")?;
        let ids = [self.admin, self.vault_address, self.pool_address];
        if ids.iter().any(Address::is_zero) {
            anyhow::bail!("admin, vault_address and pool_address must be non-zero");
        }
        if ids[0] == ids[1] || ids[0] == ids[2] || ids[1] == ids[2] {
            anyhow::bail!("admin, vault_address and pool_address must be distinct");
        }
        for fund in &self.genesis_funds {
            fund.amount()?;
        }
        Ok(())
    }
}
