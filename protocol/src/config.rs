//! # Protocol Configuration & Constants
//!
//! Every magic number in the ledger lives here. The accrual math depends on
//! these values being identical on both sides of a bridge, so changing one
//! after launch means redeploying every instance at once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Rate;

// ---------------------------------------------------------------------------
// Versioning
// ---------------------------------------------------------------------------

/// Crate-level protocol version string.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Version byte carried in every bridge message. Bump on any change to the
/// envelope layout; both pools must agree.
pub const BRIDGE_PAYLOAD_VERSION: u8 = 1;

// ---------------------------------------------------------------------------
// Token Defaults
// ---------------------------------------------------------------------------

/// Default token name.
pub const DEFAULT_TOKEN_NAME: &str = "Rebase Token";

/// Default ticker.
pub const DEFAULT_TOKEN_SYMBOL: &str = "RBT";

/// Display decimals. The ledger never divides by this; it is metadata.
pub const DEFAULT_DECIMALS: u8 = 18;

/// Starting global rate: 5e-8 per second at 18-decimal scale, roughly
/// 0.43% per day of simple interest.
pub const DEFAULT_GLOBAL_RATE: Rate = 50_000_000_000;

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

/// Size of the ABI word that carries the frozen rate across chains.
pub const RATE_WORD_LENGTH: usize = 32;

/// Upper bound on an encoded bridge envelope. Anything larger is garbage.
pub const MAX_BRIDGE_MESSAGE_BYTES: usize = 1024;

// ---------------------------------------------------------------------------
// Network Defaults
// ---------------------------------------------------------------------------

/// Default REST API port.
pub const DEFAULT_RPC_PORT: u16 = 9841;

/// Default metrics (Prometheus) port.
pub const DEFAULT_METRICS_PORT: u16 = 9842;

// ---------------------------------------------------------------------------
// LedgerConfig
// ---------------------------------------------------------------------------

/// Errors from [`LedgerConfig::validate`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Name or symbol was empty.
    #[error("token {0} must not be empty")]
    EmptyField(&'static str),

    /// A zero starting rate leaves no room for the rate to ever decrease.
    #[error("initial global rate must be greater than zero")]
    ZeroInitialRate,
}

/// Token metadata and the starting global rate for one ledger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Human-readable token name.
    pub name: String,
    /// Ticker symbol.
    pub symbol: String,
    /// Display decimals.
    pub decimals: u8,
    /// Global rate installed at genesis.
    pub initial_global_rate: Rate,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_TOKEN_NAME.to_string(),
            symbol: DEFAULT_TOKEN_SYMBOL.to_string(),
            decimals: DEFAULT_DECIMALS,
            initial_global_rate: DEFAULT_GLOBAL_RATE,
        }
    }
}

impl LedgerConfig {
    /// Checks the values a ledger cannot sensibly start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyField("name"));
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptyField("symbol"));
        }
        if self.initial_global_rate == 0 {
            return Err(ConfigError::ZeroInitialRate);
        }
        Ok(())
    }
}
