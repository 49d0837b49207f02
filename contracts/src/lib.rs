//! # Rebase Ledger Adapters
//!
//! The components that sit between the outside world and a
//! [`RebaseLedger`](rebase_protocol::RebaseLedger). None of them holds ledger
//! state; each one owns an address with `MintBurn` and calls the ledger.
//!
//! - **Vault**: base asset in, ledger units out at the current global rate,
//!   and back again.
//! - **Token Pool**: burn here, mint there, carrying the holder's frozen
//!   rate in the message.
//! - **Relay**: an in-process queue of encoded bridge messages.
//! - **Base Asset**: the asset the vault custodies.
//!
//! ## Design Principles
//!
//! 1. An operation that crosses the ledger/asset boundary either completes
//!    on both sides or on neither.
//! 2. Every failure carries a [`FailureKind`] so a transport can map it
//!    without matching on variants.

pub mod base_asset;
pub mod error;
pub mod relay;
pub mod token_pool;
pub mod vault;

pub use base_asset::{AssetBook, AssetError, BaseAsset};
pub use error::FailureKind;
pub use relay::InMemoryRelay;
pub use token_pool::{PoolError, TokenPool};
pub use vault::{ReceiptKind, Vault, VaultError, VaultReceipt};
