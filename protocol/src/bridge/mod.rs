//! # Cross-Chain Payload
//!
//! Two ledger instances share nothing but the bytes produced here. A pool
//! burns on the source, wraps `(receiver, amount, rate)` in a
//! [`BridgeMessage`], and the remote pool mints from it.

pub mod payload;

pub use payload::{decode_rate, encode_rate, BridgeMessage, PayloadError};
