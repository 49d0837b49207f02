// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Rebase Protocol Core Library
//!
//! An interest-accruing balance ledger. Every holder carries a principal, a
//! rate frozen at the moment they last acquired units, and the time those
//! two were last reconciled. Balances grow linearly between touches and
//! compound across them; the global rate that new mints receive only ever
//! goes down.
//!
//! ## Architecture
//!
//! - **math**: 18-decimal fixed point over 256-bit intermediates.
//! - **types**: amounts, rates, timestamps, addresses.
//! - **clock**: the trusted time source the ledger reads.
//! - **access**: identity → capability table.
//! - **ledger**: holder records, accrual, transfers, events.
//! - **bridge**: the message envelope two ledger instances exchange.
//! - **storage**: sled snapshots of ledger state.
//! - **config**: protocol constants and token metadata.
//!
//! ## Design Philosophy
//!
//! 1. Every arithmetic step is checked. Overflow is an error, never a wrap.
//! 2. A failed mutation leaves no trace.
//! 3. The ledger never reads the wall clock itself.

pub mod access;
pub mod bridge;
pub mod clock;
pub mod config;
pub mod ledger;
pub mod math;
pub mod storage;
pub mod types;

pub use access::{AccessError, Capability};
pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use ledger::{HolderRecord, LedgerError, LedgerEvent, LedgerState, RebaseLedger};
pub use types::{Address, Amount, ChainSelector, Rate, Timestamp, MAX_AMOUNT};
