//! # Storage Module
//!
//! sled persistence for ledger snapshots. The ledger itself is an in-memory
//! state machine; a node saves its [`LedgerState`](crate::ledger::LedgerState)
//! after every mutating request and loads it back on start.
//!
//! bincode is the on-disk format. JSON is for the API.

pub mod db;

pub use db::{DbError, DbResult, LedgerDb};
