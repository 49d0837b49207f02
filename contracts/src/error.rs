//! Failure classification shared by the adapters.

use rebase_protocol::ledger::ErrorKind;
use serde::{Deserialize, Serialize};

/// How an adapter failure should be reported to whoever called it.
///
/// Ledger kinds pass through unchanged. Adapters add the two kinds the
/// ledger never produces on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Caller lacks a capability or ownership.
    Authorization,
    /// The operation would break a ledger or adapter invariant.
    Invariant,
    /// Fixed-point or integer overflow.
    Arithmetic,
    /// A base-asset movement outside the ledger failed.
    ExternalTransfer,
    /// The request itself was malformed (zero amount, unknown chain, bad
    /// payload).
    BadInput,
}

impl From<ErrorKind> for FailureKind {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Authorization => FailureKind::Authorization,
            ErrorKind::Invariant => FailureKind::Invariant,
            ErrorKind::Arithmetic => FailureKind::Arithmetic,
        }
    }
}
