//! Error types for ledger operations.
//!
//! Every failing ledger call returns a [`LedgerError`] and leaves the ledger
//! exactly as it found it. Variants carry the numbers involved so a caller
//! can decide between retrying with a smaller amount and giving up.

use thiserror::Error;

use crate::access::AccessError;
use crate::math::MathError;
use crate::types::{Address, Amount, Rate};

/// Broad classification of a failure, for callers that map errors onto
/// transport-level codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Caller lacks a capability.
    Authorization,
    /// The operation would break a ledger invariant (rate increase,
    /// overdraft, zero holder, missing allowance).
    Invariant,
    /// Fixed-point or integer overflow.
    Arithmetic,
}

/// Errors that can occur during ledger operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LedgerError {
    /// Permission check failed.
    #[error(transparent)]
    Access(#[from] AccessError),

    /// Attempted to set a global rate that is not strictly lower.
    #[error("global rate can only decrease: current {current}, proposed {proposed}")]
    RateCanOnlyDecrease {
        /// Global rate in force.
        current: Rate,
        /// Rejected new value.
        proposed: Rate,
    },

    /// Burn or transfer exceeds the holder's realized principal.
    #[error("insufficient balance for {holder}: available {available}, requested {requested}")]
    InsufficientBalance {
        /// Holder being debited.
        holder: Address,
        /// Realized principal at the time of the call.
        available: Amount,
        /// Amount requested.
        requested: Amount,
    },

    /// `transfer_from` exceeds the spender's allowance.
    #[error("insufficient allowance for {spender} over {owner}: allowed {allowed}, requested {requested}")]
    InsufficientAllowance {
        /// Account whose units would move.
        owner: Address,
        /// Account attempting the move.
        spender: Address,
        /// Remaining allowance.
        allowed: Amount,
        /// Amount requested.
        requested: Amount,
    },

    /// The zero address cannot hold, send, receive or approve.
    #[error("zero address is not a valid holder")]
    ZeroAddress,

    /// Overflow in accrual or balance arithmetic.
    #[error(transparent)]
    Math(#[from] MathError),
}

impl LedgerError {
    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Access(_) => ErrorKind::Authorization,
            LedgerError::Math(_) => ErrorKind::Arithmetic,
            LedgerError::RateCanOnlyDecrease { .. }
            | LedgerError::InsufficientBalance { .. }
            | LedgerError::InsufficientAllowance { .. }
            | LedgerError::ZeroAddress => ErrorKind::Invariant,
        }
    }

    pub(crate) fn overflow(operation: &'static str) -> Self {
        LedgerError::Math(MathError::Overflow { operation })
    }
}
