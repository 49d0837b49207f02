//! # Base Asset
//!
//! The fungible asset the vault takes in and pays out. The vault only needs
//! two things from it: a balance query and a transfer that can fail. On a
//! real chain that is the native currency; here it is [`AssetBook`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use rebase_protocol::{Address, Amount};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors from base-asset movements.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AssetError {
    /// The sender does not hold enough of the asset.
    #[error("insufficient funds in {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Account being debited.
        account: Address,
        /// Its balance.
        available: Amount,
        /// Amount requested.
        requested: Amount,
    },

    /// The recipient refused the transfer.
    #[error("{0} rejected the transfer")]
    Rejected(Address),

    /// Crediting would overflow the recipient's balance.
    #[error("asset balance overflow")]
    Overflow,
}

// ---------------------------------------------------------------------------
// BaseAsset
// ---------------------------------------------------------------------------

/// A fungible asset the vault can hold and move.
pub trait BaseAsset: Send + Sync + fmt::Debug {
    /// Current holding of `who`.
    fn balance_of(&self, who: &Address) -> Amount;

    /// Moves `amount` from `from` to `to`. All-or-nothing.
    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), AssetError>;
}

// ---------------------------------------------------------------------------
// AssetBook
// ---------------------------------------------------------------------------

/// In-memory [`BaseAsset`]: per-address balances plus a set of addresses
/// that refuse inbound transfers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssetBook {
    balances: HashMap<Address, Amount>,
    rejecting: HashSet<Address>,
}

impl AssetBook {
    /// An empty book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates units out of thin air for `who`. Genesis funding and tests.
    pub fn credit(&mut self, who: &Address, amount: Amount) -> Result<(), AssetError> {
        let balance = self.balances.entry(*who).or_insert(0);
        *balance = balance.checked_add(amount).ok_or(AssetError::Overflow)?;
        Ok(())
    }

    /// Makes `who` refuse (or accept again) inbound transfers.
    pub fn set_rejecting(&mut self, who: &Address, rejecting: bool) {
        if rejecting {
            self.rejecting.insert(*who);
        } else {
            self.rejecting.remove(who);
        }
    }

    /// Returns `true` if `who` refuses inbound transfers.
    pub fn is_rejecting(&self, who: &Address) -> bool {
        self.rejecting.contains(who)
    }

    /// Sum of all balances.
    pub fn total(&self) -> Amount {
        self.balances
            .values()
            .fold(0u128, |acc, b| acc.saturating_add(*b))
    }
}

impl BaseAsset for AssetBook {
    fn balance_of(&self, who: &Address) -> Amount {
        self.balances.get(who).copied().unwrap_or(0)
    }

    fn transfer(&mut self, from: &Address, to: &Address, amount: Amount) -> Result<(), AssetError> {
        if self.rejecting.contains(to) {
            return Err(AssetError::Rejected(*to));
        }
        let available = self.balance_of(from);
        if available < amount {
            return Err(AssetError::InsufficientFunds {
                account: *from,
                available,
                requested: amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;

        self.balances.insert(*from, available - amount);
        self.balances.insert(*to, credited);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_moves_funds() {
        let (a, b) = (Address::from_tag(1), Address::from_tag(2));
        let mut book = AssetBook::new();
        book.credit(&a, 100).unwrap();
        book.transfer(&a, &b, 40).unwrap();
        assert_eq!(book.balance_of(&a), 60);
        assert_eq!(book.balance_of(&b), 40);
        assert_eq!(book.total(), 100);
    }

    #[test]
    fn rejecting_recipient_blocks_transfer() {
        let (a, b) = (Address::from_tag(1), Address::from_tag(2));
        let mut book = AssetBook::new();
        book.credit(&a, 100).unwrap();
        book.set_rejecting(&b, true);
        assert_eq!(book.transfer(&a, &b, 1), Err(AssetError::Rejected(b)));
        assert_eq!(book.balance_of(&a), 100);

        book.set_rejecting(&b, false);
        book.transfer(&a, &b, 1).unwrap();
    }

    #[test]
    fn overdraft_rejected() {
        let (a, b) = (Address::from_tag(1), Address::from_tag(2));
        let mut book = AssetBook::new();
        assert!(matches!(
            book.transfer(&a, &b, 1),
            Err(AssetError::InsufficientFunds { available: 0, .. })
        ));
    }

    #[test]
    fn credit_overflow() {
        let a = Address::from_tag(1);
        let mut book = AssetBook::new();
        book.credit(&a, Amount::MAX).unwrap();
        assert_eq!(book.credit(&a, 1), Err(AssetError::Overflow));
    }
}
