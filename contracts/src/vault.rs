//! # Custody Vault
//!
//! Swaps a base asset for ledger units and back.
//!
//! 1. **Deposit**: the caller hands over `value` of base asset and receives
//!    `value` ledger units at the current global rate.
//! 2. **Redeem**: the caller's ledger units are burned and the same amount
//!    of base asset is released. Accrued interest is paid out of reserves,
//!    which [`Vault::fund_rewards`] tops up.
//!
//! Both legs cross the ledger/asset boundary. The ledger side runs first
//! under a [`Savepoint`](rebase_protocol::ledger::Savepoint); if the asset
//! side fails, the ledger is rolled back and the caller sees the failure
//! with nothing changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use rebase_protocol::ledger::{LedgerError, RebaseLedger};
use rebase_protocol::{Address, Amount, Rate, Timestamp, MAX_AMOUNT};

use crate::base_asset::{AssetError, BaseAsset};
use crate::error::FailureKind;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Redeem of zero units.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// The vault's own address tried to deposit or redeem. No base asset
    /// would move, so the ledger side would be unbacked.
    #[error("vault {0} cannot deposit into or redeem from itself")]
    SelfCustody(Address),

    /// The ledger refused the mint or burn.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The depositor's base asset could not be collected. The mint was
    /// rolled back.
    #[error("deposit of {amount} from {account} failed: {source}")]
    DepositFailed {
        /// Depositor.
        account: Address,
        /// Amount that was to be collected.
        amount: Amount,
        /// Underlying asset failure.
        source: AssetError,
    },

    /// The base asset could not be released. The burn was rolled back.
    #[error("redeem of {amount} to {account} failed: {source}")]
    RedeemFailed {
        /// Redeemer.
        account: Address,
        /// Amount that was to be released.
        amount: Amount,
        /// Underlying asset failure.
        source: AssetError,
    },

    /// A reward top-up could not be collected.
    #[error("reward funding failed: {0}")]
    Funding(AssetError),
}

impl VaultError {
    /// Classifies the error.
    pub fn kind(&self) -> FailureKind {
        match self {
            VaultError::ZeroAmount | VaultError::SelfCustody(_) => FailureKind::Invariant,
            VaultError::Ledger(e) => e.kind().into(),
            VaultError::DepositFailed { .. }
            | VaultError::RedeemFailed { .. }
            | VaultError::Funding(_) => FailureKind::ExternalTransfer,
        }
    }
}

// ---------------------------------------------------------------------------
// Receipts
// ---------------------------------------------------------------------------

/// What a [`VaultReceipt`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptKind {
    Deposit,
    Redeem,
    RewardFunding,
}

/// Outcome of a successful vault operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultReceipt {
    /// Unique receipt identifier.
    pub id: Uuid,
    /// Operation performed.
    pub kind: ReceiptKind,
    /// Depositor, redeemer or funder.
    pub account: Address,
    /// Units minted, burned or funded. For a max redeem this is the resolved
    /// amount.
    pub amount: Amount,
    /// Rate installed by a deposit; the holder's rate for a redeem; zero for
    /// reward funding.
    pub rate: Rate,
    /// Ledger time of the operation.
    pub at: DateTime<Utc>,
}

impl VaultReceipt {
    fn new(kind: ReceiptKind, account: Address, amount: Amount, rate: Rate, at: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            account,
            amount,
            rate,
            at: DateTime::<Utc>::from_timestamp(at as i64, 0).unwrap_or_default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Custody adapter over a [`BaseAsset`].
///
/// The vault address must hold `MintBurn` on the ledger it is used with.
#[derive(Debug, Clone)]
pub struct Vault<A: BaseAsset> {
    address: Address,
    asset: A,
}

impl<A: BaseAsset> Vault<A> {
    /// Creates a vault that custodies `asset` under `address`.
    pub fn new(address: Address, asset: A) -> Self {
        Self { address, asset }
    }

    /// The vault's identity on the ledger and in the asset book.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Base asset held by the vault.
    pub fn reserves(&self) -> Amount {
        self.asset.balance_of(&self.address)
    }

    /// Read access to the asset book.
    pub fn asset(&self) -> &A {
        &self.asset
    }

    /// Write access to the asset book (genesis funding, tests).
    pub fn asset_mut(&mut self) -> &mut A {
        &mut self.asset
    }

    /// Collects `value` of base asset from `caller` and mints the same
    /// number of ledger units at the current global rate. A zero deposit is
    /// accepted; it realizes the caller and installs the global rate.
    pub fn deposit(
        &mut self,
        ledger: &mut RebaseLedger,
        caller: &Address,
        value: Amount,
    ) -> Result<VaultReceipt, VaultError> {
        self.reject_self(caller)?;
        let rate = ledger.global_rate();
        let savepoint = ledger.savepoint(&[*caller]);
        ledger.mint(&self.address, caller, value, rate)?;

        if let Err(source) = self.asset.transfer(caller, &self.address, value) {
            ledger.rollback(&self.address, savepoint)?;
            warn!(account = %caller, amount = %value, error = %source, "deposit rolled back");
            return Err(VaultError::DepositFailed {
                account: *caller,
                amount: value,
                source,
            });
        }

        info!(account = %caller, amount = %value, rate = %rate, "deposit");
        Ok(VaultReceipt::new(
            ReceiptKind::Deposit,
            *caller,
            value,
            rate,
            ledger.now(),
        ))
    }

    /// Burns `amount` of the caller's units and releases the same amount of
    /// base asset. [`MAX_AMOUNT`] redeems the full effective balance.
    ///
    /// # Errors
    ///
    /// [`VaultError::ZeroAmount`] for a zero request,
    /// [`VaultError::SelfCustody`] when the vault names itself,
    /// [`VaultError::Ledger`] if the burn is refused,
    /// [`VaultError::RedeemFailed`] if the release fails (in which case the
    /// burn is undone).
    pub fn redeem(
        &mut self,
        ledger: &mut RebaseLedger,
        caller: &Address,
        amount: Amount,
    ) -> Result<VaultReceipt, VaultError> {
        if amount == 0 {
            return Err(VaultError::ZeroAmount);
        }
        self.reject_self(caller)?;
        let amount = if amount == MAX_AMOUNT {
            ledger.balance_of(caller)?
        } else {
            amount
        };
        let rate = ledger.user_rate(caller);

        let savepoint = ledger.savepoint(&[*caller]);
        ledger.burn(&self.address, caller, amount)?;

        if let Err(source) = self.asset.transfer(&self.address, caller, amount) {
            ledger.rollback(&self.address, savepoint)?;
            warn!(account = %caller, amount = %amount, error = %source, "redeem rolled back");
            return Err(VaultError::RedeemFailed {
                account: *caller,
                amount,
                source,
            });
        }

        info!(account = %caller, amount = %amount, "redeem");
        Ok(VaultReceipt::new(
            ReceiptKind::Redeem,
            *caller,
            amount,
            rate,
            ledger.now(),
        ))
    }

    fn reject_self(&self, caller: &Address) -> Result<(), VaultError> {
        if *caller == self.address {
            warn!(vault = %self.address, "vault named itself as depositor or redeemer");
            return Err(VaultError::SelfCustody(self.address));
        }
        Ok(())
    }

    /// Moves base asset from `funder` into reserves without minting. This
    /// is how the interest the ledger promises gets paid for.
    pub fn fund_rewards(
        &mut self,
        funder: &Address,
        amount: Amount,
        now: Timestamp,
    ) -> Result<VaultReceipt, VaultError> {
        self.asset
            .transfer(funder, &self.address, amount)
            .map_err(VaultError::Funding)?;
        info!(funder = %funder, amount = %amount, reserves = %self.reserves(), "rewards funded");
        Ok(VaultReceipt::new(
            ReceiptKind::RewardFunding,
            *funder,
            amount,
            0,
            now,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rebase_protocol::config::LedgerConfig;
    use rebase_protocol::ManualClock;

    use super::*;
    use crate::base_asset::AssetBook;

    fn setup() -> (RebaseLedger, Vault<AssetBook>, ManualClock) {
        let clock = ManualClock::new(0);
        let owner = Address::from_tag(1);
        let vault = Vault::new(Address::from_tag(0x77), AssetBook::new());
        let mut ledger =
            RebaseLedger::new(LedgerConfig::default(), owner, Arc::new(clock.clone())).unwrap();
        ledger.grant_mint_burn(&owner, &vault.address()).unwrap();
        (ledger, vault, clock)
    }

    #[test]
    fn deposit_without_funds_is_rolled_back() {
        let (mut ledger, mut vault, _) = setup();
        let user = Address::from_tag(10);
        let err = vault.deposit(&mut ledger, &user, 100).unwrap_err();
        assert!(matches!(err, VaultError::DepositFailed { amount: 100, .. }));
        assert_eq!(err.kind(), FailureKind::ExternalTransfer);
        assert_eq!(ledger.balance_of(&user).unwrap(), 0);
        assert_eq!(ledger.total_supply(), 0);
        assert!(ledger.take_events().iter().all(|e| !matches!(
            e,
            rebase_protocol::LedgerEvent::HolderRateSet { .. }
        )));
    }

    #[test]
    fn zero_redeem_rejected() {
        let (mut ledger, mut vault, _) = setup();
        let err = vault
            .redeem(&mut ledger, &Address::from_tag(10), 0)
            .unwrap_err();
        assert!(matches!(err, VaultError::ZeroAmount));
        assert_eq!(err.kind(), FailureKind::Invariant);
    }

    #[test]
    fn zero_deposit_installs_global_rate() {
        let (mut ledger, mut vault, _) = setup();
        let user = Address::from_tag(10);
        let receipt = vault.deposit(&mut ledger, &user, 0).unwrap();
        assert_eq!(receipt.amount, 0);
        assert_eq!(ledger.user_rate(&user), ledger.global_rate());
    }

    #[test]
    fn receipt_timestamp_follows_ledger_clock() {
        let (mut ledger, mut vault, clock) = setup();
        let user = Address::from_tag(10);
        vault.asset_mut().credit(&user, 10).unwrap();
        clock.set(1_700_000_000);
        let receipt = vault.deposit(&mut ledger, &user, 10).unwrap();
        assert_eq!(receipt.at.timestamp(), 1_700_000_000);
        assert_eq!(receipt.kind, ReceiptKind::Deposit);
    }
}
