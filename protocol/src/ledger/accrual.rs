//! # The Accrual Ledger
//!
//! [`RebaseLedger`] owns every holder record and the global rate. Balances
//! grow linearly inside a realization window and compound across windows:
//! each mutating call first *realizes* every holder it touches, folding
//! accrued interest into principal and resetting that holder's clock.
//!
//! All mutators follow the same shape:
//!
//! 1. permission check (no effect on failure);
//! 2. compute realized records and the new values into locals, with every
//!    arithmetic step checked;
//! 3. commit records, supply and events in one go.
//!
//! Step 2 is where every error can happen, so a failed call leaves nothing
//! behind.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::{AccessControl, Capability};
use crate::clock::SharedClock;
use crate::config::{ConfigError, LedgerConfig};
use crate::types::{Address, Amount, Rate, Timestamp, MAX_AMOUNT};

use super::error::LedgerError;
use super::events::LedgerEvent;
use super::record::HolderRecord;

// ---------------------------------------------------------------------------
// LedgerState
// ---------------------------------------------------------------------------

/// The persistent part of a ledger: everything except the clock and the
/// undrained event log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerState {
    /// Token metadata and genesis parameters.
    pub config: LedgerConfig,
    /// Rate installed for future mints.
    pub global_rate: Rate,
    /// Sum of realized principal across all holders.
    pub total_principal: Amount,
    /// Permission table.
    pub access: AccessControl,
    /// Holder records. Untouched holders are absent.
    pub records: HashMap<Address, HolderRecord>,
    /// `owner -> spender -> remaining allowance`.
    pub allowances: HashMap<Address, HashMap<Address, Amount>>,
}

impl LedgerState {
    /// A fresh ledger with `owner` as admin and no holders.
    pub fn genesis(config: LedgerConfig, owner: Address) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            global_rate: config.initial_global_rate,
            config,
            total_principal: 0,
            access: AccessControl::new(owner),
            records: HashMap::new(),
            allowances: HashMap::new(),
        })
    }
}

// ---------------------------------------------------------------------------
// Savepoint
// ---------------------------------------------------------------------------

/// Pre-image of a set of holder records, for compensating rollback.
///
/// A savepoint is only sound if it lists every holder the operations between
/// [`RebaseLedger::savepoint`] and [`RebaseLedger::rollback`] touch.
#[derive(Debug, Clone)]
pub struct Savepoint {
    records: Vec<(Address, Option<HolderRecord>)>,
    total_principal: Amount,
    events_len: usize,
}

// ---------------------------------------------------------------------------
// RebaseLedger
// ---------------------------------------------------------------------------

/// Interest-accruing ledger.
///
/// Single-writer: every mutator takes `&mut self` and runs to completion.
/// Callers that share a ledger across threads wrap it in a lock.
#[derive(Debug, Clone)]
pub struct RebaseLedger {
    state: LedgerState,
    clock: SharedClock,
    events: Vec<LedgerEvent>,
}

/// A holder record after realization, plus how much interest was folded in.
#[derive(Debug, Clone, Copy)]
struct Realized {
    record: HolderRecord,
    increase: Amount,
}

impl RebaseLedger {
    /// Creates a ledger at genesis.
    pub fn new(
        config: LedgerConfig,
        owner: Address,
        clock: SharedClock,
    ) -> Result<Self, ConfigError> {
        let state = LedgerState::genesis(config, owner)?;
        info!(
            owner = %owner,
            global_rate = %state.global_rate,
            symbol = %state.config.symbol,
            "ledger created"
        );
        Ok(Self::from_state(state, clock))
    }

    /// Resumes a ledger from persisted state.
    pub fn from_state(state: LedgerState, clock: SharedClock) -> Self {
        Self {
            state,
            clock,
            events: Vec::new(),
        }
    }

    /// Persistent state, for snapshots.
    pub fn state(&self) -> &LedgerState {
        &self.state
    }

    /// Current time according to the ledger's clock.
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    // -- Metadata -----------------------------------------------------------

    /// Token name.
    pub fn name(&self) -> &str {
        &self.state.config.name
    }

    /// Token symbol.
    pub fn symbol(&self) -> &str {
        &self.state.config.symbol
    }

    /// Display decimals.
    pub fn decimals(&self) -> u8 {
        self.state.config.decimals
    }

    // -- Reads --------------------------------------------------------------

    /// Effective balance: principal plus interest accrued since the last
    /// realization. Pure read.
    pub fn balance_of(&self, holder: &Address) -> Result<Amount, LedgerError> {
        Ok(self.record(holder).effective_balance(self.now())?)
    }

    /// Stored principal with no accrual applied.
    pub fn principal_balance_of(&self, holder: &Address) -> Amount {
        self.record(holder).principal
    }

    /// The holder's frozen rate (zero for never-activated holders).
    pub fn user_rate(&self, holder: &Address) -> Rate {
        self.record(holder).rate
    }

    /// Timestamp of the holder's last realization.
    pub fn last_sync_time(&self, holder: &Address) -> Timestamp {
        self.record(holder).last_sync
    }

    /// Full record (default for untouched holders).
    pub fn holder_record(&self, holder: &Address) -> HolderRecord {
        self.record(holder)
    }

    /// Rate that the next mint at the global rate would install.
    pub fn global_rate(&self) -> Rate {
        self.state.global_rate
    }

    /// Sum of realized principal. Interest not yet realized is not counted.
    pub fn total_supply(&self) -> Amount {
        self.state.total_principal
    }

    /// Number of holders with realized units. Drained records are kept but
    /// not counted.
    pub fn holder_count(&self) -> usize {
        self.state.records.values().filter(|r| r.is_active()).count()
    }

    /// Identities allowed to mint and burn, sorted.
    pub fn minters(&self) -> Vec<Address> {
        self.state.access.holders_of(Capability::MintBurn)
    }

    /// Interest `holder` has accrued since its last realization.
    pub fn pending_interest(&self, holder: &Address) -> Result<Amount, LedgerError> {
        Ok(self.record(holder).pending_interest(self.now())?)
    }

    /// Remaining allowance of `spender` over `owner`.
    pub fn allowance(&self, owner: &Address, spender: &Address) -> Amount {
        self.state
            .allowances
            .get(owner)
            .and_then(|m| m.get(spender))
            .copied()
            .unwrap_or(0)
    }

    /// Current owner (admin).
    pub fn owner(&self) -> Address {
        self.state.access.owner()
    }

    /// Returns `true` if `who` holds `capability`.
    pub fn has_capability(&self, who: &Address, capability: Capability) -> bool {
        self.state.access.has(who, capability)
    }

    // -- Mint / burn --------------------------------------------------------

    /// Mints `amount` to `holder` and installs `rate` as the holder's frozen
    /// rate. Accrued interest is realized at the holder's previous rate
    /// first. A zero amount still realizes and resets the clock.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Access`] without `MintBurn`, [`LedgerError::ZeroAddress`],
    /// [`LedgerError::Math`] on overflow.
    pub fn mint(
        &mut self,
        caller: &Address,
        holder: &Address,
        amount: Amount,
        rate: Rate,
    ) -> Result<(), LedgerError> {
        self.require(caller, Capability::MintBurn)?;
        if holder.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let now = self.now();
        let Realized { mut record, increase } = self.realized(holder, now)?;
        record.rate = rate;
        record.principal = record
            .principal
            .checked_add(amount)
            .ok_or(LedgerError::overflow("mint principal"))?;
        let total = self
            .state
            .total_principal
            .checked_add(increase)
            .and_then(|t| t.checked_add(amount))
            .ok_or(LedgerError::overflow("total supply"))?;

        self.commit(holder, record, increase);
        self.state.total_principal = total;
        self.events.push(LedgerEvent::HolderRateSet {
            holder: *holder,
            rate,
        });
        self.events.push(LedgerEvent::Transfer {
            from: None,
            to: Some(*holder),
            amount,
        });

        debug!(holder = %holder, amount = %amount, rate = %rate, "minted");
        Ok(())
    }

    /// Burns `amount` of `holder`'s realized principal.
    ///
    /// [`MAX_AMOUNT`] is not special here; adapters resolve it through
    /// [`balance_of`](Self::balance_of) before calling.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Access`] without `MintBurn`,
    /// [`LedgerError::InsufficientBalance`] if `amount` exceeds the realized
    /// principal.
    pub fn burn(
        &mut self,
        caller: &Address,
        holder: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        self.require(caller, Capability::MintBurn)?;
        if holder.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let now = self.now();
        let Realized { mut record, increase } = self.realized(holder, now)?;
        if record.principal < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: *holder,
                available: record.principal,
                requested: amount,
            });
        }
        record.principal -= amount;
        let total = self
            .state
            .total_principal
            .checked_add(increase)
            .and_then(|t| t.checked_sub(amount))
            .ok_or(LedgerError::overflow("total supply"))?;

        self.commit(holder, record, increase);
        self.state.total_principal = total;
        self.events.push(LedgerEvent::Transfer {
            from: Some(*holder),
            to: None,
            amount,
        });

        debug!(holder = %holder, amount = %amount, "burned");
        Ok(())
    }

    // -- Transfers ----------------------------------------------------------

    /// Moves `amount` from `caller` to `to`. [`MAX_AMOUNT`] moves the
    /// caller's full effective balance. A recipient with zero effective
    /// balance inherits the sender's rate; otherwise its rate is kept.
    pub fn transfer(
        &mut self,
        caller: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        self.move_units(caller, to, amount, None)
    }

    /// Like [`transfer`](Self::transfer) but moves `from`'s units on behalf
    /// of `spender`, consuming allowance. An allowance of [`MAX_AMOUNT`] is
    /// unlimited and never decremented.
    pub fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        self.move_units(from, to, amount, Some(spender))
    }

    /// Sets `spender`'s allowance over `owner` to `amount`.
    pub fn approve(
        &mut self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<(), LedgerError> {
        if owner.is_zero() || spender.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }
        self.state
            .allowances
            .entry(*owner)
            .or_default()
            .insert(*spender, amount);
        self.events.push(LedgerEvent::Approval {
            owner: *owner,
            spender: *spender,
            amount,
        });
        Ok(())
    }

    fn move_units(
        &mut self,
        from: &Address,
        to: &Address,
        amount: Amount,
        spender: Option<&Address>,
    ) -> Result<Amount, LedgerError> {
        if from.is_zero() || to.is_zero() {
            return Err(LedgerError::ZeroAddress);
        }

        let now = self.now();
        let sender = self.realized(from, now)?;
        let receiver = if from == to {
            sender
        } else {
            self.realized(to, now)?
        };

        // After realization the effective balance is exactly the principal.
        let amount = if amount == MAX_AMOUNT {
            sender.record.principal
        } else {
            amount
        };

        let new_allowance = match spender {
            Some(spender) => Some((*spender, self.consume_allowance(from, spender, amount)?)),
            None => None,
        };

        if sender.record.principal < amount {
            return Err(LedgerError::InsufficientBalance {
                holder: *from,
                available: sender.record.principal,
                requested: amount,
            });
        }

        let mut total = self
            .state
            .total_principal
            .checked_add(sender.increase)
            .ok_or(LedgerError::overflow("total supply"))?;

        let mut inherited = None;
        if from == to {
            self.commit(from, sender.record, sender.increase);
        } else {
            total = total
                .checked_add(receiver.increase)
                .ok_or(LedgerError::overflow("total supply"))?;

            let mut from_record = sender.record;
            let mut to_record = receiver.record;
            if to_record.principal == 0 {
                to_record.rate = from_record.rate;
                inherited = Some(from_record.rate);
            }
            from_record.principal -= amount;
            to_record.principal = to_record
                .principal
                .checked_add(amount)
                .ok_or(LedgerError::overflow("transfer principal"))?;

            self.commit(from, from_record, sender.increase);
            self.commit(to, to_record, receiver.increase);
        }

        if let Some((spender, remaining)) = new_allowance {
            self.state
                .allowances
                .entry(*from)
                .or_default()
                .insert(spender, remaining);
        }
        self.state.total_principal = total;
        if let Some(rate) = inherited {
            self.events.push(LedgerEvent::HolderRateSet { holder: *to, rate });
        }
        self.events.push(LedgerEvent::Transfer {
            from: Some(*from),
            to: Some(*to),
            amount,
        });

        debug!(from = %from, to = %to, amount = %amount, "transferred");
        Ok(amount)
    }

    fn consume_allowance(
        &self,
        owner: &Address,
        spender: &Address,
        amount: Amount,
    ) -> Result<Amount, LedgerError> {
        let allowed = self.allowance(owner, spender);
        if allowed == MAX_AMOUNT {
            return Ok(MAX_AMOUNT);
        }
        allowed
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientAllowance {
                owner: *owner,
                spender: *spender,
                allowed,
                requested: amount,
            })
    }

    // -- Administration -----------------------------------------------------

    /// Lowers the global rate. Existing holders keep their frozen rates.
    ///
    /// # Errors
    ///
    /// [`LedgerError::RateCanOnlyDecrease`] if `new_rate >= global_rate()`.
    pub fn set_global_rate(&mut self, caller: &Address, new_rate: Rate) -> Result<(), LedgerError> {
        self.require(caller, Capability::Admin)?;
        let current = self.state.global_rate;
        if new_rate >= current {
            return Err(LedgerError::RateCanOnlyDecrease {
                current,
                proposed: new_rate,
            });
        }
        self.state.global_rate = new_rate;
        self.events.push(LedgerEvent::GlobalRateUpdated {
            previous: current,
            new: new_rate,
        });
        info!(previous = %current, new = %new_rate, "global rate lowered");
        Ok(())
    }

    /// Grants `MintBurn` to `account`.
    pub fn grant_mint_burn(&mut self, caller: &Address, account: &Address) -> Result<(), LedgerError> {
        let granted = self
            .state
            .access
            .grant(caller, *account, Capability::MintBurn)
            .map_err(|e| {
                warn!(caller = %caller, error = %e, "grant rejected");
                e
            })?;
        if granted {
            self.events.push(LedgerEvent::CapabilityGranted {
                account: *account,
                capability: Capability::MintBurn,
            });
            info!(account = %account, "mint/burn capability granted");
        }
        Ok(())
    }

    /// Revokes `MintBurn` from `account`.
    pub fn revoke_mint_burn(&mut self, caller: &Address, account: &Address) -> Result<(), LedgerError> {
        if self
            .state
            .access
            .revoke(caller, account, Capability::MintBurn)?
        {
            self.events.push(LedgerEvent::CapabilityRevoked {
                account: *account,
                capability: Capability::MintBurn,
            });
            info!(account = %account, "mint/burn capability revoked");
        }
        Ok(())
    }

    /// Hands the admin capability to `new_owner`.
    pub fn transfer_ownership(&mut self, caller: &Address, new_owner: &Address) -> Result<(), LedgerError> {
        let previous = self.state.access.transfer_ownership(caller, *new_owner)?;
        self.events.push(LedgerEvent::OwnershipTransferred {
            previous,
            new: *new_owner,
        });
        info!(previous = %previous, new = %new_owner, "ownership transferred");
        Ok(())
    }

    // -- Savepoints ---------------------------------------------------------

    /// Captures the records of `holders`, the total supply and the event-log
    /// length.
    pub fn savepoint(&self, holders: &[Address]) -> Savepoint {
        Savepoint {
            records: holders
                .iter()
                .map(|h| (*h, self.state.records.get(h).copied()))
                .collect(),
            total_principal: self.state.total_principal,
            events_len: self.events.len(),
        }
    }

    /// Restores a [`Savepoint`]. Requires `MintBurn`: only the adapters that
    /// can mint and burn may undo a mint or burn.
    pub fn rollback(&mut self, caller: &Address, savepoint: Savepoint) -> Result<(), LedgerError> {
        self.require(caller, Capability::MintBurn)?;
        for (holder, record) in savepoint.records {
            match record {
                Some(record) => {
                    self.state.records.insert(holder, record);
                }
                None => {
                    self.state.records.remove(&holder);
                }
            }
        }
        self.state.total_principal = savepoint.total_principal;
        self.events.truncate(savepoint.events_len);
        warn!(caller = %caller, "ledger rolled back to savepoint");
        Ok(())
    }

    // -- Events -------------------------------------------------------------

    /// Drains the event log.
    pub fn take_events(&mut self) -> Vec<LedgerEvent> {
        std::mem::take(&mut self.events)
    }

    // -- Internals ----------------------------------------------------------

    fn record(&self, holder: &Address) -> HolderRecord {
        self.state.records.get(holder).copied().unwrap_or_default()
    }

    fn require(&self, caller: &Address, capability: Capability) -> Result<(), LedgerError> {
        self.state.access.require(caller, capability).map_err(|e| {
            warn!(caller = %caller, required = %capability, "unauthorized ledger call");
            LedgerError::from(e)
        })
    }

    /// The holder's record with accrued interest folded in and the sync
    /// point moved to `now`. A clock reading earlier than `last_sync` leaves
    /// the sync point where it is, so no window is counted twice. Nothing is
    /// written.
    fn realized(&self, holder: &Address, now: Timestamp) -> Result<Realized, LedgerError> {
        let mut record = self.record(holder);
        let effective = record.effective_balance(now)?;
        let increase = effective - record.principal;
        record.principal = effective;
        record.last_sync = record.last_sync.max(now);
        Ok(Realized { record, increase })
    }

    /// Writes a realized record and logs the interest that was folded in.
    /// Supply is updated by the caller, which has already checked it.
    fn commit(&mut self, holder: &Address, record: HolderRecord, increase: Amount) {
        self.state.records.insert(*holder, record);
        if increase > 0 {
            self.events.push(LedgerEvent::Transfer {
                from: None,
                to: Some(*holder),
                amount: increase,
            });
            debug!(holder = %holder, increase = %increase, "realized accrued interest");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::math::SCALE;

    const RATE: Rate = 50_000_000_000;

    fn owner() -> Address {
        Address::from_tag(1)
    }
    fn minter() -> Address {
        Address::from_tag(2)
    }
    fn alice() -> Address {
        Address::from_tag(10)
    }
    fn bob() -> Address {
        Address::from_tag(11)
    }

    fn setup() -> (RebaseLedger, ManualClock) {
        let clock = ManualClock::new(1_000);
        let mut ledger =
            RebaseLedger::new(LedgerConfig::default(), owner(), Arc::new(clock.clone())).unwrap();
        ledger.grant_mint_burn(&owner(), &minter()).unwrap();
        (ledger, clock)
    }

    #[test]
    fn mint_sets_principal_rate_and_clock() {
        let (mut ledger, _) = setup();
        ledger.mint(&minter(), &alice(), 500, RATE).unwrap();
        let r = ledger.holder_record(&alice());
        assert_eq!(r.principal, 500);
        assert_eq!(r.rate, RATE);
        assert_eq!(r.last_sync, 1_000);
        assert_eq!(ledger.total_supply(), 500);
    }

    #[test]
    fn zero_mint_realizes_and_resets_clock() {
        let (mut ledger, clock) = setup();
        ledger.mint(&minter(), &alice(), 100 * SCALE, RATE).unwrap();
        clock.advance(100);
        let before = ledger.balance_of(&alice()).unwrap();
        ledger.mint(&minter(), &alice(), 0, RATE).unwrap();
        assert_eq!(ledger.principal_balance_of(&alice()), before);
        assert_eq!(ledger.last_sync_time(&alice()), 1_100);
        assert_eq!(ledger.total_supply(), before);
    }

    #[test]
    fn mint_to_zero_address_rejected() {
        let (mut ledger, _) = setup();
        assert_eq!(
            ledger.mint(&minter(), &Address::ZERO, 1, RATE),
            Err(LedgerError::ZeroAddress)
        );
    }

    #[test]
    fn burn_realizes_first() {
        let (mut ledger, clock) = setup();
        ledger.mint(&minter(), &alice(), 100 * SCALE, RATE).unwrap();
        clock.advance(3_600);
        let effective = ledger.balance_of(&alice()).unwrap();
        assert!(effective > 100 * SCALE);
        // Burning more than the old principal works because interest is realized first.
        ledger.burn(&minter(), &alice(), 100 * SCALE + 1).unwrap();
        assert_eq!(ledger.principal_balance_of(&alice()), effective - 100 * SCALE - 1);
    }

    #[test]
    fn burn_overdraft_leaves_state_untouched() {
        let (mut ledger, clock) = setup();
        ledger.mint(&minter(), &alice(), 100, RATE).unwrap();
        clock.advance(10);
        let before = ledger.holder_record(&alice());
        let err = ledger.burn(&minter(), &alice(), 1_000).unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientBalance { requested: 1_000, .. }
        ));
        assert_eq!(ledger.holder_record(&alice()), before);
    }

    #[test]
    fn realization_compounds_across_touches() {
        let (mut ledger, clock) = setup();
        let rate = SCALE / 100; // 1% per second
        ledger.mint(&minter(), &alice(), 1_000 * SCALE, rate).unwrap();
        ledger.mint(&minter(), &bob(), 1_000 * SCALE, rate).unwrap();

        // Alice is touched every second, Bob never.
        for _ in 0..10 {
            clock.advance(1);
            ledger.mint(&minter(), &alice(), 0, rate).unwrap();
        }
        let compounded = ledger.balance_of(&alice()).unwrap();
        let linear = ledger.balance_of(&bob()).unwrap();
        assert_eq!(linear, 1_100 * SCALE);
        assert!(compounded > linear);
    }

    #[test]
    fn transfer_max_moves_everything() {
        let (mut ledger, clock) = setup();
        ledger.mint(&minter(), &alice(), 10 * SCALE, RATE).unwrap();
        clock.advance(500);
        let expected = ledger.balance_of(&alice()).unwrap();
        let moved = ledger.transfer(&alice(), &bob(), MAX_AMOUNT).unwrap();
        assert_eq!(moved, expected);
        assert_eq!(ledger.balance_of(&alice()).unwrap(), 0);
        assert_eq!(ledger.balance_of(&bob()).unwrap(), expected);
    }

    #[test]
    fn self_transfer_only_realizes() {
        let (mut ledger, clock) = setup();
        ledger.mint(&minter(), &alice(), 10 * SCALE, RATE).unwrap();
        clock.advance(100);
        let effective = ledger.balance_of(&alice()).unwrap();
        ledger.transfer(&alice(), &alice(), 5 * SCALE).unwrap();
        assert_eq!(ledger.principal_balance_of(&alice()), effective);
        assert_eq!(ledger.user_rate(&alice()), RATE);
    }

    #[test]
    fn transfer_from_consumes_allowance() {
        let (mut ledger, _) = setup();
        let spender = Address::from_tag(12);
        ledger.mint(&minter(), &alice(), 1_000, RATE).unwrap();
        ledger.approve(&alice(), &spender, 600).unwrap();

        ledger.transfer_from(&spender, &alice(), &bob(), 400).unwrap();
        assert_eq!(ledger.allowance(&alice(), &spender), 200);

        let err = ledger
            .transfer_from(&spender, &alice(), &bob(), 300)
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::InsufficientAllowance { allowed: 200, requested: 300, .. }
        ));
        assert_eq!(ledger.principal_balance_of(&bob()), 400);
    }

    #[test]
    fn unlimited_allowance_is_not_decremented() {
        let (mut ledger, _) = setup();
        let spender = Address::from_tag(12);
        ledger.mint(&minter(), &alice(), 1_000, RATE).unwrap();
        ledger.approve(&alice(), &spender, MAX_AMOUNT).unwrap();
        ledger.transfer_from(&spender, &alice(), &bob(), 999).unwrap();
        assert_eq!(ledger.allowance(&alice(), &spender), MAX_AMOUNT);
    }

    #[test]
    fn global_rate_event_recorded_after_update() {
        let (mut ledger, _) = setup();
        ledger.take_events();
        ledger.set_global_rate(&owner(), RATE / 2).unwrap();
        assert_eq!(ledger.global_rate(), RATE / 2);
        assert_eq!(
            ledger.take_events(),
            vec![LedgerEvent::GlobalRateUpdated {
                previous: RATE,
                new: RATE / 2
            }]
        );
    }

    #[test]
    fn savepoint_rollback_restores_records_and_events() {
        let (mut ledger, clock) = setup();
        ledger.mint(&minter(), &alice(), 1_000, RATE).unwrap();
        ledger.take_events();
        clock.advance(50);

        let before_alice = ledger.holder_record(&alice());
        let sp = ledger.savepoint(&[alice(), bob()]);
        ledger.transfer(&alice(), &bob(), 500).unwrap();
        ledger.burn(&minter(), &alice(), 100).unwrap();
        ledger.rollback(&minter(), sp).unwrap();

        assert_eq!(ledger.holder_record(&alice()), before_alice);
        assert_eq!(ledger.holder_record(&bob()), HolderRecord::default());
        assert_eq!(ledger.total_supply(), 1_000);
        assert!(ledger.take_events().is_empty());
    }

    #[test]
    fn rollback_requires_mint_burn() {
        let (mut ledger, _) = setup();
        let sp = ledger.savepoint(&[alice()]);
        assert!(matches!(
            ledger.rollback(&alice(), sp),
            Err(LedgerError::Access(_))
        ));
    }

    #[test]
    fn revoked_minter_cannot_mint() {
        let (mut ledger, _) = setup();
        ledger.revoke_mint_burn(&owner(), &minter()).unwrap();
        assert!(ledger.mint(&minter(), &alice(), 1, RATE).is_err());
    }

    #[test]
    fn ownership_transfer_moves_rate_control() {
        let (mut ledger, _) = setup();
        let next = Address::from_tag(99);
        ledger.transfer_ownership(&owner(), &next).unwrap();
        assert!(ledger.set_global_rate(&owner(), 1).is_err());
        ledger.set_global_rate(&next, 1).unwrap();
        assert_eq!(ledger.owner(), next);
    }

    #[test]
    fn error_kinds_classify() {
        let (mut ledger, _) = setup();
        let auth = ledger.mint(&alice(), &alice(), 1, RATE).unwrap_err();
        assert_eq!(auth.kind(), crate::ledger::ErrorKind::Authorization);
        let inv = ledger.set_global_rate(&owner(), RATE).unwrap_err();
        assert_eq!(inv.kind(), crate::ledger::ErrorKind::Invariant);
    }
}
