//! # Cross-Chain Token Pool
//!
//! Moves ledger units between two independent ledger instances without
//! losing the holder's frozen rate.
//!
//! ```text
//!   source ledger                                   destination ledger
//!   ─────────────                                   ──────────────────
//!   sender ──transfer──▶ pool
//!                        pool ──burn──▶ ∅
//!                        BridgeMessage{amount, rate} ──relay──▶ pool
//!                                                    pool ──mint(rate)──▶ receiver
//! ```
//!
//! Nothing accrues in transit, and the pool does no replay protection:
//! delivering the same message twice mints twice. Deduplication belongs to
//! the relay.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use rebase_protocol::access::{AccessError, Capability};
use rebase_protocol::bridge::{BridgeMessage, PayloadError};
use rebase_protocol::config::BRIDGE_PAYLOAD_VERSION;
use rebase_protocol::ledger::{LedgerError, RebaseLedger};
use rebase_protocol::{Address, Amount, ChainSelector, MAX_AMOUNT};

use crate::error::FailureKind;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that can occur during pool operations.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No remote pool is registered for the chain.
    #[error("unknown chain {0}")]
    UnknownChain(ChainSelector),

    /// The message came from a pool other than the one registered for its
    /// source chain.
    #[error("unexpected source pool on chain {chain}: expected {expected}, got {got}")]
    UnexpectedSourcePool {
        /// Source chain of the message.
        chain: ChainSelector,
        /// Registered pool.
        expected: Address,
        /// Pool named in the message.
        got: Address,
    },

    /// The message targets a different chain.
    #[error("message addressed to chain {got}, this pool is on {expected}")]
    WrongDestination {
        /// This pool's chain.
        expected: ChainSelector,
        /// Destination named in the message.
        got: ChainSelector,
    },

    /// Zero-unit transfer.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// Caller is not the pool owner.
    #[error("unauthorized: {caller} is not the pool owner")]
    Unauthorized {
        /// Identity that attempted the call.
        caller: Address,
    },

    /// The ledger refused the transfer, burn or mint.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The message envelope or rate word is invalid.
    #[error(transparent)]
    Payload(#[from] PayloadError),
}

impl PoolError {
    /// Classifies the error.
    pub fn kind(&self) -> FailureKind {
        match self {
            PoolError::Unauthorized { .. } => FailureKind::Authorization,
            PoolError::Ledger(e) => e.kind().into(),
            PoolError::UnexpectedSourcePool { .. } => FailureKind::Invariant,
            PoolError::UnknownChain(_)
            | PoolError::WrongDestination { .. }
            | PoolError::ZeroAmount
            | PoolError::Payload(_) => FailureKind::BadInput,
        }
    }
}

// ---------------------------------------------------------------------------
// TokenPool
// ---------------------------------------------------------------------------

/// Burn-and-mint bridge endpoint for one ledger instance.
///
/// The pool address must hold `MintBurn` on its ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPool {
    address: Address,
    chain: ChainSelector,
    owner: Address,
    remotes: BTreeMap<ChainSelector, Address>,
    next_nonce: u64,
}

impl TokenPool {
    /// Creates a pool on `chain` with no remotes.
    pub fn new(address: Address, chain: ChainSelector, owner: Address) -> Self {
        Self {
            address,
            chain,
            owner,
            remotes: BTreeMap::new(),
            next_nonce: 0,
        }
    }

    /// The pool's identity on its ledger.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Chain this pool lives on.
    pub fn chain(&self) -> ChainSelector {
        self.chain
    }

    /// Pool owner.
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Registered pool for `chain`, if any.
    pub fn remote_pool(&self, chain: ChainSelector) -> Option<Address> {
        self.remotes.get(&chain).copied()
    }

    /// All registered remotes, ordered by chain selector.
    pub fn remotes(&self) -> impl Iterator<Item = (ChainSelector, Address)> + '_ {
        self.remotes.iter().map(|(c, a)| (*c, *a))
    }

    /// Nonce the next outbound message will carry.
    pub fn next_nonce(&self) -> u64 {
        self.next_nonce
    }

    // -- Remote registry ----------------------------------------------------

    /// Registers (or replaces) the pool trusted on `remote_chain`.
    pub fn apply_chain_update(
        &mut self,
        caller: &Address,
        remote_chain: ChainSelector,
        remote_pool: Address,
    ) -> Result<(), PoolError> {
        self.require_owner(caller)?;
        let previous = self.remotes.insert(remote_chain, remote_pool);
        info!(
            chain = remote_chain,
            pool = %remote_pool,
            replaced = previous.is_some(),
            "remote pool registered"
        );
        Ok(())
    }

    /// Forgets `remote_chain`. Returns the pool that was registered.
    pub fn remove_chain(
        &mut self,
        caller: &Address,
        remote_chain: ChainSelector,
    ) -> Result<Address, PoolError> {
        self.require_owner(caller)?;
        let removed = self
            .remotes
            .remove(&remote_chain)
            .ok_or(PoolError::UnknownChain(remote_chain))?;
        info!(chain = remote_chain, pool = %removed, "remote pool removed");
        Ok(removed)
    }

    // -- Outbound -----------------------------------------------------------

    /// Escrows `amount` of the sender's units into the pool and burns them.
    /// [`MAX_AMOUNT`] sends the sender's full effective balance. Either both
    /// steps happen or neither does.
    pub fn send(
        &mut self,
        ledger: &mut RebaseLedger,
        sender: &Address,
        receiver: &Address,
        amount: Amount,
        dest_chain: ChainSelector,
    ) -> Result<BridgeMessage, PoolError> {
        self.require_remote(dest_chain)?;
        self.require_mint_burn(ledger)?;
        let amount = if amount == MAX_AMOUNT {
            ledger.balance_of(sender)?
        } else {
            amount
        };
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let savepoint = ledger.savepoint(&[*sender, self.address]);
        ledger.transfer(sender, &self.address, amount)?;
        match self.lock_or_burn(ledger, sender, receiver, amount, dest_chain) {
            Ok(message) => Ok(message),
            Err(e) => {
                ledger.rollback(&self.address, savepoint)?;
                warn!(sender = %sender, amount = %amount, error = %e, "send rolled back");
                Err(e)
            }
        }
    }

    /// Burns `amount` from the pool's own holding and produces the message
    /// that lets the remote pool mint it at `original_sender`'s rate.
    pub fn lock_or_burn(
        &mut self,
        ledger: &mut RebaseLedger,
        original_sender: &Address,
        receiver: &Address,
        amount: Amount,
        dest_chain: ChainSelector,
    ) -> Result<BridgeMessage, PoolError> {
        if amount == 0 {
            return Err(PoolError::ZeroAmount);
        }
        self.require_remote(dest_chain)?;
        if receiver.is_zero() {
            return Err(LedgerError::ZeroAddress.into());
        }

        let rate = ledger.user_rate(original_sender);
        ledger.burn(&self.address, &self.address, amount)?;

        let message = BridgeMessage::new(
            self.chain,
            dest_chain,
            self.address,
            self.next_nonce,
            *original_sender,
            *receiver,
            amount,
            rate,
        );
        self.next_nonce += 1;

        info!(
            dest_chain,
            nonce = message.nonce,
            sender = %original_sender,
            amount = %amount,
            rate = %rate,
            "burned for bridge"
        );
        Ok(message)
    }

    // -- Inbound ------------------------------------------------------------

    /// Mints a delivered message's amount to its receiver at the carried
    /// rate. Returns the minted amount.
    pub fn release_or_mint(
        &self,
        ledger: &mut RebaseLedger,
        message: &BridgeMessage,
    ) -> Result<Amount, PoolError> {
        if message.dest_chain != self.chain {
            return Err(PoolError::WrongDestination {
                expected: self.chain,
                got: message.dest_chain,
            });
        }
        let expected = self.require_remote(message.source_chain)?;
        if expected != message.source_pool {
            warn!(
                chain = message.source_chain,
                got = %message.source_pool,
                "message from unregistered pool"
            );
            return Err(PoolError::UnexpectedSourcePool {
                chain: message.source_chain,
                expected,
                got: message.source_pool,
            });
        }
        if message.version != BRIDGE_PAYLOAD_VERSION {
            return Err(PayloadError::UnsupportedVersion {
                expected: BRIDGE_PAYLOAD_VERSION,
                got: message.version,
            }
            .into());
        }
        if message.amount == 0 {
            return Err(PoolError::ZeroAmount);
        }

        let rate = message.rate()?;
        ledger.mint(&self.address, &message.receiver, message.amount, rate)?;

        info!(
            source_chain = message.source_chain,
            nonce = message.nonce,
            receiver = %message.receiver,
            amount = %message.amount,
            rate = %rate,
            "minted from bridge"
        );
        Ok(message.amount)
    }

    /// Decodes raw relay bytes and hands them to
    /// [`release_or_mint`](Self::release_or_mint).
    pub fn receive(&self, ledger: &mut RebaseLedger, bytes: &[u8]) -> Result<BridgeMessage, PoolError> {
        let message = BridgeMessage::decode(bytes)?;
        self.release_or_mint(ledger, &message)?;
        Ok(message)
    }

    // -- Internals ----------------------------------------------------------

    fn require_owner(&self, caller: &Address) -> Result<(), PoolError> {
        if *caller != self.owner {
            warn!(caller = %caller, "unauthorized pool call");
            return Err(PoolError::Unauthorized { caller: *caller });
        }
        Ok(())
    }

    fn require_remote(&self, chain: ChainSelector) -> Result<Address, PoolError> {
        self.remote_pool(chain).ok_or(PoolError::UnknownChain(chain))
    }

    /// The escrow leg can only be undone by a `MintBurn` holder, so check
    /// before moving anything.
    fn require_mint_burn(&self, ledger: &RebaseLedger) -> Result<(), PoolError> {
        if ledger.has_capability(&self.address, Capability::MintBurn) {
            Ok(())
        } else {
            Err(LedgerError::Access(AccessError::Unauthorized {
                caller: self.address,
                required: Capability::MintBurn,
            })
            .into())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rebase_protocol::config::LedgerConfig;
    use rebase_protocol::ManualClock;

    use super::*;

    const OWNER: Address = Address::from_tag(1);
    const POOL: Address = Address::from_tag(0x50);
    const REMOTE: Address = Address::from_tag(0x51);

    fn ledger() -> RebaseLedger {
        let mut ledger =
            RebaseLedger::new(LedgerConfig::default(), OWNER, Arc::new(ManualClock::new(0)))
                .unwrap();
        ledger.grant_mint_burn(&OWNER, &POOL).unwrap();
        ledger
    }

    #[test]
    fn only_owner_updates_remotes() {
        let mut pool = TokenPool::new(POOL, 1, OWNER);
        let err = pool
            .apply_chain_update(&Address::from_tag(9), 2, REMOTE)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Authorization);

        pool.apply_chain_update(&OWNER, 2, REMOTE).unwrap();
        assert_eq!(pool.remote_pool(2), Some(REMOTE));
        assert_eq!(pool.remove_chain(&OWNER, 2).unwrap(), REMOTE);
        assert!(matches!(
            pool.remove_chain(&OWNER, 2),
            Err(PoolError::UnknownChain(2))
        ));
    }

    #[test]
    fn send_to_unknown_chain_does_nothing() {
        let mut ledger = ledger();
        let mut pool = TokenPool::new(POOL, 1, OWNER);
        let user = Address::from_tag(10);
        ledger.mint(&POOL, &user, 100, 5).unwrap();

        let err = pool.send(&mut ledger, &user, &user, 50, 9).unwrap_err();
        assert!(matches!(err, PoolError::UnknownChain(9)));
        assert_eq!(ledger.principal_balance_of(&user), 100);
        assert_eq!(pool.next_nonce(), 0);
    }

    #[test]
    fn send_to_zero_receiver_rolls_back_escrow() {
        let mut ledger = ledger();
        let mut pool = TokenPool::new(POOL, 1, OWNER);
        pool.apply_chain_update(&OWNER, 2, REMOTE).unwrap();
        let user = Address::from_tag(10);
        ledger.mint(&POOL, &user, 100, 5).unwrap();

        let err = pool
            .send(&mut ledger, &user, &Address::ZERO, 50, 2)
            .unwrap_err();
        assert!(matches!(err, PoolError::Ledger(LedgerError::ZeroAddress)));
        assert_eq!(ledger.principal_balance_of(&user), 100);
        assert_eq!(ledger.principal_balance_of(&POOL), 0);
        assert_eq!(ledger.total_supply(), 100);
    }

    #[test]
    fn send_without_capability_is_refused_up_front() {
        let mut ledger = ledger();
        ledger.revoke_mint_burn(&OWNER, &POOL).unwrap();
        let mut pool = TokenPool::new(POOL, 1, OWNER);
        pool.apply_chain_update(&OWNER, 2, REMOTE).unwrap();

        let err = pool
            .send(&mut ledger, &Address::from_tag(10), &Address::from_tag(11), 1, 2)
            .unwrap_err();
        assert_eq!(err.kind(), FailureKind::Authorization);
    }

    #[test]
    fn nonces_increase_per_message() {
        let mut ledger = ledger();
        let mut pool = TokenPool::new(POOL, 1, OWNER);
        pool.apply_chain_update(&OWNER, 2, REMOTE).unwrap();
        let user = Address::from_tag(10);
        ledger.mint(&POOL, &user, 100, 5).unwrap();

        let a = pool.send(&mut ledger, &user, &user, 10, 2).unwrap();
        let b = pool.send(&mut ledger, &user, &user, 10, 2).unwrap();
        assert_eq!((a.nonce, b.nonce), (0, 1));
        assert_eq!(pool.next_nonce(), 2);
    }
}
