//! # Node State
//!
//! The one ledger instance a node hosts, together with its custody vault and
//! token pool. Handlers take the whole thing under a single write lock, so
//! each API request is one serial step of the state machine.
//!
//! Persistence is a full snapshot after every successful mutation: the
//! ledger goes through [`LedgerDb::save_state`], the asset book and pool
//! registry are bincode blobs in the metadata tree.

use anyhow::{Context, Result};
use tracing::{info, warn};

use rebase_contracts::{AssetBook, TokenPool, Vault};
use rebase_protocol::config::LedgerConfig;
use rebase_protocol::storage::{DbError, LedgerDb};
use rebase_protocol::{RebaseLedger, SharedClock};

use crate::settings::NodeConfig;

/// Metadata key for the vault's asset book.
pub const META_ASSET_BOOK: &str = "asset_book";
/// Metadata key for the token pool registry.
pub const META_TOKEN_POOL: &str = "token_pool";

/// Ledger, vault and pool for one chain.
#[derive(Debug, Clone)]
pub struct NodeState {
    pub ledger: RebaseLedger,
    pub vault: Vault<AssetBook>,
    pub pool: TokenPool,
}

impl NodeState {
    /// Builds a fresh ledger from `config`.
    ///
    /// The admin becomes owner, the vault and pool are granted `MintBurn`,
    /// remotes are registered and genesis funds are credited in the base
    /// asset.
    pub fn genesis(config: &NodeConfig, clock: SharedClock) -> Result<Self> {
        let admin = config.admin;
        let mut ledger = RebaseLedger::new(LedgerConfig::from(&config.ledger), admin, clock)
            .context("invalid ledger configuration")?;
        ledger.grant_mint_burn(&admin, &config.vault_address)?;
        ledger.grant_mint_burn(&admin, &config.pool_address)?;

        let mut book = AssetBook::new();
        for fund in &config.genesis_funds {
            book.credit(&fund.account, fund.amount()?)
                .with_context(|| format!("failed to credit genesis funds to {}", fund.account))?;
        }

        let mut pool = TokenPool::new(config.pool_address, config.chain_selector, admin);
        for remote in &config.remotes {
            pool.apply_chain_update(&admin, remote.chain_selector, remote.pool)?;
        }

        let genesis_events = ledger.take_events().len();
        info!(
            chain = config.chain_selector,
            owner = %admin,
            events = genesis_events,
            "ledger created at genesis"
        );

        Ok(Self {
            ledger,
            vault: Vault::new(config.vault_address, book),
            pool,
        })
    }

    /// Restores the snapshot in `db`, or returns `None` if the database has
    /// never held a ledger.
    pub fn load(db: &LedgerDb, config: &NodeConfig, clock: SharedClock) -> Result<Option<Self>> {
        let Some(ledger_state) = db.load_state().context("failed to load ledger snapshot")? else {
            return Ok(None);
        };
        let ledger = RebaseLedger::from_state(ledger_state, clock);

        let book: AssetBook = decode_meta(db, META_ASSET_BOOK)?.unwrap_or_default();
        let pool = match decode_meta::<TokenPool>(db, META_TOKEN_POOL)? {
            Some(pool) => pool,
            None => {
                warn!("no pool registry in snapshot, rebuilding from config");
                TokenPool::new(config.pool_address, config.chain_selector, config.admin)
            }
        };
        if pool.chain() != config.chain_selector {
            anyhow::bail!(
                "data directory belongs to chain {}, config says {}",
                pool.chain(),
                config.chain_selector
            );
        }

        info!(
            chain = pool.chain(),
            holders = ledger.holder_count(),
            global_rate = %ledger.global_rate(),
            "ledger restored from snapshot"
        );
        Ok(Some(Self {
            ledger,
            vault: Vault::new(config.vault_address, book),
            pool,
        }))
    }

    /// Loads the snapshot if there is one, otherwise creates and saves a
    /// genesis ledger.
    pub fn load_or_genesis(db: &LedgerDb, config: &NodeConfig, clock: SharedClock) -> Result<Self> {
        if let Some(state) = Self::load(db, config, clock.clone())? {
            return Ok(state);
        }
        let state = Self::genesis(config, clock)?;
        state.persist(db).context("failed to save genesis snapshot")?;
        Ok(state)
    }

    /// Writes the full snapshot and flushes.
    pub fn persist(&self, db: &LedgerDb) -> Result<(), DbError> {
        db.put_meta(META_ASSET_BOOK, &encode_meta(self.vault.asset())?)?;
        db.put_meta(META_TOKEN_POOL, &encode_meta(&self.pool)?)?;
        db.save_state(self.ledger.state())
    }
}

fn encode_meta<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, DbError> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode_meta<T: serde::de::DeserializeOwned>(db: &LedgerDb, key: &str) -> Result<Option<T>> {
    match db.get_meta(key)? {
        Some(bytes) => {
            let value = bincode::deserialize(&bytes)
                .with_context(|| format!("corrupt metadata entry {key}"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rebase_contracts::BaseAsset;
    use rebase_protocol::access::Capability;
    use rebase_protocol::{Address, ManualClock};

    use super::*;
    use crate::settings::{GenesisFund, RemotePool};

    fn config() -> NodeConfig {
        NodeConfig {
            chain_selector: 11_155_111,
            remotes: vec![RemotePool {
                chain_selector: 421_614,
                pool: Address::from_tag(0x52),
            }],
            genesis_funds: vec![GenesisFund {
                account: Address::from_tag(10),
                amount: "5000".into(),
            }],
            ..NodeConfig::default()
        }
    }

    #[test]
    fn genesis_wires_capabilities_and_funds() {
        let config = config();
        let state = NodeState::genesis(&config, Arc::new(ManualClock::new(100))).unwrap();
        assert!(state
            .ledger
            .has_capability(&config.vault_address, Capability::MintBurn));
        assert!(state
            .ledger
            .has_capability(&config.pool_address, Capability::MintBurn));
        assert_eq!(state.vault.asset().balance_of(&Address::from_tag(10)), 5_000);
        assert_eq!(state.pool.remote_pool(421_614), Some(Address::from_tag(0x52)));
    }

    #[test]
    fn snapshot_survives_reload() {
        let config = config();
        let clock = ManualClock::new(100);
        let db = LedgerDb::open_temporary().unwrap();
        let mut state = NodeState::load_or_genesis(&db, &config, Arc::new(clock.clone())).unwrap();

        let alice = Address::from_tag(10);
        let NodeState { ledger, vault, .. } = &mut state;
        vault.deposit(ledger, &alice, 2_000).unwrap();
        state.persist(&db).unwrap();

        let restored = NodeState::load(&db, &config, Arc::new(clock)).unwrap().unwrap();
        assert_eq!(restored.ledger.principal_balance_of(&alice), 2_000);
        assert_eq!(restored.vault.reserves(), 2_000);
        assert_eq!(restored.vault.asset().balance_of(&alice), 3_000);
        assert_eq!(restored.pool.remote_pool(421_614), Some(Address::from_tag(0x52)));
    }

    #[test]
    fn foreign_data_directory_rejected() {
        let db = LedgerDb::open_temporary().unwrap();
        let clock: SharedClock = Arc::new(ManualClock::new(0));
        NodeState::load_or_genesis(&db, &config(), clock.clone()).unwrap();

        let other = NodeConfig {
            chain_selector: 1,
            ..config()
        };
        assert!(NodeState::load(&db, &other, clock).is_err());
    }
}
