//! # LedgerDb: Snapshot Store
//!
//! Persists a [`LedgerState`] in sled so a node survives restarts.
//!
//! ## Tree Layout
//!
//! | Tree         | Key                              | Value                    |
//! |--------------|----------------------------------|--------------------------|
//! | `holders`    | address (20B)                    | `bincode(HolderRecord)`  |
//! | `allowances` | owner (20B) ‖ spender (20B)      | amount (16B BE)          |
//! | `metadata`   | key (UTF-8)                      | value (bytes)            |
//!
//! The ledger header (config, global rate, supply, access table) lives in
//! `metadata` under [`META_LEDGER_HEADER`]. A database without a header has
//! never had a ledger saved into it.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sled::{Batch, Db, Tree};
use tracing::debug;

use crate::access::AccessControl;
use crate::config::LedgerConfig;
use crate::ledger::{HolderRecord, LedgerState};
use crate::types::{Address, Amount, Rate, ADDRESS_LENGTH};

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Key in the `metadata` tree holding the bincode ledger header.
pub const META_LEDGER_HEADER: &[u8] = b"ledger_header";

/// Everything in a [`LedgerState`] except the per-holder maps.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerHeader {
    config: LedgerConfig,
    global_rate: Rate,
    total_principal: Amount,
    access: AccessControl,
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// sled-backed store for ledger snapshots and opaque node metadata.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    holders: Tree,
    allowances: Tree,
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// In-memory database dropped with the handle. For tests.
    pub fn open_temporary() -> DbResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let holders = db.open_tree("holders")?;
        let allowances = db.open_tree("allowances")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            holders,
            allowances,
            metadata,
        })
    }

    // -- Ledger snapshots ---------------------------------------------------

    /// Replaces the stored snapshot with `state`.
    ///
    /// Holders and allowances absent from `state` are removed. Each tree is
    /// written as one batch and the header goes last, so a crash mid-save
    /// leaves the previous header pointing at a superset of records.
    pub fn save_state(&self, state: &LedgerState) -> DbResult<()> {
        let mut holders = Batch::default();
        for key in self.holders.iter().keys() {
            holders.remove(key?);
        }
        for (address, record) in &state.records {
            holders.insert(address.as_bytes().as_slice(), encode(record)?);
        }

        let mut allowances = Batch::default();
        for key in self.allowances.iter().keys() {
            allowances.remove(key?);
        }
        for (owner, spenders) in &state.allowances {
            for (spender, amount) in spenders {
                allowances.insert(
                    allowance_key(owner, spender).as_slice(),
                    amount.to_be_bytes().as_slice(),
                );
            }
        }

        let header = LedgerHeader {
            config: state.config.clone(),
            global_rate: state.global_rate,
            total_principal: state.total_principal,
            access: state.access.clone(),
        };

        self.holders.apply_batch(holders)?;
        self.allowances.apply_batch(allowances)?;
        self.metadata.insert(META_LEDGER_HEADER, encode(&header)?)?;
        self.db.flush()?;

        debug!(
            holders = state.records.len(),
            global_rate = %state.global_rate,
            "ledger snapshot saved"
        );
        Ok(())
    }

    /// Loads the stored snapshot, or `None` if nothing was ever saved.
    pub fn load_state(&self) -> DbResult<Option<LedgerState>> {
        let header: LedgerHeader = match self.metadata.get(META_LEDGER_HEADER)? {
            Some(bytes) => decode(&bytes)?,
            None => return Ok(None),
        };

        let mut records = HashMap::new();
        for entry in self.holders.iter() {
            let (key, value) = entry?;
            let address = Address::try_from_slice(&key)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            let record: HolderRecord = decode(&value)?;
            records.insert(address, record);
        }

        let mut allowances: HashMap<Address, HashMap<Address, Amount>> = HashMap::new();
        for entry in self.allowances.iter() {
            let (key, value) = entry?;
            if key.len() != 2 * ADDRESS_LENGTH {
                return Err(DbError::Serialization(format!(
                    "invalid allowance key length {}",
                    key.len()
                )));
            }
            let (owner, spender) = key.split_at(ADDRESS_LENGTH);
            let owner = Address::try_from_slice(owner)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            let spender = Address::try_from_slice(spender)
                .map_err(|e| DbError::Serialization(e.to_string()))?;
            let amount = Amount::from_be_bytes(
                value
                    .as_ref()
                    .try_into()
                    .map_err(|_| DbError::Serialization("invalid allowance bytes".to_string()))?,
            );
            allowances.entry(owner).or_default().insert(spender, amount);
        }

        Ok(Some(LedgerState {
            config: header.config,
            global_rate: header.global_rate,
            total_principal: header.total_principal,
            access: header.access,
            records,
            allowances,
        }))
    }

    /// Reads a single stored holder record without loading the snapshot.
    pub fn get_holder(&self, address: &Address) -> DbResult<Option<HolderRecord>> {
        match self.holders.get(address.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // -- Metadata -----------------------------------------------------------

    /// Stores an opaque metadata value.
    pub fn put_meta(&self, key: &str, value: &[u8]) -> DbResult<()> {
        self.metadata.insert(key.as_bytes(), value)?;
        Ok(())
    }

    /// Reads an opaque metadata value.
    pub fn get_meta(&self, key: &str) -> DbResult<Option<Vec<u8>>> {
        Ok(self.metadata.get(key.as_bytes())?.map(|v| v.to_vec()))
    }

    /// Like [`get_meta`](Self::get_meta) but a missing key is an error.
    pub fn require_meta(&self, key: &str) -> DbResult<Vec<u8>> {
        self.get_meta(key)?
            .ok_or_else(|| DbError::NotFound(key.to_string()))
    }

    // -- Utility ------------------------------------------------------------

    /// Number of stored holder records.
    pub fn holder_count(&self) -> usize {
        self.holders.len()
    }

    /// Blocks until all pending writes are durable.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn allowance_key(owner: &Address, spender: &Address) -> [u8; 2 * ADDRESS_LENGTH] {
    let mut key = [0u8; 2 * ADDRESS_LENGTH];
    key[..ADDRESS_LENGTH].copy_from_slice(owner.as_bytes());
    key[ADDRESS_LENGTH..].copy_from_slice(spender.as_bytes());
    key
}

fn encode<T: Serialize>(value: &T) -> DbResult<Vec<u8>> {
    bincode::serialize(value).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> DbResult<T> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
