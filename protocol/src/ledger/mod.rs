//! # Rebase Ledger
//!
//! The interest-accruing balance ledger. A holder's effective balance is
//!
//! ```text
//! principal * (SCALE + rate * (now - last_sync)) / SCALE
//! ```
//!
//! where `rate` is frozen at the holder's last mint (or inherited on a
//! transfer into an empty account) and the global rate only ever goes down.

pub mod accrual;
pub mod error;
pub mod events;
pub mod record;

pub use accrual::{LedgerState, RebaseLedger, Savepoint};
pub use error::{ErrorKind, LedgerError};
pub use events::LedgerEvent;
pub use record::HolderRecord;
