//! Ledger change notifications.
//!
//! The ledger appends an event for every observable state change and never
//! reads them back. Consumers drain the log with
//! [`RebaseLedger::take_events`](super::RebaseLedger::take_events).

use serde::{Deserialize, Serialize};

use crate::access::Capability;
use crate::types::{Address, Amount, Rate};

/// A single observable ledger change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEvent {
    /// Units moved. `from == None` is a mint (including realized interest),
    /// `to == None` is a burn.
    Transfer {
        from: Option<Address>,
        to: Option<Address>,
        amount: Amount,
    },
    /// An allowance was set.
    Approval {
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    /// The global rate was lowered. Recorded after the new value is in force.
    GlobalRateUpdated { previous: Rate, new: Rate },
    /// A holder's frozen rate was (re)installed by a mint or inherited
    /// through a transfer.
    HolderRateSet { holder: Address, rate: Rate },
    /// A capability was granted.
    CapabilityGranted {
        account: Address,
        capability: Capability,
    },
    /// A capability was revoked.
    CapabilityRevoked {
        account: Address,
        capability: Capability,
    },
    /// Admin moved to a new owner.
    OwnershipTransferred { previous: Address, new: Address },
}
