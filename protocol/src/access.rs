//! # Access Control
//!
//! A flat permission table: identity → set of [`Capability`]. There is no
//! role hierarchy. The owner holds [`Capability::Admin`]; the admin hands
//! out [`Capability::MintBurn`] to the adapters (vault, token pool) that are
//! allowed to create and destroy ledger units.
//!
//! Every gated ledger operation calls [`AccessControl::require`] before it
//! touches anything, so an unauthorized call has no effect at all.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Address;

/// A permission that gates a class of ledger operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Capability {
    /// May change the global rate, grant/revoke `MintBurn`, and hand over
    /// ownership. Held by exactly one identity: the owner.
    Admin,
    /// May call `mint` and `burn`.
    MintBurn,
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Admin => write!(f, "Admin"),
            Capability::MintBurn => write!(f, "MintBurn"),
        }
    }
}

/// Errors from permission checks and grants.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AccessError {
    /// The caller lacks the capability the operation requires.
    #[error("unauthorized: {caller} lacks {required} capability")]
    Unauthorized {
        /// Identity that attempted the call.
        caller: Address,
        /// Capability the operation needs.
        required: Capability,
    },

    /// The capability cannot be handed out through `grant`.
    #[error("capability {0} cannot be granted; use ownership transfer")]
    NotGrantable(Capability),

    /// The zero address cannot hold capabilities.
    #[error("zero address cannot hold capabilities")]
    ZeroAddress,
}

/// Identity → capability table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessControl {
    owner: Address,
    grants: HashMap<Address, BTreeSet<Capability>>,
}

impl AccessControl {
    /// Creates a table whose only entry is `owner` holding `Admin`.
    pub fn new(owner: Address) -> Self {
        let mut grants = HashMap::new();
        grants.insert(owner, BTreeSet::from([Capability::Admin]));
        Self { owner, grants }
    }

    /// Current owner (the `Admin` holder).
    pub fn owner(&self) -> Address {
        self.owner
    }

    /// Returns `true` if `who` holds `capability`.
    pub fn has(&self, who: &Address, capability: Capability) -> bool {
        self.grants
            .get(who)
            .map(|caps| caps.contains(&capability))
            .unwrap_or(false)
    }

    /// Fails with [`AccessError::Unauthorized`] unless `caller` holds
    /// `capability`.
    pub fn require(&self, caller: &Address, capability: Capability) -> Result<(), AccessError> {
        if self.has(caller, capability) {
            Ok(())
        } else {
            Err(AccessError::Unauthorized {
                caller: *caller,
                required: capability,
            })
        }
    }

    /// Grants `capability` to `account`. Returns `false` if it was already
    /// held. Only `Admin` may grant, and only `MintBurn` is grantable.
    pub fn grant(
        &mut self,
        caller: &Address,
        account: Address,
        capability: Capability,
    ) -> Result<bool, AccessError> {
        self.require(caller, Capability::Admin)?;
        if capability == Capability::Admin {
            return Err(AccessError::NotGrantable(capability));
        }
        if account.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        Ok(self.grants.entry(account).or_default().insert(capability))
    }

    /// Revokes `capability` from `account`. Returns `false` if it was not
    /// held.
    pub fn revoke(
        &mut self,
        caller: &Address,
        account: &Address,
        capability: Capability,
    ) -> Result<bool, AccessError> {
        self.require(caller, Capability::Admin)?;
        if capability == Capability::Admin {
            return Err(AccessError::NotGrantable(capability));
        }
        let removed = match self.grants.get_mut(account) {
            Some(caps) => caps.remove(&capability),
            None => false,
        };
        self.grants.retain(|_, caps| !caps.is_empty());
        Ok(removed)
    }

    /// Moves `Admin` from the current owner to `new_owner`.
    pub fn transfer_ownership(
        &mut self,
        caller: &Address,
        new_owner: Address,
    ) -> Result<Address, AccessError> {
        self.require(caller, Capability::Admin)?;
        if new_owner.is_zero() {
            return Err(AccessError::ZeroAddress);
        }
        let previous = self.owner;
        if let Some(caps) = self.grants.get_mut(&previous) {
            caps.remove(&Capability::Admin);
        }
        self.grants.retain(|_, caps| !caps.is_empty());
        self.grants
            .entry(new_owner)
            .or_default()
            .insert(Capability::Admin);
        self.owner = new_owner;
        Ok(previous)
    }

    /// All identities currently holding `capability`, sorted.
    pub fn holders_of(&self, capability: Capability) -> Vec<Address> {
        let mut holders: Vec<Address> = self
            .grants
            .iter()
            .filter(|(_, caps)| caps.contains(&capability))
            .map(|(addr, _)| *addr)
            .collect();
        holders.sort();
        holders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Address {
        Address::from_tag(1)
    }

    fn vault() -> Address {
        Address::from_tag(2)
    }

    #[test]
    fn owner_starts_as_admin_only() {
        let acl = AccessControl::new(owner());
        assert!(acl.has(&owner(), Capability::Admin));
        assert!(!acl.has(&owner(), Capability::MintBurn));
        assert!(!acl.has(&vault(), Capability::Admin));
    }

    #[test]
    fn admin_grants_mint_burn() {
        let mut acl = AccessControl::new(owner());
        assert!(acl.grant(&owner(), vault(), Capability::MintBurn).unwrap());
        assert!(!acl.grant(&owner(), vault(), Capability::MintBurn).unwrap());
        assert!(acl.has(&vault(), Capability::MintBurn));
        assert_eq!(acl.holders_of(Capability::MintBurn), vec![vault()]);
    }

    #[test]
    fn non_admin_cannot_grant() {
        let mut acl = AccessControl::new(owner());
        let err = acl
            .grant(&vault(), vault(), Capability::MintBurn)
            .unwrap_err();
        assert_eq!(
            err,
            AccessError::Unauthorized {
                caller: vault(),
                required: Capability::Admin
            }
        );
        assert!(!acl.has(&vault(), Capability::MintBurn));
    }

    #[test]
    fn admin_is_not_grantable() {
        let mut acl = AccessControl::new(owner());
        assert_eq!(
            acl.grant(&owner(), vault(), Capability::Admin),
            Err(AccessError::NotGrantable(Capability::Admin))
        );
    }

    #[test]
    fn revoke_removes_capability() {
        let mut acl = AccessControl::new(owner());
        acl.grant(&owner(), vault(), Capability::MintBurn).unwrap();
        assert!(acl.revoke(&owner(), &vault(), Capability::MintBurn).unwrap());
        assert!(!acl.revoke(&owner(), &vault(), Capability::MintBurn).unwrap());
        assert!(!acl.has(&vault(), Capability::MintBurn));
    }

    #[test]
    fn ownership_transfer_moves_admin() {
        let mut acl = AccessControl::new(owner());
        let next = Address::from_tag(9);
        assert_eq!(acl.transfer_ownership(&owner(), next).unwrap(), owner());
        assert_eq!(acl.owner(), next);
        assert!(acl.has(&next, Capability::Admin));
        assert!(!acl.has(&owner(), Capability::Admin));
        assert!(acl.transfer_ownership(&owner(), owner()).is_err());
    }

    #[test]
    fn zero_address_cannot_be_granted() {
        let mut acl = AccessControl::new(owner());
        assert_eq!(
            acl.grant(&owner(), Address::ZERO, Capability::MintBurn),
            Err(AccessError::ZeroAddress)
        );
    }
}
