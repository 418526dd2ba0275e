//! Role registry and pause switch.
//!
//! Exactly one owner (transferable), a set of providers, and a pause flag that gates
//! every batch-mutating operation elsewhere. Role administration itself is never
//! gated by the pause flag.

use crate::errors::LedgerError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An address-like opaque identity.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Principal {
    fn from(id: String) -> Self {
        Self(id)
    }
}

pub struct AccessControl {
    owner: Principal,
    providers: BTreeSet<Principal>,
    paused: bool,
}

impl AccessControl {
    pub fn new(owner: Principal) -> Self {
        Self {
            owner,
            providers: BTreeSet::new(),
            paused: false,
        }
    }

    pub fn owner(&self) -> &Principal {
        &self.owner
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn is_provider(&self, p: &Principal) -> bool {
        self.providers.contains(p)
    }

    pub fn require_owner(&self, caller: &Principal) -> Result<(), LedgerError> {
        if caller != &self.owner {
            return Err(LedgerError::NotOwner);
        }
        Ok(())
    }

    pub fn require_provider(&self, caller: &Principal) -> Result<(), LedgerError> {
        if !self.is_provider(caller) {
            return Err(LedgerError::NotProvider);
        }
        Ok(())
    }

    pub fn require_unpaused(&self) -> Result<(), LedgerError> {
        if self.paused {
            return Err(LedgerError::Paused);
        }
        Ok(())
    }

    /// Owner-only; always succeeds for the owner, even to the current owner.
    pub fn transfer_ownership(&mut self, caller: &Principal, new_owner: Principal) -> Result<Principal, LedgerError> {
        self.require_owner(caller)?;
        let previous = std::mem::replace(&mut self.owner, new_owner);
        Ok(previous)
    }

    /// Idempotent: returns false (and the caller emits nothing) when already present.
    pub fn add_provider(&mut self, caller: &Principal, provider: Principal) -> Result<bool, LedgerError> {
        self.require_owner(caller)?;
        Ok(self.providers.insert(provider))
    }

    /// Idempotent: returns false when the provider was not registered.
    pub fn remove_provider(&mut self, caller: &Principal, provider: &Principal) -> Result<bool, LedgerError> {
        self.require_owner(caller)?;
        Ok(self.providers.remove(provider))
    }

    pub fn pause(&mut self, caller: &Principal) -> Result<(), LedgerError> {
        self.require_owner(caller)?;
        if self.paused {
            return Err(LedgerError::Paused);
        }
        self.paused = true;
        Ok(())
    }

    pub fn unpause(&mut self, caller: &Principal) -> Result<(), LedgerError> {
        self.require_owner(caller)?;
        if !self.paused {
            return Err(LedgerError::NotPaused);
        }
        self.paused = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> Principal {
        Principal::new("owner")
    }

    #[test]
    fn only_owner_administers_roles() {
        let mut acl = AccessControl::new(owner());
        let mallory = Principal::new("mallory");

        assert!(matches!(
            acl.add_provider(&mallory, Principal::new("p")),
            Err(LedgerError::NotOwner)
        ));
        assert!(matches!(acl.pause(&mallory), Err(LedgerError::NotOwner)));
    }

    #[test]
    fn provider_add_remove_is_idempotent() {
        let mut acl = AccessControl::new(owner());
        let p = Principal::new("provider-1");

        assert!(acl.add_provider(&owner(), p.clone()).unwrap());
        assert!(!acl.add_provider(&owner(), p.clone()).unwrap());
        assert!(acl.is_provider(&p));

        assert!(acl.remove_provider(&owner(), &p).unwrap());
        assert!(!acl.remove_provider(&owner(), &p).unwrap());
        assert!(!acl.is_provider(&p));
    }

    #[test]
    fn pause_toggles_strictly() {
        let mut acl = AccessControl::new(owner());

        assert!(matches!(acl.unpause(&owner()), Err(LedgerError::NotPaused)));
        acl.pause(&owner()).unwrap();
        assert!(matches!(acl.pause(&owner()), Err(LedgerError::Paused)));
        acl.unpause(&owner()).unwrap();
        assert!(!acl.paused());
    }

    #[test]
    fn ownership_transfer_moves_authority() {
        let mut acl = AccessControl::new(owner());
        let new_owner = Principal::new("new-owner");

        let previous = acl.transfer_ownership(&owner(), new_owner.clone()).unwrap();
        assert_eq!(previous, owner());
        assert!(matches!(acl.pause(&owner()), Err(LedgerError::NotOwner)));
        acl.pause(&new_owner).unwrap();
    }
}
