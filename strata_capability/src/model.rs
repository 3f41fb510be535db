//! Capability handles and owner sets.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::Result;
use strata_core::CapabilityError;

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Process-local identity of a capability handle.
///
/// Tokens come from a process-wide counter, so no two tokens handed out in
/// the same process are equal. They carry no meaning across restarts and
/// must never be written to persisted state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CapabilityToken(u64);

impl CapabilityToken {
    pub(crate) fn next() -> Self {
        Self(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CapabilityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// An unforgeable handle to a granted capability.
///
/// Only this crate can mint one. Copies of a handle compare equal to each
/// other; two handles minted separately never do, even for the same index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Capability {
    token: CapabilityToken,
    index: u64,
}

impl Capability {
    pub(crate) fn issue(index: u64) -> Self {
        Self {
            token: CapabilityToken::next(),
            index,
        }
    }

    /// The persisted, chain-wide index this handle refers to.
    pub fn index(&self) -> u64 {
        self.index
    }

    /// The process-local identity of this handle.
    pub fn token(&self) -> CapabilityToken {
        self.token
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Capability{{{}}}", self.index)
    }
}

/// A module holding a capability under a given name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Owner {
    pub module: String,
    pub name: String,
}

impl Owner {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// Check that both parts are usable as key components.
    pub fn validate(&self) -> Result<()> {
        validate_module_name(&self.module)?;
        validate_capability_name(&self.name)
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.module, self.name)
    }
}

/// The set of owners of one capability index, kept sorted and duplicate-free.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityOwners {
    owners: BTreeSet<Owner>,
}

impl CapabilityOwners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an owner. Adding an owner twice is an error.
    pub fn insert(&mut self, owner: Owner) -> Result<()> {
        if self.owners.contains(&owner) {
            return Err(CapabilityError::AlreadyGranted {
                module: owner.module,
                name: owner.name,
            });
        }
        self.owners.insert(owner);
        Ok(())
    }

    /// Remove an owner, returning whether it was present.
    pub fn remove(&mut self, owner: &Owner) -> bool {
        self.owners.remove(owner)
    }

    pub fn contains(&self, owner: &Owner) -> bool {
        self.owners.contains(owner)
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Owner> {
        self.owners.iter()
    }

    /// Distinct module names among the owners, sorted.
    pub fn modules(&self) -> BTreeSet<String> {
        self.owners.iter().map(|o| o.module.clone()).collect()
    }

    /// Deterministic encoding for the persisted store.
    pub fn encode(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| CapabilityError::Corrupt(e.to_string()))
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| CapabilityError::Corrupt(e.to_string()))
    }
}

impl FromIterator<Owner> for CapabilityOwners {
    fn from_iter<I: IntoIterator<Item = Owner>>(iter: I) -> Self {
        Self {
            owners: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a CapabilityOwners {
    type Item = &'a Owner;
    type IntoIter = std::collections::btree_set::Iter<'a, Owner>;

    fn into_iter(self) -> Self::IntoIter {
        self.owners.iter()
    }
}

/// Module names are key prefixes, so they must be non-blank and contain no `/`.
pub(crate) fn validate_module_name(module: &str) -> Result<()> {
    if module.trim().is_empty() {
        return Err(CapabilityError::InvalidName(
            "module name cannot be blank".to_string(),
        ));
    }
    if module.contains('/') {
        return Err(CapabilityError::InvalidName(format!(
            "module name {:?} cannot contain '/'",
            module
        )));
    }
    Ok(())
}

pub(crate) fn validate_capability_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(CapabilityError::InvalidName(
            "capability name cannot be blank".to_string(),
        ));
    }
    Ok(())
}
