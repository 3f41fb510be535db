//! Persisted capability index.
//!
//! Everything here is consensus state: the latest allocated index, the owner
//! set of every live index, and the `module/rev/name` lookups. Nothing in
//! this module touches process-local tokens.

use strata_core::{CapabilityError, KvStore};

use crate::keys::{self, KEY_INDEX, KEY_PREFIX_INDEX_CAPABILITY};
use crate::model::CapabilityOwners;
use crate::Result;

/// Deterministic capability table over a [`KvStore`].
#[derive(Debug, Clone)]
pub struct CapabilityIndex<S> {
    store: S,
}

impl<S: KvStore> CapabilityIndex<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// The underlying persisted store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The latest allocated index, or 0 if none has been allocated.
    pub fn latest_index(&self) -> Result<u64> {
        match self.store.get(KEY_INDEX) {
            Some(bytes) => keys::index_from_key(&bytes),
            None => Ok(0),
        }
    }

    pub(crate) fn set_latest_index(&self, index: u64) {
        self.store.set(KEY_INDEX, &keys::index_to_key(index));
    }

    /// Reserve the next index. Indices are never handed out twice.
    pub fn allocate_index(&self) -> Result<u64> {
        let next = self
            .latest_index()?
            .checked_add(1)
            .ok_or_else(|| CapabilityError::Corrupt("capability index exhausted".to_string()))?;
        self.set_latest_index(next);
        Ok(next)
    }

    /// Owners of `index`, or `None` if it has no owners.
    pub fn get_owners(&self, index: u64) -> Result<Option<CapabilityOwners>> {
        self.store
            .get(&keys::owners_key(index))
            .map(|bytes| CapabilityOwners::decode(&bytes))
            .transpose()
    }

    /// Persist the owner set of `index`. An empty set removes the entry.
    pub fn set_owners(&self, index: u64, owners: &CapabilityOwners) -> Result<()> {
        let key = keys::owners_key(index);
        if owners.is_empty() {
            self.store.delete(&key);
        } else {
            self.store.set(&key, &owners.encode()?);
        }
        Ok(())
    }

    /// Resolve a granted name to its index.
    pub fn lookup_index(&self, module: &str, name: &str) -> Result<Option<u64>> {
        self.store
            .get(&keys::reverse_key(module, name))
            .map(|bytes| keys::index_from_key(&bytes))
            .transpose()
    }

    pub(crate) fn set_reverse(&self, module: &str, name: &str, index: u64) {
        self.store
            .set(&keys::reverse_key(module, name), &keys::index_to_key(index));
    }

    pub(crate) fn delete_reverse(&self, module: &str, name: &str) {
        self.store.delete(&keys::reverse_key(module, name));
    }

    /// Every index with owners, in ascending index order.
    pub fn all_owners(&self) -> Result<Vec<(u64, CapabilityOwners)>> {
        self.store
            .prefix_scan(KEY_PREFIX_INDEX_CAPABILITY)
            .into_iter()
            .map(|(key, value)| {
                let index = keys::index_from_key(&key[KEY_PREFIX_INDEX_CAPABILITY.len()..])?;
                let owners = CapabilityOwners::decode(&value)?;
                Ok((index, owners))
            })
            .collect()
    }
}
