//! Process-local capability cache.
//!
//! The cache maps the runtime token inside each [`Capability`] back to its
//! persisted index and to the names modules hold it under. Tokens differ on
//! every run, so the cache is never persisted; it is rebuilt from the
//! [`CapabilityIndex`](crate::CapabilityIndex) when the process starts.
//!
//! Lookups take a shared lock and may run alongside block execution.
//! Mutations take the exclusive lock and only happen on the block path.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::keys;
use crate::model::{Capability, CapabilityOwners, Owner};

#[derive(Debug, Default)]
struct CacheTables {
    /// Live handle for each index.
    by_index: HashMap<u64, Capability>,

    /// `module/fwd/<token>` -> capability name.
    forward: HashMap<Vec<u8>, String>,

    /// `module/rev/name` -> index, mirrored from the persisted store.
    reverse: HashMap<Vec<u8>, u64>,
}

impl CacheTables {
    fn bind(&mut self, owner: &Owner, capability: &Capability) {
        self.forward.insert(
            keys::forward_key(&owner.module, capability.token()),
            owner.name.clone(),
        );
        self.reverse
            .insert(keys::reverse_key(&owner.module, &owner.name), capability.index());
    }
}

/// Ephemeral lookup tables for capability handles.
#[derive(Debug, Default)]
pub struct CapabilityCache {
    tables: RwLock<CacheTables>,
}

impl CapabilityCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh handle for `index`, make it the live one and bind it to
    /// its first owner. Readers see all of it or none of it.
    pub(crate) fn issue(&self, index: u64, owner: &Owner) -> Capability {
        let capability = Capability::issue(index);
        let mut tables = self.tables.write();
        tables.by_index.insert(index, capability);
        tables.bind(owner, &capability);
        capability
    }

    /// The live handle for `index`.
    pub fn capability(&self, index: u64) -> Option<Capability> {
        self.tables.read().by_index.get(&index).copied()
    }

    /// Check that `capability` is the live handle issued by this process.
    pub fn contains(&self, capability: &Capability) -> bool {
        self.tables.read().by_index.get(&capability.index()) == Some(capability)
    }

    /// The name `module` holds `capability` under.
    pub fn name_for(&self, module: &str, capability: &Capability) -> Option<String> {
        let key = keys::forward_key(module, capability.token());
        self.tables.read().forward.get(&key).cloned()
    }

    /// The index granted to `module` under `name`, without touching the store.
    pub fn index_for(&self, module: &str, name: &str) -> Option<u64> {
        let key = keys::reverse_key(module, name);
        self.tables.read().reverse.get(&key).copied()
    }

    /// The live handle `module` holds under `name`.
    pub fn resolve(&self, module: &str, name: &str) -> Option<Capability> {
        let tables = self.tables.read();
        let index = tables.reverse.get(&keys::reverse_key(module, name))?;
        tables.by_index.get(index).copied()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.tables.read().by_index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.read().by_index.is_empty()
    }

    pub(crate) fn bind(&self, owner: &Owner, capability: &Capability) {
        self.tables.write().bind(owner, capability);
    }

    /// Remove `owner`'s binding. With `last` set the handle is dropped too,
    /// so old copies stop resolving.
    pub(crate) fn unbind(&self, owner: &Owner, capability: &Capability, last: bool) {
        let mut tables = self.tables.write();
        tables
            .forward
            .remove(&keys::forward_key(&owner.module, capability.token()));
        tables
            .reverse
            .remove(&keys::reverse_key(&owner.module, &owner.name));
        if last {
            tables.by_index.remove(&capability.index());
        }
    }

    /// Replace all contents with fresh handles for `entries`.
    ///
    /// Every previously issued handle stops resolving. Returns the number of
    /// handles issued.
    pub(crate) fn rebuild(&self, entries: &[(u64, CapabilityOwners)]) -> usize {
        let mut fresh = CacheTables::default();

        for (index, owners) in entries.iter().filter(|(_, owners)| !owners.is_empty()) {
            let capability = Capability::issue(*index);
            for owner in owners {
                fresh.bind(owner, &capability);
            }
            fresh.by_index.insert(*index, capability);
        }

        let issued = fresh.by_index.len();
        *self.tables.write() = fresh;
        issued
    }
}
