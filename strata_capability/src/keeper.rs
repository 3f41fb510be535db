//! Capability keeper.
//!
//! The keeper is the only entry point that mutates capability state. Every
//! mutation updates the persisted [`CapabilityIndex`] first and the
//! [`CapabilityCache`] second, under a single writer lock, so the two never
//! disagree once a call returns.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use strata_core::{CapabilityError, KvStore};

use crate::cache::CapabilityCache;
use crate::index::CapabilityIndex;
use crate::model::{
    validate_capability_name, validate_module_name, Capability, CapabilityOwners, Owner,
};
use crate::Result;

struct KeeperInner<S> {
    index: CapabilityIndex<S>,
    cache: CapabilityCache,
    /// Serializes create/claim/release/genesis.
    writer: Mutex<()>,
    /// Modules that already have a scoped keeper.
    scoped: Mutex<BTreeSet<String>>,
}

/// Issues, claims, resolves and releases capabilities for all modules.
///
/// Cloning is cheap and every clone shares the same state.
pub struct CapabilityKeeper<S> {
    inner: Arc<KeeperInner<S>>,
}

impl<S> Clone for CapabilityKeeper<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: KvStore> CapabilityKeeper<S> {
    /// Open the keeper over a persisted store and rebuild the cache from it.
    ///
    /// A store whose capability table cannot be rebuilt consistently is an
    /// error; the caller must not continue without a keeper.
    pub fn load(store: S) -> Result<Self> {
        let keeper = Self {
            inner: Arc::new(KeeperInner {
                index: CapabilityIndex::new(store),
                cache: CapabilityCache::new(),
                writer: Mutex::new(()),
                scoped: Mutex::new(BTreeSet::new()),
            }),
        };
        keeper.rebuild_cache()?;
        Ok(keeper)
    }

    /// The persisted index.
    pub fn index(&self) -> &CapabilityIndex<S> {
        &self.inner.index
    }

    /// The process-local cache.
    pub fn cache(&self) -> &CapabilityCache {
        &self.inner.cache
    }

    /// Bind a keeper handle to `module`. Each module can be scoped once.
    pub fn scope_to_module(&self, module: &str) -> Result<ScopedKeeper<S>> {
        validate_module_name(module)?;

        if !self.inner.scoped.lock().insert(module.to_string()) {
            return Err(CapabilityError::ModuleAlreadyScoped(module.to_string()));
        }

        debug!("Scoped capability keeper to module {}", module);
        Ok(ScopedKeeper {
            module: module.to_string(),
            keeper: self.clone(),
        })
    }

    /// Drop all cached handles and issue fresh ones from the persisted table.
    ///
    /// Handles issued before the rebuild no longer resolve.
    pub fn rebuild_cache(&self) -> Result<usize> {
        let _guard = self.inner.writer.lock();
        self.rebuild_locked()
    }

    pub(crate) fn rebuild_locked(&self) -> Result<usize> {
        let index = &self.inner.index;
        let latest = index.latest_index()?;
        let entries = index.all_owners()?;

        for (i, owners) in &entries {
            if *i == 0 || *i > latest {
                return Err(CapabilityError::Corrupt(format!(
                    "owners stored for index {} beyond latest index {}",
                    i, latest
                )));
            }
            for owner in owners {
                if index.lookup_index(&owner.module, &owner.name)? != Some(*i) {
                    return Err(CapabilityError::Corrupt(format!(
                        "owner {} of index {} has no matching reverse key",
                        owner, i
                    )));
                }
            }
        }

        let issued = self.inner.cache.rebuild(&entries);
        info!(
            "Rebuilt capability cache with {} capabilities (latest index {})",
            issued, latest
        );
        Ok(issued)
    }

    /// Grant a brand-new capability to `module` under `name`.
    pub fn new_capability(&self, module: &str, name: &str) -> Result<Capability> {
        validate_module_name(module)?;
        validate_capability_name(name)?;

        let _guard = self.inner.writer.lock();
        let index = &self.inner.index;

        if index.lookup_index(module, name)?.is_some() {
            return Err(CapabilityError::AlreadyGranted {
                module: module.to_string(),
                name: name.to_string(),
            });
        }

        let next = index.allocate_index()?;
        let owner = Owner::new(module, name);
        let owners: CapabilityOwners = std::iter::once(owner.clone()).collect();
        index.set_owners(next, &owners)?;
        index.set_reverse(module, name, next);

        let capability = self.inner.cache.issue(next, &owner);

        debug!("Created capability {} for {}", next, owner);
        Ok(capability)
    }

    /// Add `module` as an owner of an existing capability under `name`.
    pub fn claim_capability(&self, module: &str, name: &str, capability: &Capability) -> Result<()> {
        validate_module_name(module)?;
        validate_capability_name(name)?;

        let _guard = self.inner.writer.lock();
        let index = &self.inner.index;
        let cache = &self.inner.cache;

        if !cache.contains(capability) {
            return Err(CapabilityError::NotFound(format!(
                "{} was not issued by this process",
                capability
            )));
        }

        if index.lookup_index(module, name)?.is_some() {
            return Err(CapabilityError::AlreadyGranted {
                module: module.to_string(),
                name: name.to_string(),
            });
        }

        if let Some(held) = cache.name_for(module, capability) {
            return Err(CapabilityError::AlreadyGranted {
                module: module.to_string(),
                name: held,
            });
        }

        let mut owners = index
            .get_owners(capability.index())?
            .ok_or_else(|| CapabilityError::NotFound(capability.to_string()))?;
        let owner = Owner::new(module, name);
        owners.insert(owner.clone())?;

        index.set_owners(capability.index(), &owners)?;
        index.set_reverse(module, name, capability.index());
        cache.bind(&owner, capability);

        debug!(
            "Module {} claimed capability {} as {} ({} owners)",
            module,
            capability.index(),
            name,
            owners.len()
        );
        Ok(())
    }

    /// Resolve the handle `module` holds under `name`.
    ///
    /// Served from the cache, so it agrees with
    /// [`authenticate_capability`](Self::authenticate_capability) even while a
    /// claim or release is in flight.
    pub fn get_capability(&self, module: &str, name: &str) -> Result<Capability> {
        self.inner
            .cache
            .resolve(module, name)
            .ok_or_else(|| CapabilityError::NotFound(format!("{}/{}", module, name)))
    }

    /// Check that `module` holds exactly `capability` under `name`.
    pub fn authenticate_capability(&self, module: &str, capability: &Capability, name: &str) -> bool {
        let cache = &self.inner.cache;
        cache.contains(capability) && cache.name_for(module, capability).as_deref() == Some(name)
    }

    /// Give up `module`'s ownership of `capability`.
    ///
    /// When the last owner releases, the index loses its owner set and its
    /// handle stops resolving. The index itself is never reallocated.
    pub fn release_capability(&self, module: &str, capability: &Capability) -> Result<()> {
        let _guard = self.inner.writer.lock();
        let index = &self.inner.index;
        let cache = &self.inner.cache;

        if !cache.contains(capability) {
            return Err(CapabilityError::NotFound(format!(
                "{} was not issued by this process",
                capability
            )));
        }

        let no_owner = || CapabilityError::NoRemainingOwner {
            module: module.to_string(),
            index: capability.index(),
        };

        let name = cache.name_for(module, capability).ok_or_else(no_owner)?;
        let owner = Owner::new(module, name);

        let mut owners = index
            .get_owners(capability.index())?
            .ok_or_else(no_owner)?;
        if !owners.remove(&owner) {
            return Err(no_owner());
        }

        index.delete_reverse(&owner.module, &owner.name);
        index.set_owners(capability.index(), &owners)?;
        cache.unbind(&owner, capability, owners.is_empty());

        if owners.is_empty() {
            debug!(
                "Released last owner {} of capability {}",
                owner,
                capability.index()
            );
        } else {
            debug!(
                "Released owner {} of capability {} ({} owners remain)",
                owner,
                capability.index(),
                owners.len()
            );
        }
        Ok(())
    }

    /// Every module currently owning `capability`.
    pub fn lookup_modules(&self, capability: &Capability) -> Result<BTreeSet<String>> {
        if !self.inner.cache.contains(capability) {
            return Err(CapabilityError::NotFound(format!(
                "{} was not issued by this process",
                capability
            )));
        }

        Ok(self
            .inner
            .index
            .get_owners(capability.index())?
            .map(|owners| owners.modules())
            .unwrap_or_default())
    }

    /// The full owner set of the capability `module` holds under `name`.
    pub fn get_owners(&self, module: &str, name: &str) -> Result<CapabilityOwners> {
        let index = self
            .inner
            .index
            .lookup_index(module, name)?
            .ok_or_else(|| CapabilityError::NotFound(format!("{}/{}", module, name)))?;

        Ok(self.inner.index.get_owners(index)?.unwrap_or_default())
    }

    pub(crate) fn writer(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.inner.writer.lock()
    }
}

/// A [`CapabilityKeeper`] bound to one module.
///
/// Modules receive a scoped keeper at wiring time and can only act under
/// their own name through it.
pub struct ScopedKeeper<S> {
    module: String,
    keeper: CapabilityKeeper<S>,
}

impl<S: KvStore> ScopedKeeper<S> {
    /// The module this keeper acts for.
    pub fn module(&self) -> &str {
        &self.module
    }

    pub fn new_capability(&self, name: &str) -> Result<Capability> {
        self.keeper.new_capability(&self.module, name)
    }

    pub fn claim_capability(&self, capability: &Capability, name: &str) -> Result<()> {
        self.keeper.claim_capability(&self.module, name, capability)
    }

    pub fn get_capability(&self, name: &str) -> Result<Capability> {
        self.keeper.get_capability(&self.module, name)
    }

    pub fn authenticate_capability(&self, capability: &Capability, name: &str) -> bool {
        self.keeper
            .authenticate_capability(&self.module, capability, name)
    }

    pub fn release_capability(&self, capability: &Capability) -> Result<()> {
        self.keeper.release_capability(&self.module, capability)
    }

    pub fn lookup_modules(&self, capability: &Capability) -> Result<BTreeSet<String>> {
        self.keeper.lookup_modules(capability)
    }

    pub fn get_owners(&self, name: &str) -> Result<CapabilityOwners> {
        self.keeper.get_owners(&self.module, name)
    }
}
