//! Capability genesis import and export.
//!
//! Genesis carries only the deterministic half of capability state: the
//! latest index and the owner set of every live index. Handles are minted
//! fresh when the state is loaded.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::info;

use strata_core::{CapabilityError, KvStore};

use crate::keeper::CapabilityKeeper;
use crate::model::CapabilityOwners;
use crate::Result;

/// Owners of a single index in genesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisOwners {
    pub index: u64,
    pub owners: CapabilityOwners,
}

/// Exported capability state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    /// Latest allocated index. New capabilities start after it.
    pub index: u64,
    #[serde(default)]
    pub owners: Vec<GenesisOwners>,
}

impl GenesisState {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| CapabilityError::InvalidGenesis(msg);

        let mut seen_indices = BTreeSet::new();
        let mut seen_names = BTreeMap::new();

        for entry in &self.owners {
            if entry.index == 0 {
                return Err(invalid("owner index cannot be zero".to_string()));
            }
            if entry.index > self.index {
                return Err(invalid(format!(
                    "owner index {} is above latest index {}",
                    entry.index, self.index
                )));
            }
            if !seen_indices.insert(entry.index) {
                return Err(invalid(format!("duplicate owners for index {}", entry.index)));
            }
            if entry.owners.is_empty() {
                return Err(invalid(format!("index {} has no owners", entry.index)));
            }

            let mut modules = BTreeSet::new();
            for owner in &entry.owners {
                owner
                    .validate()
                    .map_err(|e| invalid(format!("index {}: {}", entry.index, e)))?;

                if !modules.insert(owner.module.as_str()) {
                    return Err(invalid(format!(
                        "module {} owns index {} under more than one name",
                        owner.module, entry.index
                    )));
                }
                if let Some(other) = seen_names.insert(owner.to_string(), entry.index) {
                    return Err(invalid(format!(
                        "{} is granted both index {} and index {}",
                        owner, other, entry.index
                    )));
                }
            }
        }
        Ok(())
    }
}

impl<S: KvStore> CapabilityKeeper<S> {
    /// Load `state` into an empty capability store and rebuild the cache.
    pub fn init_genesis(&self, state: &GenesisState) -> Result<()> {
        state.validate()?;

        let _guard = self.writer();
        let index = self.index();

        if index.latest_index()? != 0 || !index.all_owners()?.is_empty() {
            return Err(CapabilityError::InvalidGenesis(
                "capability state is already initialized".to_string(),
            ));
        }

        index.set_latest_index(state.index);
        for entry in &state.owners {
            index.set_owners(entry.index, &entry.owners)?;
            for owner in &entry.owners {
                index.set_reverse(&owner.module, &owner.name, entry.index);
            }
        }

        let issued = self.rebuild_locked()?;
        info!(
            "Initialized capability genesis: latest index {}, {} capabilities",
            state.index, issued
        );
        Ok(())
    }

    /// Read the persisted capability table back out, in ascending index order.
    pub fn export_genesis(&self) -> Result<GenesisState> {
        let index = self.index();
        Ok(GenesisState {
            index: index.latest_index()?,
            owners: index
                .all_owners()?
                .into_iter()
                .map(|(index, owners)| GenesisOwners { index, owners })
                .collect(),
        })
    }
}
