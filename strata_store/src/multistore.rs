//! Named store partitions and upgrade application.
//!
//! [`MultiStore`] holds the partitions committed by the previous version and
//! the names mounted by the current binary. [`MultiStore::load`] reconciles
//! the two using a [`StoreUpgrades`] plan, after checking that the plan is
//! self-consistent.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;
use tracing::{debug, info, warn};

use strata_core::{MemStore, StoreError};

use crate::upgrades::StoreUpgrades;

/// Check that an upgrade plan does not contradict itself.
///
/// Rejects a name that is both added and deleted, a rename target that is
/// also added or deleted, a rename source that is also deleted, a rename onto
/// itself, and two renames onto the same target.
pub fn validate_upgrades(upgrades: &StoreUpgrades) -> Result<(), StoreError> {
    let invalid = |msg: String| Err(StoreError::InvalidUpgrade(msg));

    for name in &upgrades.added {
        if upgrades.is_deleted(name) {
            return invalid(format!("store {} is both added and deleted", name));
        }
    }

    let mut targets = BTreeSet::new();
    for rename in &upgrades.renamed {
        if rename.old_name == rename.new_name {
            return invalid(format!("store {} is renamed to itself", rename.old_name));
        }
        if upgrades.is_added(&rename.new_name) {
            return invalid(format!(
                "store {} is both a rename target and added",
                rename.new_name
            ));
        }
        if upgrades.is_deleted(&rename.new_name) {
            return invalid(format!(
                "store {} is both a rename target and deleted",
                rename.new_name
            ));
        }
        if upgrades.is_deleted(&rename.old_name) {
            return invalid(format!(
                "store {} is both renamed and deleted",
                rename.old_name
            ));
        }
        if !targets.insert(rename.new_name.as_str()) {
            return invalid(format!(
                "store {} is the target of more than one rename",
                rename.new_name
            ));
        }
    }
    Ok(())
}

/// What happened to one store during [`MultiStore::load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum StoreAction {
    /// Existing data kept as-is.
    Loaded,
    /// Mounted for the first time without being listed as added.
    Created,
    /// Listed as added; starts empty.
    Added,
    /// Data moved over from `from`.
    Renamed { from: String },
    /// Data dropped.
    Deleted,
}

impl fmt::Display for StoreAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Created => write!(f, "created"),
            Self::Added => write!(f, "added"),
            Self::Renamed { from } => write!(f, "renamed from {}", from),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}

/// Outcome of applying an upgrade plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UpgradeReport {
    pub actions: BTreeMap<String, StoreAction>,
    /// Committed stores that are neither mounted nor touched by the plan.
    pub orphaned: Vec<String>,
}

/// A set of named partitions.
#[derive(Debug, Default)]
pub struct MultiStore {
    stores: BTreeMap<String, MemStore>,
    mounted: BTreeSet<String>,
}

impl MultiStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from partitions committed by a previous version.
    pub fn from_committed(stores: BTreeMap<String, MemStore>) -> Self {
        Self {
            stores,
            mounted: BTreeSet::new(),
        }
    }

    /// Declare that the running binary expects a store called `name`.
    pub fn mount(&mut self, name: impl Into<String>) {
        self.mounted.insert(name.into());
    }

    /// Reconcile committed partitions with the mounted names.
    ///
    /// The plan is validated first; nothing is changed if it is rejected.
    pub fn load(&mut self, upgrades: Option<&StoreUpgrades>) -> Result<UpgradeReport, StoreError> {
        let empty = StoreUpgrades::default();
        let upgrades = upgrades.unwrap_or(&empty);
        validate_upgrades(upgrades)?;

        for rename in &upgrades.renamed {
            if !self.mounted.contains(&rename.new_name) {
                return Err(StoreError::InvalidUpgrade(format!(
                    "rename target {} is not mounted",
                    rename.new_name
                )));
            }
            if !self.stores.contains_key(&rename.old_name) {
                return Err(StoreError::InvalidUpgrade(format!(
                    "rename source {} does not exist",
                    rename.old_name
                )));
            }
            let target_moved_away = upgrades
                .renamed
                .iter()
                .any(|r| r.old_name == rename.new_name);
            if self.stores.contains_key(&rename.new_name) && !target_moved_away {
                return Err(StoreError::InvalidUpgrade(format!(
                    "rename target {} already holds committed data",
                    rename.new_name
                )));
            }
        }
        for name in &upgrades.added {
            let moved_away = upgrades.renamed.iter().any(|r| &r.old_name == name);
            if self.stores.contains_key(name) && !moved_away {
                return Err(StoreError::InvalidUpgrade(format!(
                    "added store {} already exists",
                    name
                )));
            }
        }

        let mut previous = std::mem::take(&mut self.stores);
        let mut report = UpgradeReport::default();

        for name in &upgrades.deleted {
            if previous.remove(name).is_some() || self.mounted.contains(name) {
                warn!("Deleting store {}", name);
                report.actions.insert(name.clone(), StoreAction::Deleted);
            }
            self.mounted.remove(name);
        }

        for rename in &upgrades.renamed {
            if let Some(data) = previous.remove(&rename.old_name) {
                debug!("Renaming store {} to {}", rename.old_name, rename.new_name);
                self.stores.insert(rename.new_name.clone(), data);
                report.actions.insert(
                    rename.new_name.clone(),
                    StoreAction::Renamed {
                        from: rename.old_name.clone(),
                    },
                );
            }
        }

        for name in &self.mounted {
            if self.stores.contains_key(name) {
                continue;
            }
            let action = if upgrades.is_added(name) {
                self.stores.insert(name.clone(), MemStore::new());
                StoreAction::Added
            } else if let Some(data) = previous.remove(name) {
                self.stores.insert(name.clone(), data);
                StoreAction::Loaded
            } else {
                warn!("Store {} is new but not listed in the upgrade plan", name);
                self.stores.insert(name.clone(), MemStore::new());
                StoreAction::Created
            };
            debug!("Store {}: {}", name, action);
            report.actions.insert(name.clone(), action);
        }

        report.orphaned = previous.keys().cloned().collect();
        for name in &report.orphaned {
            warn!("Committed store {} is not mounted", name);
        }
        self.stores.extend(previous);

        info!(
            "Loaded {} stores ({} orphaned)",
            self.mounted.len(),
            report.orphaned.len()
        );
        Ok(report)
    }

    /// A mounted store by name.
    pub fn store(&self, name: &str) -> Result<&MemStore, StoreError> {
        if !self.mounted.contains(name) {
            return Err(StoreError::StoreNotFound(name.to_string()));
        }
        self.stores
            .get(name)
            .ok_or_else(|| StoreError::StoreNotFound(name.to_string()))
    }

    /// Names of all mounted stores, sorted.
    pub fn mounted(&self) -> impl Iterator<Item = &str> {
        self.mounted.iter().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upgrades::StoreRename;
    use strata_core::KvStore;

    fn plan(added: &[&str], deleted: &[&str], renamed: &[(&str, &str)]) -> StoreUpgrades {
        StoreUpgrades {
            added: added.iter().map(|s| s.to_string()).collect(),
            deleted: deleted.iter().map(|s| s.to_string()).collect(),
            renamed: renamed
                .iter()
                .map(|(old, new)| StoreRename::new(*old, *new))
                .collect(),
        }
    }

    fn store_with(key: &[u8]) -> MemStore {
        let store = MemStore::new();
        store.set(key, b"v");
        store
    }

    #[test]
    fn test_validate_upgrades() {
        assert!(validate_upgrades(&plan(&["new"], &["foo"], &[("bar", "baz")])).is_ok());
        assert!(validate_upgrades(&StoreUpgrades::default()).is_ok());

        let rejected = [
            plan(&["a"], &["a"], &[]),
            plan(&["baz"], &[], &[("bar", "baz")]),
            plan(&[], &["bar"], &[("bar", "baz")]),
            plan(&[], &["baz"], &[("bar", "baz")]),
            plan(&[], &[], &[("bar", "bar")]),
            plan(&[], &[], &[("a", "c"), ("b", "c")]),
        ];
        for upgrades in &rejected {
            assert!(
                matches!(validate_upgrades(upgrades), Err(StoreError::InvalidUpgrade(_))),
                "accepted {:?}",
                upgrades
            );
        }
    }

    #[test]
    fn test_load_applies_plan() {
        let mut committed = BTreeMap::new();
        committed.insert("bank".to_string(), store_with(b"balance"));
        committed.insert("foo".to_string(), store_with(b"doomed"));
        committed.insert("bar".to_string(), store_with(b"moved"));

        let mut multistore = MultiStore::from_committed(committed);
        for name in ["bank", "foo", "baz", "new"] {
            multistore.mount(name);
        }

        let report = multistore
            .load(Some(&plan(&["new"], &["foo"], &[("bar", "baz")])))
            .unwrap();

        assert_eq!(report.actions["bank"], StoreAction::Loaded);
        assert_eq!(report.actions["foo"], StoreAction::Deleted);
        assert_eq!(
            report.actions["baz"],
            StoreAction::Renamed {
                from: "bar".to_string()
            }
        );
        assert_eq!(report.actions["new"], StoreAction::Added);
        assert!(report.orphaned.is_empty());

        assert!(multistore.store("bank").unwrap().has(b"balance"));
        assert!(multistore.store("baz").unwrap().has(b"moved"));
        assert!(multistore.store("new").unwrap().is_empty());
        assert!(matches!(
            multistore.store("foo"),
            Err(StoreError::StoreNotFound(_))
        ));
        assert!(multistore.store("bar").is_err());
        assert_eq!(
            multistore.mounted().collect::<Vec<_>>(),
            vec!["bank", "baz", "new"]
        );
    }

    #[test]
    fn test_load_without_plan() {
        let mut committed = BTreeMap::new();
        committed.insert("bank".to_string(), store_with(b"k"));
        committed.insert("legacy".to_string(), store_with(b"k"));

        let mut multistore = MultiStore::from_committed(committed);
        multistore.mount("bank");
        multistore.mount("fresh");

        let report = multistore.load(None).unwrap();
        assert_eq!(report.actions["bank"], StoreAction::Loaded);
        assert_eq!(report.actions["fresh"], StoreAction::Created);
        assert_eq!(report.orphaned, vec!["legacy".to_string()]);
    }

    #[test]
    fn test_invalid_plan_leaves_state_untouched() {
        let mut committed = BTreeMap::new();
        committed.insert("bar".to_string(), store_with(b"k"));
        let mut multistore = MultiStore::from_committed(committed);
        multistore.mount("bar");
        multistore.mount("baz");

        assert!(multistore
            .load(Some(&plan(&[], &["bar"], &[("bar", "baz")])))
            .is_err());
        assert!(multistore.load(None).is_ok());
        assert!(multistore.store("bar").unwrap().has(b"k"));
    }

    #[test]
    fn test_rename_requirements() {
        let mut multistore = MultiStore::new();
        multistore.mount("baz");
        assert!(matches!(
            multistore.load(Some(&plan(&[], &[], &[("bar", "baz")]))),
            Err(StoreError::InvalidUpgrade(_))
        ));

        let mut committed = BTreeMap::new();
        committed.insert("bar".to_string(), store_with(b"k"));
        let mut multistore = MultiStore::from_committed(committed);
        assert!(matches!(
            multistore.load(Some(&plan(&[], &[], &[("bar", "baz")]))),
            Err(StoreError::InvalidUpgrade(_))
        ));
    }

    #[test]
    fn test_rename_onto_committed_store_is_rejected() {
        let mut committed = BTreeMap::new();
        committed.insert("bar".to_string(), store_with(b"moved"));
        committed.insert("baz".to_string(), store_with(b"stale"));
        let mut multistore = MultiStore::from_committed(committed);
        multistore.mount("baz");

        assert!(matches!(
            multistore.load(Some(&plan(&[], &[], &[("bar", "baz")]))),
            Err(StoreError::InvalidUpgrade(_))
        ));

        // nothing moved, both partitions are intact
        let report = multistore.load(None).unwrap();
        assert_eq!(report.orphaned, vec!["bar".to_string()]);
        assert!(multistore.store("baz").unwrap().has(b"stale"));
    }

    #[test]
    fn test_rename_chain_shifts_data() {
        let mut committed = BTreeMap::new();
        committed.insert("a".to_string(), store_with(b"from_a"));
        committed.insert("b".to_string(), store_with(b"from_b"));
        let mut multistore = MultiStore::from_committed(committed);
        multistore.mount("b");
        multistore.mount("c");

        let report = multistore
            .load(Some(&plan(&[], &[], &[("a", "b"), ("b", "c")])))
            .unwrap();

        assert!(report.orphaned.is_empty());
        assert!(multistore.store("b").unwrap().has(b"from_a"));
        assert!(!multistore.store("b").unwrap().has(b"from_b"));
        assert!(multistore.store("c").unwrap().has(b"from_b"));
    }

    #[test]
    fn test_added_store_must_be_new() {
        let mut committed = BTreeMap::new();
        committed.insert("bank".to_string(), store_with(b"k"));
        let mut multistore = MultiStore::from_committed(committed);
        multistore.mount("bank");

        assert!(matches!(
            multistore.load(Some(&plan(&["bank"], &[], &[]))),
            Err(StoreError::InvalidUpgrade(_))
        ));
    }

    #[test]
    fn test_rename_then_reuse_old_name() {
        let mut committed = BTreeMap::new();
        committed.insert("old".to_string(), store_with(b"k"));
        let mut multistore = MultiStore::from_committed(committed);
        multistore.mount("old");
        multistore.mount("new");

        let report = multistore
            .load(Some(&plan(&["old"], &[], &[("old", "new")])))
            .unwrap();

        assert_eq!(report.actions["old"], StoreAction::Added);
        assert!(multistore.store("old").unwrap().is_empty());
        assert!(multistore.store("new").unwrap().has(b"k"));
    }
}
