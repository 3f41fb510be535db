//! Store upgrade descriptors.
//!
//! A [`StoreUpgrades`] is produced by an upgrade handler and read once by the
//! multi-store while it mounts partitions. It only answers membership
//! questions; checking that the three lists do not contradict each other is
//! the consumer's job (see [`validate_upgrades`](crate::validate_upgrades)).

use serde::{Deserialize, Serialize};

/// A store that moves from `old_name` to `new_name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRename {
    pub old_name: String,
    pub new_name: String,
}

impl StoreRename {
    pub fn new(old_name: impl Into<String>, new_name: impl Into<String>) -> Self {
        Self {
            old_name: old_name.into(),
            new_name: new_name.into(),
        }
    }
}

/// The partitions an upgrade creates, deletes and renames.
///
/// The lists are tiny (a handful of names per upgrade), so lookups are plain
/// linear scans.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreUpgrades {
    #[serde(default)]
    pub added: Vec<String>,
    #[serde(default)]
    pub deleted: Vec<String>,
    #[serde(default)]
    pub renamed: Vec<StoreRename>,
}

impl StoreUpgrades {
    /// Check if `name` is a newly added store.
    pub fn is_added(&self, name: &str) -> bool {
        self.added.iter().any(|n| n == name)
    }

    /// Check if `name` is scheduled for deletion.
    pub fn is_deleted(&self, name: &str) -> bool {
        self.deleted.iter().any(|n| n == name)
    }

    /// The old name of the store renamed to `new_name`, if any.
    pub fn renamed_from(&self, new_name: &str) -> Option<&str> {
        self.renamed
            .iter()
            .find(|r| r.new_name == new_name)
            .map(|r| r.old_name.as_str())
    }

    /// Check if the plan changes nothing.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.renamed.is_empty()
    }
}
