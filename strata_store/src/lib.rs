//! # Strata Store
//!
//! Startup-time storage policy for the strata state machine:
//!
//! - [`StoreUpgrades`]: which named store partitions an upgrade adds,
//!   deletes or renames
//! - [`MultiStore`]: the consumer that validates an upgrade plan and applies
//!   it to the committed partitions before block execution resumes
//! - [`PruningOptions`]: the retention policy resolved from configuration and
//!   handed to the storage engine
//!
//! All of this runs once, before the first block is processed.

pub mod multistore;
pub mod pruning;
pub mod upgrades;

pub use multistore::{validate_upgrades, MultiStore, StoreAction, UpgradeReport};
pub use pruning::{PruningOptions, PruningStrategy};
pub use upgrades::{StoreRename, StoreUpgrades};
