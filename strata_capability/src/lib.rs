//! # Strata Capability
//!
//! `strata_capability` grants modules unforgeable handles to shared
//! resources. A [`Capability`] is only ever minted by this crate, so holding
//! one is proof that it was granted or claimed through the keeper.
//!
//! State is split in two:
//!
//! 1. **Index** ([`CapabilityIndex`]): the persisted, deterministic table of
//!    capability indices, owner sets and name lookups. It is part of
//!    consensus state and replays identically on every node.
//!
//! 2. **Cache** ([`CapabilityCache`]): the process-local table mapping the
//!    runtime token inside each handle back to its index and owning names.
//!    It is never persisted and is rebuilt from the index at startup.
//!
//! [`CapabilityKeeper`] composes the two, and [`ScopedKeeper`] binds a keeper
//! to a single module name.

pub mod cache;
pub mod genesis;
pub mod index;
pub mod keeper;
pub mod keys;
pub mod model;

pub use cache::CapabilityCache;
pub use genesis::{GenesisOwners, GenesisState};
pub use index::CapabilityIndex;
pub use keeper::{CapabilityKeeper, ScopedKeeper};
pub use model::{Capability, CapabilityOwners, CapabilityToken, Owner};
pub use strata_core::CapabilityError;

/// Result type for capability operations.
pub type Result<T, E = CapabilityError> = std::result::Result<T, E>;
