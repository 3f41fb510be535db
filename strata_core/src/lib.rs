//! # Strata Core
//!
//! Shared building blocks for the strata state-machine crates:
//!
//! - The error hierarchy every subsystem reports through
//! - Configuration values and the option map consumed at startup
//! - Logging setup on top of `tracing`
//! - The ordered key-value store abstraction used for persisted state
//!
//! Nothing in this crate is consensus logic. It only provides the plumbing
//! that the capability, upgrade and pruning subsystems are built on.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;

pub use config::{AppOptions, ConfigValue, OptionMap};
pub use error::{CapabilityError, ConfigError, Error, PruningError, StoreError};
pub use logging::{init_tracing, LogLevel};
pub use storage::{FileStore, KvStore, MemStore};

/// A type alias for Result with our error types
pub type Result<T, E = error::Error> = std::result::Result<T, E>;
