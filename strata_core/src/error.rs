//! Error types for the strata state machine.
//!
//! Each subsystem has its own error enum so callers can match on the exact
//! failure, and the root [`Error`] wraps them all for binaries and glue code.

use thiserror::Error;

/// Root error type for the strata crates.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Pruning error: {0}")]
    Pruning(#[from] PruningError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

/// Errors related to capability issuance and ownership.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Capability {name} already granted to module {module}")]
    AlreadyGranted { module: String, name: String },

    #[error("Capability not found: {0}")]
    NotFound(String),

    #[error("Module {module} does not own capability with index {index}")]
    NoRemainingOwner { module: String, index: u64 },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Index key must be 8 bytes, got {0}")]
    MalformedKey(usize),

    #[error("Module already scoped: {0}")]
    ModuleAlreadyScoped(String),

    #[error("Corrupt capability state: {0}")]
    Corrupt(String),

    #[error("Invalid capability genesis: {0}")]
    InvalidGenesis(String),
}

/// Errors related to resolving a pruning policy.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PruningError {
    #[error("unknown pruning strategy {0}")]
    UnknownStrategy(String),

    #[error("invalid custom pruning options: {0}")]
    InvalidOptions(String),
}

/// Errors related to named store partitions and their upgrades.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Invalid store upgrade: {0}")]
    InvalidUpgrade(String),

    #[error("Store not found: {0}")]
    StoreNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors related to reading configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}
