//! Ordered key-value storage.
//!
//! [`KvStore`] is the interface the persisted, consensus-relevant state is
//! written through. Keys are raw bytes and iteration is always in ascending
//! byte order, which is what makes fixed-width big-endian keys sort
//! numerically. Two backends are provided:
//! - [`MemStore`]: an in-memory ordered map, shared between clones
//! - [`FileStore`]: a `MemStore` that snapshots to a JSON file on commit

use std::sync::Arc;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemStore;

/// A key-value pair as returned by prefix scans.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Common interface for byte-keyed storage backends.
///
/// Implementations use interior locking so a store can be shared behind `&self`.
pub trait KvStore: Send + Sync {
    /// Get the value stored under `key`.
    fn get(&self, key: &[u8]) -> Option<Vec<u8>>;

    /// Check whether `key` is present.
    fn has(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Store `value` under `key`, replacing any previous value.
    fn set(&self, key: &[u8], value: &[u8]);

    /// Remove `key`. Removing a missing key is a no-op.
    fn delete(&self, key: &[u8]);

    /// All pairs whose key starts with `prefix`, in ascending key order.
    fn prefix_scan(&self, prefix: &[u8]) -> Vec<KvPair>;
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn has(&self, key: &[u8]) -> bool {
        (**self).has(key)
    }

    fn set(&self, key: &[u8], value: &[u8]) {
        (**self).set(key, value)
    }

    fn delete(&self, key: &[u8]) {
        (**self).delete(key)
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Vec<KvPair> {
        (**self).prefix_scan(prefix)
    }
}
