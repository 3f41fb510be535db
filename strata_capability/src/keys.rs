//! Key construction for capability state.
//!
//! Persisted keys (counter, owner sets, reverse lookups) are deterministic
//! byte strings. Forward keys embed a process-local token and only ever live
//! in the cache.

use crate::model::CapabilityToken;
use crate::Result;
use strata_core::CapabilityError;

/// Persisted key holding the latest allocated capability index.
pub const KEY_INDEX: &[u8] = b"index";

/// Persisted prefix for owner sets, followed by the 8-byte index.
///
/// Module names cannot contain `/`, so no reverse key starts with this prefix.
pub const KEY_PREFIX_INDEX_CAPABILITY: &[u8] = b"/capability_index/";

const REVERSE_SEPARATOR: &str = "/rev/";
const FORWARD_SEPARATOR: &str = "/fwd/";

/// Encode an index as 8 big-endian bytes so byte order matches numeric order.
pub fn index_to_key(index: u64) -> [u8; 8] {
    index.to_be_bytes()
}

/// Decode an index written by [`index_to_key`].
///
/// Fails with [`CapabilityError::MalformedKey`] unless `key` is exactly 8 bytes.
pub fn index_from_key(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| CapabilityError::MalformedKey(key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// `module/rev/name`: persisted lookup from a granted name to its index.
pub fn reverse_key(module: &str, name: &str) -> Vec<u8> {
    format!("{}{}{}", module, REVERSE_SEPARATOR, name).into_bytes()
}

/// `module/fwd/<token>`: cache-only lookup from a handle back to the name
/// the module holds it under.
pub fn forward_key(module: &str, token: CapabilityToken) -> Vec<u8> {
    format!("{}{}{}", module, FORWARD_SEPARATOR, token).into_bytes()
}

/// `/capability_index/ || index`: persisted owner set for one index.
pub fn owners_key(index: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(KEY_PREFIX_INDEX_CAPABILITY.len() + 8);
    key.extend_from_slice(KEY_PREFIX_INDEX_CAPABILITY);
    key.extend_from_slice(&index_to_key(index));
    key
}
