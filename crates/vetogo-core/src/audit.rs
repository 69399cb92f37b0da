//! Content digests for audit trails.
//!
//! A digest is `hex(sha256(canonical_json))`. Struct fields serialize in
//! declaration order, so equal values always hash equally.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// Hash raw bytes.
pub fn hash_data(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash the canonical JSON of a value.
pub fn digest_json<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(value)?;
    Ok(hash_data(payload.as_bytes()))
}
