use fls_types::ContentHash;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::{canonicalize, canonicalize_value};
use crate::error::CanonResult;

/// SHA-256 of the canonical form of `data`.
pub fn hash<T: Serialize + ?Sized>(data: &T) -> CanonResult<ContentHash> {
    Ok(hash_bytes(&canonicalize(data)?))
}

/// SHA-256 of the canonical form of a JSON value.
pub fn hash_value(value: &Value) -> CanonResult<ContentHash> {
    Ok(hash_bytes(&canonicalize_value(value)?))
}

/// SHA-256 of raw bytes (previews and other opaque blobs).
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    ContentHash::from_digest(hasher.finalize().into())
}
