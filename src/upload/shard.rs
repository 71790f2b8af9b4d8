//! Shard generator
//!
//! Spreads objects across a storage prefix namespace. Not a security
//! control; just a stable hash prefix.

use sha2::{Digest, Sha256};

/// Derive a 2-hex-character shard from a content identifier.
///
/// Pure function of the input bytes: the SHA-256 digest's first byte
/// rendered as two lowercase hex characters. The empty string is valid
/// input and yields a fixed shard.
pub fn shard(key_base: &str) -> String {
    let digest = Sha256::digest(key_base.as_bytes());
    hex::encode(&digest[..1])
}
