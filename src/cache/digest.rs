//! Key Digest Module
//!
//! Maps arbitrary cache keys to fixed-width storage identifiers.

use sha2::{Digest, Sha256};

/// Hex length of a key digest.
pub const DIGEST_LEN: usize = 64;

/// Returns the lowercase hex SHA-256 of `key`.
///
/// Used as the map key by both backends and as the data file stem by the file
/// backend, so it must stay filename-safe and deterministic.
pub fn key_digest(key: &str) -> String {
    hex::encode(Sha256::digest(key.as_bytes()))
}
