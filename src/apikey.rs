//! API-key generation (spec §3, §4.J, §6): `"ah-" + random body`, high
//! collision resistance, hashed stored form.
//!
//! Uses `rand` + `hex`, both already teacher dependencies, matching the
//! teacher's general "random bytes, hex/base64 encode" style used for ids
//! elsewhere (`uuid::Uuid::new_v4()` in `daemon/llm_gateway/mod.rs::complete`).

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::model::apikey::API_KEY_PREFIX;

const RANDOM_BYTES: usize = 24;

/// Generates a new public API key, e.g. `"ah-3f9c…"`. Two successive calls
/// differ with overwhelming probability (192 bits of randomness).
pub fn generate() -> String {
    let mut bytes = [0u8; RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{API_KEY_PREFIX}{}", hex::encode(bytes))
}

/// Stored form: a SHA-256 hash of the full public key, never the key itself.
pub fn hash(public_key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn verify(public_key: &str, hashed_secret: &str) -> bool {
    hash(public_key) == hashed_secret
}
