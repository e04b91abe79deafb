/// Refresh Token Hashing and Family Identifiers
///
/// Refresh tokens are:
/// - Signed JWTs handed to the client
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Single-use: every refresh revokes the presented token (token rotation)
/// - Grouped in families, one family per login

use rand::{thread_rng, Rng};
use sha2::{Digest, Sha256};

/// Hash a refresh token using SHA-256
///
/// The hex digest is the store's lookup key.
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate a new rotation family id
///
/// 16 random bytes, hex encoded. Used as a correlation key, never as a secret.
pub fn generate_family_id() -> String {
    let bytes: [u8; 16] = thread_rng().gen();
    hex::encode(bytes)
}
