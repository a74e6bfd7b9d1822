//! Password hashing and verification
//!
//! Passwords are hashed with scrypt using a random per-call salt. The stored
//! format is `"<hex salt>.<hex derived key>"`: a single `.` separator, both
//! components hex encoded. The salt is 16 bytes and the derived key 64 bytes,
//! so two hashes of the same password always differ while verification stays
//! deterministic for a given salt.

use rand::{TryRngCore, rngs::OsRng};
use scrypt::Params;

use crate::{Error, crypto::constant_time_compare, error::CryptoError};

const SALT_BYTES: usize = 16;
const KEY_BYTES: usize = 64;

// N = 16384, r = 8, p = 1
fn scrypt_params() -> Result<Params, Error> {
    Params::new(14, 8, 1, KEY_BYTES)
        .map_err(|e| CryptoError::PasswordHash(e.to_string()).into())
}

/// Hash a password for storage.
///
/// Accepts any string, including the empty string and multi-byte input; the
/// KDF operates on raw bytes with no normalization.
pub fn hash_password(password: &str) -> Result<String, Error> {
    let mut salt = [0u8; SALT_BYTES];
    OsRng
        .try_fill_bytes(&mut salt)
        .expect("OS RNG failure - system entropy source unavailable");

    let key = derive_key(password, &salt)?;

    Ok(format!("{}.{}", hex::encode(salt), hex::encode(key)))
}

/// Verify a password against a stored hash.
///
/// Re-derives the key from the supplied password and the stored salt using
/// identical KDF parameters, then compares in constant time. A malformed
/// stored value verifies as `false` rather than erroring, so callers never
/// leak why a credential check failed.
pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool, Error> {
    let Some((salt_hex, key_hex)) = stored_hash.split_once('.') else {
        return Ok(false);
    };

    let Ok(salt) = hex::decode(salt_hex) else {
        return Ok(false);
    };
    let Ok(expected_key) = hex::decode(key_hex) else {
        return Ok(false);
    };

    let key = derive_key(password, &salt)?;

    Ok(constant_time_compare(&key, &expected_key))
}

fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; KEY_BYTES], Error> {
    let params = scrypt_params()?;
    let mut key = [0u8; KEY_BYTES];
    scrypt::scrypt(password.as_bytes(), salt, &params, &mut key)
        .map_err(|e| CryptoError::PasswordHash(e.to_string()))?;
    Ok(key)
}
