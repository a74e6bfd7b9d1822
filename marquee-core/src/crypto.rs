//! Cryptographic utilities for token generation and verification
//!
//! This module produces the opaque tokens used for sessions, password reset,
//! email verification and OAuth CSRF state, and provides constant-time
//! comparison for verifying them.
//!
//! # Security
//!
//! Token comparison is vulnerable to timing attacks when using standard
//! string comparison because the comparison may exit early on the first
//! mismatch. OAuth state verification therefore goes through the `subtle`
//! crate's constant-time equality.

use rand::{TryRngCore, rngs::OsRng};
use subtle::ConstantTimeEq;

/// Number of random bytes in a generated token (256 bits of entropy).
pub const TOKEN_BYTES: usize = 32;

/// Generate a cryptographically secure random token.
///
/// Produces 32 bytes from the OS CSPRNG, hex encoded: a 64-character
/// lowercase hexadecimal string. All bearer tokens in the system (sessions,
/// password reset, email verification, OAuth state) use this format.
///
/// # Panics
///
/// Panics if the OS random number generator fails. This indicates a critical
/// system failure (e.g., /dev/urandom unavailable) from which recovery is not
/// possible for security-sensitive operations.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .expect("OS RNG failure - system entropy source unavailable");
    hex::encode(bytes)
}

/// Perform constant-time comparison of two byte slices.
///
/// A length mismatch returns `false` immediately; for equal lengths the
/// comparison takes the same amount of time regardless of where (or if)
/// the bytes differ.
pub fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Verify an OAuth CSRF state value against the expected state.
///
/// Comparison is constant time with respect to content, and any length
/// mismatch is treated as not-equal rather than an error.
pub fn verify_oauth_state(candidate: &str, expected: &str) -> bool {
    constant_time_compare(candidate.as_bytes(), expected.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_format() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        );
    }

    #[test]
    fn test_tokens_are_pairwise_distinct() {
        let tokens: Vec<String> = (0..100).map(|_| generate_token()).collect();
        for (i, a) in tokens.iter().enumerate() {
            for b in tokens.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_constant_time_compare_equal() {
        assert!(constant_time_compare(b"hello", b"hello"));
        assert!(constant_time_compare(b"", b""));
    }

    #[test]
    fn test_constant_time_compare_not_equal() {
        assert!(!constant_time_compare(b"hello", b"world"));
        assert!(!constant_time_compare(b"a", b"b"));
    }

    #[test]
    fn test_constant_time_compare_different_lengths() {
        assert!(!constant_time_compare(b"short", b"longer_string"));
        assert!(!constant_time_compare(b"", b"something"));
    }

    #[test]
    fn test_verify_oauth_state() {
        let state = generate_token();
        assert!(verify_oauth_state(&state, &state));
        assert!(!verify_oauth_state(&state, &generate_token()));
        assert!(!verify_oauth_state("", &state));
        assert!(!verify_oauth_state(&state[..32], &state));
    }
}
