//! Salted password hashing and constant-time verification.
//!
//! Digests are SHA-256 over `salt ‖ secret`. Every identity record carries
//! its own salt, minted from the OS CSPRNG at creation and regenerated only
//! when the password changes. Verification recomputes the digest and compares
//! without early exit, so a mismatch costs the same as a match.
//!
//! Plaintext secrets never reach the log layer from this module.

use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Salt length in bytes, fixed for every identity record.
pub const SALT_LEN: usize = 16;

/// Digest length in bytes (SHA-256 output).
pub const DIGEST_LEN: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

/// Mint a fresh per-record salt from the OS CSPRNG.
#[must_use]
pub fn generate_salt() -> [u8; SALT_LEN] {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derive the digest for `secret` under `salt`.
///
/// Deterministic and one-way; the same `(secret, salt)` pair always yields
/// the same digest.
///
/// # Errors
/// Returns `HashError::InvalidInput` for an empty secret or a salt that is
/// not exactly [`SALT_LEN`] bytes.
pub fn derive(secret: &[u8], salt: &[u8]) -> Result<[u8; DIGEST_LEN], HashError> {
    if secret.is_empty() {
        return Err(HashError::InvalidInput("empty secret"));
    }
    if salt.len() != SALT_LEN {
        return Err(HashError::InvalidInput("wrong salt length"));
    }

    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(secret);
    Ok(hasher.finalize().into())
}

/// Recompute the digest for `candidate` and compare it to `expected` in
/// constant time.
///
/// # Errors
/// Returns `HashError::InvalidInput` if the candidate or salt is malformed;
/// a malformed candidate is an error, never a silent mismatch.
pub fn verify(candidate: &[u8], salt: &[u8], expected: &[u8]) -> Result<bool, HashError> {
    let digest = derive(candidate, salt)?;
    Ok(bool::from(digest.as_slice().ct_eq(expected)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn derive_is_deterministic() -> Result<()> {
        let salt = generate_salt();
        let first = derive(b"correct horse", &salt)?;
        let second = derive(b"correct horse", &salt)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn verify_round_trip() -> Result<()> {
        let salt = generate_salt();
        let digest = derive(b"Abc123!@", &salt)?;
        assert!(verify(b"Abc123!@", &salt, &digest)?);
        Ok(())
    }

    #[test]
    fn verify_rejects_mutated_secret() -> Result<()> {
        let salt = generate_salt();
        let digest = derive(b"Abc123!@", &salt)?;
        // flip a single bit in the candidate
        assert!(!verify(b"Abc123!A", &salt, &digest)?);
        assert!(!verify(b"abc123!@", &salt, &digest)?);
        Ok(())
    }

    #[test]
    fn verify_rejects_mutated_salt() -> Result<()> {
        let salt = generate_salt();
        let digest = derive(b"Abc123!@", &salt)?;
        let mut other_salt = salt;
        other_salt[0] ^= 0x01;
        assert!(!verify(b"Abc123!@", &other_salt, &digest)?);
        Ok(())
    }

    #[test]
    fn salts_are_unique_per_call() {
        assert_ne!(generate_salt(), generate_salt());
    }

    #[test]
    fn derive_rejects_empty_secret() {
        let salt = generate_salt();
        assert_eq!(
            derive(b"", &salt),
            Err(HashError::InvalidInput("empty secret"))
        );
    }

    #[test]
    fn derive_rejects_short_salt() {
        assert_eq!(
            derive(b"secret", b"short"),
            Err(HashError::InvalidInput("wrong salt length"))
        );
    }

    #[test]
    fn different_salts_yield_different_digests() -> Result<()> {
        let first = derive(b"same password", &generate_salt())?;
        let second = derive(b"same password", &generate_salt())?;
        assert_ne!(first, second);
        Ok(())
    }
}
