//! Authenticated encryption for stored identity fields.
//!
//! Every sensitive value (email address, per-identity secret material) is
//! sealed under one process-wide master key into a self-describing envelope:
//!
//! ```text
//! version (1 byte) ‖ nonce (12 bytes) ‖ ciphertext + Poly1305 tag
//! ```
//!
//! encoded as URL-safe base64 without padding. The nonce is random per call,
//! so sealing the same plaintext twice never yields the same envelope and
//! stored values leak no equality. The version byte makes future key or
//! algorithm rotation detectable instead of silently mis-decrypting.
//!
//! The master key is loaded once at startup from an external secret source;
//! a missing or malformed key is fatal misconfiguration, not something to
//! retry around.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretBox};

/// Master key length in bytes (ChaCha20-Poly1305 key size).
pub const KEY_LEN: usize = 32;

const NONCE_LEN: usize = 12;
const ENVELOPE_VERSION: u8 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
pub enum VaultError {
    /// The envelope failed its integrity tag, is truncated, is not valid
    /// base64, or carries a version this build does not understand.
    #[error("envelope failed integrity verification or has an unrecognized version")]
    TamperedOrInvalid,
    /// No usable master key material. Fatal startup misconfiguration.
    #[error("master key is not initialized")]
    KeyUnavailable,
}

/// Process-wide master key, wrapped so it is neither printable nor cloneable.
pub struct MasterKey {
    bytes: SecretBox<[u8; KEY_LEN]>,
}

impl MasterKey {
    /// Wrap key material obtained from the external secret source.
    ///
    /// # Errors
    /// Returns `VaultError::KeyUnavailable` unless `bytes` is exactly
    /// [`KEY_LEN`] bytes; an empty slice is how a missing secret source
    /// shows up here.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, VaultError> {
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| VaultError::KeyUnavailable)?;
        Ok(Self {
            bytes: SecretBox::new(Box::new(key)),
        })
    }

    /// Mint a fresh random key. Intended for first-run provisioning and tests.
    #[must_use]
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self {
            bytes: SecretBox::new(Box::new(key)),
        }
    }
}

/// Seals and opens field-level envelopes under the master key.
pub struct Vault {
    cipher: ChaCha20Poly1305,
}

impl Vault {
    #[must_use]
    pub fn new(master_key: &MasterKey) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(master_key.bytes.expose_secret())),
        }
    }

    /// Encrypt `plaintext` into a versioned, tamper-evident envelope.
    ///
    /// Non-deterministic: a fresh nonce is drawn per call.
    ///
    /// # Errors
    /// Returns `VaultError::TamperedOrInvalid` if the cipher rejects the
    /// payload (only possible for pathologically large inputs).
    pub fn seal(&self, plaintext: &[u8]) -> Result<String, VaultError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext)
            .map_err(|_| VaultError::TamperedOrInvalid)?;

        let mut raw = Vec::with_capacity(1 + NONCE_LEN + ciphertext.len());
        raw.push(ENVELOPE_VERSION);
        raw.extend_from_slice(&nonce_bytes);
        raw.extend_from_slice(&ciphertext);
        Ok(URL_SAFE_NO_PAD.encode(raw))
    }

    /// Decrypt an envelope produced by [`Vault::seal`].
    ///
    /// # Errors
    /// Returns `VaultError::TamperedOrInvalid` when the envelope is
    /// malformed, carries an unknown version, or fails its integrity tag.
    /// Wrong plaintext is never returned silently.
    pub fn open(&self, envelope: &str) -> Result<Vec<u8>, VaultError> {
        let raw = URL_SAFE_NO_PAD
            .decode(envelope)
            .map_err(|_| VaultError::TamperedOrInvalid)?;

        let Some((&version, body)) = raw.split_first() else {
            return Err(VaultError::TamperedOrInvalid);
        };
        if version != ENVELOPE_VERSION || body.len() < NONCE_LEN {
            return Err(VaultError::TamperedOrInvalid);
        }

        let (nonce, ciphertext) = body.split_at(NONCE_LEN);
        self.cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::TamperedOrInvalid)
    }
}
