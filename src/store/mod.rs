//! Identity records and the in-memory credential registry.
//!
//! One [`IdentityRecord`] per registered user, keyed by username. Records
//! live behind per-record locks so two concurrent attempts against the same
//! username serialize, while distinct users never contend. The registry map
//! itself is only locked long enough to resolve a handle.
//!
//! The record is also the persisted shape: digests, salts, and vault
//! envelopes only. No plaintext secret appears in any serialized or logged
//! representation, and the ephemeral active challenge is skipped entirely.

mod policy;

pub use policy::{PasswordClass, MIN_PASSWORD_LEN};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::challenge::ChallengeToken;
use crate::hash::{self, HashError, DIGEST_LEN, SALT_LEN};
use crate::vault::{Vault, VaultError};

/// Lockout posture of an identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockState {
    /// Password verification is sufficient.
    Open,
    /// Repeated failures gated the account behind a one-time challenge.
    ChallengePending,
    /// Administratively locked; every attempt denies.
    Locked,
}

/// The durable record for one identity.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub username: String,
    pub password_digest: [u8; DIGEST_LEN],
    pub password_salt: [u8; SALT_LEN],
    pub encrypted_email: String,
    pub encrypted_secret_key: String,
    pub failed_attempts: u32,
    pub lock_state: LockState,
    #[serde(skip)]
    pub active_challenge: Option<ChallengeToken>,
}

impl IdentityRecord {
    /// Register one verified-wrong-password event; returns the new count.
    pub(crate) fn apply_failure(&mut self) -> u32 {
        self.failed_attempts = self.failed_attempts.saturating_add(1);
        self.failed_attempts
    }

    /// Reset the failure counter, reopen the record, and discard any
    /// outstanding challenge, atomically with the successful login.
    pub(crate) fn apply_success(&mut self) {
        self.failed_attempts = 0;
        self.lock_state = LockState::Open;
        self.active_challenge = None;
    }
}

/// What the registration boundary exposes: the username, nothing else.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySummary {
    pub username: String,
}

/// Decrypted PII, handed only to authorized internal callers.
#[derive(Debug)]
pub struct PiiBundle {
    pub email: String,
    pub secret_material: Vec<u8>,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RegistrationError {
    #[error("username is already registered")]
    DuplicateUsername,
    #[error("password is too weak: missing {0}")]
    WeakPassword(PasswordClass),
    #[error("email address is malformed")]
    InvalidEmail,
    /// Credential material could not be hashed or sealed; points at a
    /// misconfigured vault rather than bad user input.
    #[error("failed to protect credential material")]
    Internal,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown username")]
    NotFound,
    #[error("password is too weak: missing {0}")]
    WeakPassword(PasswordClass),
    /// A stored envelope failed integrity verification. Fatal for this
    /// record's decryption path; never coerced into a login denial.
    #[error("stored envelope failed integrity verification")]
    Integrity(#[from] VaultError),
    #[error(transparent)]
    Hash(#[from] HashError),
}

pub(crate) type RecordHandle = Arc<Mutex<IdentityRecord>>;

/// In-memory credential registry with per-record mutual exclusion.
pub struct CredentialStore {
    vault: Arc<Vault>,
    records: Mutex<HashMap<String, RecordHandle>>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(vault: Arc<Vault>) -> Self {
        Self {
            vault,
            records: Mutex::new(HashMap::new()),
        }
    }

    pub(crate) fn vault(&self) -> &Vault {
        &self.vault
    }

    /// Create an identity: validate the password and email, mint a salt,
    /// digest the password, and seal the PII fields.
    ///
    /// # Errors
    /// `DuplicateUsername`, `WeakPassword` naming the missing class, or
    /// `InvalidEmail`; `Internal` if sealing fails.
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        secret_material: &[u8],
    ) -> Result<IdentitySummary, RegistrationError> {
        policy::check_password_strength(password).map_err(RegistrationError::WeakPassword)?;

        let email = policy::normalize_email(email);
        if !policy::valid_email(&email) {
            return Err(RegistrationError::InvalidEmail);
        }

        let salt = hash::generate_salt();
        let digest = hash::derive(password.as_bytes(), &salt).map_err(|err| {
            error!("failed to derive password digest: {err}");
            RegistrationError::Internal
        })?;
        let encrypted_email = self.vault.seal(email.as_bytes()).map_err(|err| {
            error!("failed to seal email: {err}");
            RegistrationError::Internal
        })?;
        let encrypted_secret_key = self.vault.seal(secret_material).map_err(|err| {
            error!("failed to seal secret material: {err}");
            RegistrationError::Internal
        })?;

        let record = IdentityRecord {
            username: username.to_string(),
            password_digest: digest,
            password_salt: salt,
            encrypted_email,
            encrypted_secret_key,
            failed_attempts: 0,
            lock_state: LockState::Open,
            active_challenge: None,
        };

        let mut records = self.records.lock().await;
        if records.contains_key(username) {
            return Err(RegistrationError::DuplicateUsername);
        }
        records.insert(username.to_string(), Arc::new(Mutex::new(record)));
        drop(records);

        info!(username = %username, "registered new identity");
        Ok(IdentitySummary {
            username: username.to_string(),
        })
    }

    /// Resolve the lock handle for one record; the registry lock is released
    /// before the caller touches the record.
    pub(crate) async fn handle(&self, username: &str) -> Option<RecordHandle> {
        self.records.lock().await.get(username).map(Arc::clone)
    }

    /// Snapshot a record.
    ///
    /// # Errors
    /// `StoreError::NotFound` for an unknown username.
    pub async fn find(&self, username: &str) -> Result<IdentityRecord, StoreError> {
        let handle = self.handle(username).await.ok_or(StoreError::NotFound)?;
        let record = handle.lock().await;
        Ok(record.clone())
    }

    /// Register one verified-wrong-password event; returns the new count.
    ///
    /// # Errors
    /// `StoreError::NotFound` for an unknown username.
    pub async fn record_failure(&self, username: &str) -> Result<u32, StoreError> {
        let handle = self.handle(username).await.ok_or(StoreError::NotFound)?;
        let mut record = handle.lock().await;
        Ok(record.apply_failure())
    }

    /// Reset the failure counter and reopen the record after a successful
    /// authentication.
    ///
    /// # Errors
    /// `StoreError::NotFound` for an unknown username.
    pub async fn record_success(&self, username: &str) -> Result<(), StoreError> {
        let handle = self.handle(username).await.ok_or(StoreError::NotFound)?;
        let mut record = handle.lock().await;
        record.apply_success();
        Ok(())
    }

    /// Change the password: fresh salt, fresh digest, old salt discarded.
    ///
    /// # Errors
    /// `WeakPassword` if the new password fails policy, `NotFound` for an
    /// unknown username.
    pub async fn update_password(
        &self,
        username: &str,
        new_password: &str,
    ) -> Result<(), StoreError> {
        policy::check_password_strength(new_password).map_err(StoreError::WeakPassword)?;

        let handle = self.handle(username).await.ok_or(StoreError::NotFound)?;
        let mut record = handle.lock().await;

        let salt = hash::generate_salt();
        let digest = hash::derive(new_password.as_bytes(), &salt)?;
        record.password_salt = salt;
        record.password_digest = digest;
        drop(record);

        info!(username = %username, "password updated");
        Ok(())
    }

    /// Administrative lock toggle; `Locked` is reachable only through here.
    ///
    /// # Errors
    /// `StoreError::NotFound` for an unknown username.
    pub async fn set_locked(&self, username: &str, locked: bool) -> Result<(), StoreError> {
        let handle = self.handle(username).await.ok_or(StoreError::NotFound)?;
        let mut record = handle.lock().await;
        record.lock_state = if locked {
            LockState::Locked
        } else {
            LockState::Open
        };
        record.active_challenge = None;
        drop(record);

        info!(username = %username, locked = locked, "lock state changed");
        Ok(())
    }

    /// Delete the identity outright; no tombstone is kept.
    ///
    /// # Errors
    /// `StoreError::NotFound` for an unknown username.
    pub async fn remove(&self, username: &str) -> Result<(), StoreError> {
        let removed = self.records.lock().await.remove(username);
        if removed.is_none() {
            return Err(StoreError::NotFound);
        }
        info!(username = %username, "identity removed");
        Ok(())
    }

    /// Decrypt the stored PII for authorized internal callers.
    ///
    /// # Errors
    /// `StoreError::NotFound` for an unknown username;
    /// `StoreError::Integrity` when an envelope fails verification, logged
    /// and propagated distinctly so operators can tell corruption from a
    /// wrong password.
    pub async fn reveal_pii(&self, username: &str) -> Result<PiiBundle, StoreError> {
        let handle = self.handle(username).await.ok_or(StoreError::NotFound)?;
        let record = handle.lock().await;

        let email_bytes = self.vault.open(&record.encrypted_email).map_err(|err| {
            error!(username = %record.username, "email envelope rejected: {err}");
            err
        })?;
        let email = String::from_utf8(email_bytes).map_err(|_| {
            error!(username = %record.username, "email envelope decoded to invalid utf-8");
            StoreError::Integrity(VaultError::TamperedOrInvalid)
        })?;
        let secret_material = self.vault.open(&record.encrypted_secret_key).map_err(|err| {
            error!(username = %record.username, "secret-key envelope rejected: {err}");
            err
        })?;

        Ok(PiiBundle {
            email,
            secret_material,
        })
    }
}
