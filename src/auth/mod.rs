//! Login orchestration: the attempt state machine and its decision surface.
//!
//! Flow Overview:
//! 1) Every attempt is charged against the origin's rate budget before any
//!    credential work happens.
//! 2) Password attempts verify against the stored digest under the record's
//!    lock, so concurrent attempts against one username serialize and the
//!    failure counter cannot be double-spent past the threshold.
//! 3) The third verified failure gates the identity behind a one-time code
//!    delivered out of band; password-only logins deny until the code is
//!    redeemed.
//! 4) A rejected, expired, or replayed code keeps the identity gated; the
//!    next login attempt mints a fresh challenge.
//!
//! Denials are ordinary [`AuthDecision`] values. Unknown usernames run the
//! same digest verification as wrong passwords against a decoy record, so
//! neither the decision shape nor the work done betrays which usernames
//! exist.

mod config;
mod rate_limit;

pub use config::{AuthConfig, ConfigurationError};
pub use rate_limit::{NoopRateLimiter, RateLimitDecision, RateLimiter, SlidingWindowRateLimiter};


use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::challenge::{ChallengeIssuer, ChallengeOutcome, ChallengeToken, Notifier};
use crate::hash;
use crate::store::{
    CredentialStore, IdentityRecord, IdentitySummary, LockState, PiiBundle, RegistrationError,
    StoreError,
};
use crate::vault::{MasterKey, Vault, VaultError};

/// The externally observable outcome of one authentication call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthDecision {
    Authenticated,
    ChallengeRequired,
    Denied,
    RateLimited,
}

/// Operational failure inside an authentication call. Distinct from a
/// denial: corruption and misconfiguration are never downgraded to
/// [`AuthDecision::Denied`].
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Sequences login attempts over the credential store, challenge issuer,
/// and rate limiter.
pub struct Orchestrator {
    store: Arc<CredentialStore>,
    issuer: ChallengeIssuer,
    limiter: Arc<dyn RateLimiter>,
    threshold: u32,
    decoy_salt: [u8; hash::SALT_LEN],
    decoy_digest: [u8; hash::DIGEST_LEN],
}

impl Orchestrator {
    /// Build the whole core from explicit context: policy, master key
    /// material, and the delivery collaborator. Nothing here is ambient;
    /// until this returns `Ok`, no orchestrator call is accepted anywhere.
    ///
    /// # Errors
    /// `ConfigurationError::MasterKey` when the key material is missing or
    /// malformed, `ConfigurationError::InvalidPolicy` for unusable policy
    /// values. Both are fatal; callers should abort startup.
    pub fn initialize(
        config: &AuthConfig,
        master_key_material: &[u8],
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let master_key =
            MasterKey::from_bytes(master_key_material).map_err(ConfigurationError::MasterKey)?;
        let vault = Arc::new(Vault::new(&master_key));
        let store = Arc::new(CredentialStore::new(vault));
        let issuer = ChallengeIssuer::new(notifier).with_ttl(config.challenge_ttl());
        let limiter: Arc<dyn RateLimiter> = Arc::new(SlidingWindowRateLimiter::new(
            config.hourly_attempt_limit(),
            config.daily_attempt_limit(),
        ));

        let decoy_salt = hash::generate_salt();
        // the decoy never matches anything; it only equalizes work for
        // unknown usernames
        let decoy_digest = hash::derive(b"decoy-for-unknown-usernames", &decoy_salt)
            .unwrap_or([0u8; hash::DIGEST_LEN]);

        info!("authentication core initialized");
        Ok(Self {
            store,
            issuer,
            limiter,
            threshold: config.attempt_threshold(),
            decoy_salt,
            decoy_digest,
        })
    }

    /// Swap the rate limiter, e.g. for a shared cross-instance implementation.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Arc<dyn RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// The underlying store, for administrative surfaces (lock toggles,
    /// password updates, account deletion).
    #[must_use]
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Register a new identity. Boundary call; exposes only the username.
    ///
    /// # Errors
    /// See [`RegistrationError`].
    pub async fn register(
        &self,
        username: &str,
        password: &str,
        email: &str,
        secret_material: &[u8],
    ) -> Result<IdentitySummary, RegistrationError> {
        self.store
            .register(username, password, email, secret_material)
            .await
    }

    /// Decrypted PII passthrough for authorized internal callers only.
    ///
    /// # Errors
    /// Propagates store lookup and integrity failures.
    pub async fn reveal_pii(&self, username: &str) -> Result<PiiBundle, AuthError> {
        Ok(self.store.reveal_pii(username).await?)
    }

    /// One password attempt for `(username, origin)`.
    ///
    /// # Errors
    /// `AuthError` on envelope corruption while escalating to a challenge;
    /// expected negative outcomes are [`AuthDecision`] values, not errors.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        origin: &str,
    ) -> Result<AuthDecision, AuthError> {
        if self.limiter.check(origin) == RateLimitDecision::Limited {
            debug!(origin = %origin, "attempt budget exhausted");
            return Ok(AuthDecision::RateLimited);
        }

        let Some(handle) = self.store.handle(username).await else {
            return Ok(self.deny_unknown(password));
        };
        let mut record = handle.lock().await;

        match record.lock_state {
            LockState::Locked => {
                // burn the same verification work; a locked identity is not
                // distinguishable from a wrong password
                let _ = hash::verify(
                    password.as_bytes(),
                    &record.password_salt,
                    &record.password_digest,
                );
                Ok(AuthDecision::Denied)
            }
            LockState::Open => {
                let correct = hash::verify(
                    password.as_bytes(),
                    &record.password_salt,
                    &record.password_digest,
                )
                .unwrap_or(false);

                if correct {
                    record.apply_success();
                    info!(username = %record.username, "login succeeded");
                    return Ok(AuthDecision::Authenticated);
                }

                let count = record.apply_failure();
                if count >= self.threshold {
                    self.escalate(&mut record)?;
                    Ok(AuthDecision::ChallengeRequired)
                } else {
                    debug!(username = %record.username, failed_attempts = count, "password rejected");
                    Ok(AuthDecision::Denied)
                }
            }
            LockState::ChallengePending => {
                // keep the work profile identical to an open record
                let _ = hash::verify(
                    password.as_bytes(),
                    &record.password_salt,
                    &record.password_digest,
                );

                let live = record
                    .active_challenge
                    .as_ref()
                    .is_some_and(ChallengeToken::is_live);
                if live {
                    // a live code is outstanding; the password alone no
                    // longer authenticates
                    Ok(AuthDecision::Denied)
                } else {
                    // expired or consumed: gate stays, fresh code goes out
                    self.escalate(&mut record)?;
                    Ok(AuthDecision::ChallengeRequired)
                }
            }
        }
    }

    /// One challenge-code attempt for `(username, origin)`.
    ///
    /// # Errors
    /// `AuthError` on store corruption; rejected codes are `Denied`.
    pub async fn submit_challenge(
        &self,
        username: &str,
        code: &str,
        origin: &str,
    ) -> Result<AuthDecision, AuthError> {
        if self.limiter.check(origin) == RateLimitDecision::Limited {
            debug!(origin = %origin, "attempt budget exhausted");
            return Ok(AuthDecision::RateLimited);
        }

        let Some(handle) = self.store.handle(username).await else {
            // comparable work for unknown usernames
            let _ = code.as_bytes().ct_eq(b"000000");
            return Ok(AuthDecision::Denied);
        };
        let mut record = handle.lock().await;

        if record.lock_state == LockState::Locked {
            return Ok(AuthDecision::Denied);
        }

        let outcome = record
            .active_challenge
            .as_mut()
            .map(|token| token.verify(code));

        match outcome {
            None => Ok(AuthDecision::Denied),
            Some(ChallengeOutcome::Accepted) => {
                record.apply_success();
                info!(username = %record.username, "challenge redeemed, login succeeded");
                Ok(AuthDecision::Authenticated)
            }
            Some(outcome) => {
                // token is consumed either way; the identity stays gated
                // and the next login mints a fresh code
                debug!(username = %record.username, ?outcome, "challenge rejected");
                Ok(AuthDecision::Denied)
            }
        }
    }

    /// Gate the record behind a fresh one-time code. Runs under the
    /// record's lock; delivery itself is dispatched off-thread.
    fn escalate(&self, record: &mut IdentityRecord) -> Result<(), AuthError> {
        let email_bytes = self
            .store
            .vault()
            .open(&record.encrypted_email)
            .map_err(|err| {
                warn!(username = %record.username, "cannot address challenge delivery: {err}");
                AuthError::Store(StoreError::Integrity(err))
            })?;
        let email = String::from_utf8(email_bytes).map_err(|_| {
            AuthError::Store(StoreError::Integrity(VaultError::TamperedOrInvalid))
        })?;

        record.active_challenge = Some(self.issuer.issue(&email));
        record.lock_state = LockState::ChallengePending;
        info!(username = %record.username, "identity gated behind step-up challenge");
        Ok(())
    }

    fn deny_unknown(&self, password: &str) -> AuthDecision {
        // same digest cost as a real record; no enumeration oracle
        let _ = hash::verify(password.as_bytes(), &self.decoy_salt, &self.decoy_digest);
        AuthDecision::Denied
    }
}
