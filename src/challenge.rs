//! One-time step-up challenge codes and their delivery seam.
//!
//! Flow Overview:
//! 1) After repeated password failures the orchestrator asks for a challenge.
//! 2) `ChallengeIssuer::issue` mints a short-lived numeric code and hands it
//!    to a [`Notifier`] on a background task, so issuance never waits on the
//!    delivery channel.
//! 3) The first verification attempt consumes the token, match or not, which
//!    leaves nothing for a second guess against the same code.
//!
//! Delivery failures are logged and do not block issuance; the token still
//! expires on its own schedule.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use rand::{rngs::OsRng, Rng};
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

/// Digits in a challenge code.
pub const CODE_LEN: usize = 6;

const DEFAULT_CHALLENGE_TTL: Duration = Duration::from_secs(10 * 60);

/// Outcome of verifying a submitted code against a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChallengeOutcome {
    Accepted,
    Expired,
    AlreadyConsumed,
    Mismatch,
}

/// An ephemeral one-time code, owned by exactly one identity record.
#[derive(Clone)]
pub struct ChallengeToken {
    code: String,
    issued_at: Instant,
    expires_at: Instant,
    consumed: bool,
}

impl ChallengeToken {
    fn mint(ttl: Duration) -> Self {
        let issued_at = Instant::now();
        Self {
            code: generate_code(),
            issued_at,
            expires_at: issued_at + ttl,
            consumed: false,
        }
    }

    #[must_use]
    pub fn issued_at(&self) -> Instant {
        self.issued_at
    }

    #[must_use]
    pub fn expires_at(&self) -> Instant {
        self.expires_at
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed
    }

    /// A token that can still be redeemed: neither consumed nor expired.
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.consumed && !self.is_expired()
    }

    /// Check `submitted` against the code, consuming the token on the first
    /// attempt regardless of the outcome. A mismatch never re-issues; that
    /// decision belongs to the caller.
    pub fn verify(&mut self, submitted: &str) -> ChallengeOutcome {
        if self.consumed {
            return ChallengeOutcome::AlreadyConsumed;
        }
        self.consumed = true;

        if self.is_expired() {
            return ChallengeOutcome::Expired;
        }
        if bool::from(submitted.as_bytes().ct_eq(self.code.as_bytes())) {
            ChallengeOutcome::Accepted
        } else {
            ChallengeOutcome::Mismatch
        }
    }
}

// The code must not end up in debug dumps of identity records.
impl fmt::Debug for ChallengeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChallengeToken")
            .field("issued_at", &self.issued_at)
            .field("expires_at", &self.expires_at)
            .field("consumed", &self.consumed)
            .finish_non_exhaustive()
    }
}

fn generate_code() -> String {
    let value: u32 = OsRng.gen_range(0..1_000_000);
    format!("{value:06}")
}

/// Delivery abstraction for the external email/SMS collaborator.
pub trait Notifier: Send + Sync {
    /// Deliver a challenge code or return an error to have the failure logged.
    ///
    /// # Errors
    /// Implementations report transport failures; the issuer logs them and
    /// moves on.
    fn deliver(&self, recipient: &str, code: &str) -> Result<()>;
}

/// Dev/demo notifier that logs the code instead of sending real mail.
#[derive(Clone, Debug)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, recipient: &str, code: &str) -> Result<()> {
        debug!(recipient = %recipient, code = %code, "challenge delivery stub");
        Ok(())
    }
}

/// Mints challenge tokens and dispatches their codes out of band.
pub struct ChallengeIssuer {
    ttl: Duration,
    notifier: Arc<dyn Notifier>,
}

impl ChallengeIssuer {
    #[must_use]
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            ttl: DEFAULT_CHALLENGE_TTL,
            notifier,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Mint a token and hand its code to the notifier on a background task.
    ///
    /// Returns as soon as the token exists; delivery is fire-and-forget and
    /// a failed dispatch is logged, never surfaced to the login path.
    /// Must be called from within a Tokio runtime.
    pub fn issue(&self, recipient: &str) -> ChallengeToken {
        let token = ChallengeToken::mint(self.ttl);

        let notifier = Arc::clone(&self.notifier);
        let recipient = recipient.to_string();
        let code = token.code.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.deliver(&recipient, &code) {
                warn!(recipient = %recipient, "challenge delivery failed: {err}");
            }
        });

        info!("challenge issued");
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct CapturingNotifier {
        delivered: Mutex<Vec<(String, String)>>,
    }

    impl CapturingNotifier {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                delivered: Mutex::new(Vec::new()),
            })
        }
    }

    impl Notifier for CapturingNotifier {
        fn deliver(&self, recipient: &str, code: &str) -> Result<()> {
            self.delivered
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .push((recipient.to_string(), code.to_string()));
            Ok(())
        }
    }

    #[test]
    fn codes_are_six_digits() {
        for _ in 0..32 {
            let code = generate_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn verify_accepts_matching_code_once() {
        let mut token = ChallengeToken::mint(Duration::from_secs(60));
        let code = token.code.clone();
        assert!(token.is_live());
        assert_eq!(token.verify(&code), ChallengeOutcome::Accepted);
        // second attempt with the very same code is refused
        assert_eq!(token.verify(&code), ChallengeOutcome::AlreadyConsumed);
    }

    #[test]
    fn mismatch_consumes_the_token() {
        let mut token = ChallengeToken::mint(Duration::from_secs(60));
        let code = token.code.clone();
        assert_eq!(token.verify("000001"), ChallengeOutcome::Mismatch);
        assert!(token.is_consumed());
        // the correct code no longer redeems
        assert_eq!(token.verify(&code), ChallengeOutcome::AlreadyConsumed);
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut token = ChallengeToken::mint(Duration::ZERO);
        let code = token.code.clone();
        assert!(token.is_expired());
        assert!(!token.is_live());
        assert_eq!(token.verify(&code), ChallengeOutcome::Expired);
    }

    #[tokio::test]
    async fn issue_dispatches_code_to_notifier() {
        let notifier = CapturingNotifier::new();
        let issuer = ChallengeIssuer::new(Arc::clone(&notifier) as Arc<dyn Notifier>);

        let token = issuer.issue("user@example.com");
        tokio::task::yield_now().await;

        let delivered = notifier
            .delivered
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "user@example.com");
        assert_eq!(delivered[0].1, token.code);
    }

    #[test]
    fn debug_output_redacts_the_code() {
        let token = ChallengeToken::mint(Duration::from_secs(60));
        let dump = format!("{token:?}");
        assert!(!dump.contains("code:"));
        assert!(dump.contains("consumed"));
    }
}
