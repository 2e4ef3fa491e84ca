//! Policy configuration for the authentication core.
//!
//! Explicit process-scoped context: every policy value is carried by an
//! [`AuthConfig`] handed to [`Orchestrator::initialize`], never read from
//! ambient globals.
//!
//! [`Orchestrator::initialize`]: super::Orchestrator::initialize

use std::time::Duration;

use crate::vault::VaultError;

const DEFAULT_ATTEMPT_THRESHOLD: u32 = 3;
const DEFAULT_CHALLENGE_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_HOURLY_ATTEMPT_LIMIT: u32 = 50;
const DEFAULT_DAILY_ATTEMPT_LIMIT: u32 = 200;

/// Fatal startup misconfiguration; the core refuses to initialize.
#[derive(Debug, thiserror::Error)]
pub enum ConfigurationError {
    #[error("master key is missing or malformed")]
    MasterKey(#[source] VaultError),
    #[error("invalid policy value: {0}")]
    InvalidPolicy(&'static str),
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    attempt_threshold: u32,
    challenge_ttl: Duration,
    hourly_attempt_limit: u32,
    daily_attempt_limit: u32,
}

impl AuthConfig {
    /// Default policy: challenge after 3 failed passwords, 10-minute codes,
    /// 50 attempts per origin per hour and 200 per day.
    #[must_use]
    pub fn new() -> Self {
        Self {
            attempt_threshold: DEFAULT_ATTEMPT_THRESHOLD,
            challenge_ttl: Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECONDS),
            hourly_attempt_limit: DEFAULT_HOURLY_ATTEMPT_LIMIT,
            daily_attempt_limit: DEFAULT_DAILY_ATTEMPT_LIMIT,
        }
    }

    #[must_use]
    pub fn with_attempt_threshold(mut self, threshold: u32) -> Self {
        self.attempt_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_challenge_ttl(mut self, ttl: Duration) -> Self {
        self.challenge_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_hourly_attempt_limit(mut self, limit: u32) -> Self {
        self.hourly_attempt_limit = limit;
        self
    }

    #[must_use]
    pub fn with_daily_attempt_limit(mut self, limit: u32) -> Self {
        self.daily_attempt_limit = limit;
        self
    }

    #[must_use]
    pub fn attempt_threshold(&self) -> u32 {
        self.attempt_threshold
    }

    #[must_use]
    pub fn challenge_ttl(&self) -> Duration {
        self.challenge_ttl
    }

    #[must_use]
    pub fn hourly_attempt_limit(&self) -> u32 {
        self.hourly_attempt_limit
    }

    #[must_use]
    pub fn daily_attempt_limit(&self) -> u32 {
        self.daily_attempt_limit
    }

    /// Reject policy values no deployment can mean.
    ///
    /// # Errors
    /// `ConfigurationError::InvalidPolicy` for a zero threshold or zero
    /// rate-limit budget.
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if self.attempt_threshold == 0 {
            return Err(ConfigurationError::InvalidPolicy(
                "attempt threshold must be at least 1",
            ));
        }
        if self.hourly_attempt_limit == 0 || self.daily_attempt_limit == 0 {
            return Err(ConfigurationError::InvalidPolicy(
                "rate-limit budgets must be at least 1",
            ));
        }
        Ok(())
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_overrides() {
        let config = AuthConfig::new();
        assert_eq!(config.attempt_threshold(), DEFAULT_ATTEMPT_THRESHOLD);
        assert_eq!(
            config.challenge_ttl(),
            Duration::from_secs(DEFAULT_CHALLENGE_TTL_SECONDS)
        );
        assert_eq!(config.hourly_attempt_limit(), DEFAULT_HOURLY_ATTEMPT_LIMIT);
        assert_eq!(config.daily_attempt_limit(), DEFAULT_DAILY_ATTEMPT_LIMIT);

        let config = config
            .with_attempt_threshold(5)
            .with_challenge_ttl(Duration::from_secs(120))
            .with_hourly_attempt_limit(10)
            .with_daily_attempt_limit(20);
        assert_eq!(config.attempt_threshold(), 5);
        assert_eq!(config.challenge_ttl(), Duration::from_secs(120));
        assert_eq!(config.hourly_attempt_limit(), 10);
        assert_eq!(config.daily_attempt_limit(), 20);
    }

    #[test]
    fn validate_rejects_zero_policies() {
        assert!(AuthConfig::new().validate().is_ok());
        assert!(AuthConfig::new()
            .with_attempt_threshold(0)
            .validate()
            .is_err());
        assert!(AuthConfig::new()
            .with_hourly_attempt_limit(0)
            .validate()
            .is_err());
        assert!(AuthConfig::new()
            .with_daily_attempt_limit(0)
            .validate()
            .is_err());
    }
}
