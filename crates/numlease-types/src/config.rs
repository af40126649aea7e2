//! Process-wide configuration.
//!
//! Loaded once at startup and read-only afterwards. Every field has a
//! default, so a config file only needs to name what it overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{LeaseError, Result, constants};

/// Policy values for the lease subsystem and its front door.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Candidate draws per random allocation.
    pub max_random_attempts: usize,
    /// Chance that polling an active lease delivers a code, in `[0, 1]`.
    pub delivery_probability: f64,
    /// Digits in a delivered code.
    pub code_length: usize,
    /// Message body for a delivered code; `{code}` is substituted.
    pub sms_template: String,
    /// Admission gate capacity.
    pub admission_permits: usize,
    /// Lock shards in the number book.
    pub store_shards: usize,
    /// Per-account rate limit. `None` disables it.
    pub rate_limit: Option<RateLimitConfig>,
    /// Lifetime of issued sessions, in seconds.
    pub session_ttl_secs: i64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self {
            max_random_attempts: constants::DEFAULT_MAX_RANDOM_ATTEMPTS,
            delivery_probability: constants::DEFAULT_DELIVERY_PROBABILITY,
            code_length: constants::DEFAULT_CODE_LENGTH,
            sms_template: constants::DEFAULT_SMS_TEMPLATE.to_string(),
            admission_permits: constants::DEFAULT_ADMISSION_PERMITS,
            store_shards: constants::DEFAULT_STORE_SHARDS,
            rate_limit: Some(RateLimitConfig::default()),
            session_ttl_secs: constants::DEFAULT_SESSION_TTL_SECS,
        }
    }
}

impl LeaseConfig {
    /// Parse and validate a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| LeaseError::Configuration(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            LeaseError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&raw)
    }

    /// Reject values the subsystem cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_random_attempts == 0 {
            return Err(LeaseError::Configuration(
                "max_random_attempts must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.delivery_probability) {
            return Err(LeaseError::Configuration(format!(
                "delivery_probability must be within [0, 1], got {}",
                self.delivery_probability
            )));
        }
        if !(1..=12).contains(&self.code_length) {
            return Err(LeaseError::Configuration(format!(
                "code_length must be within 1..=12, got {}",
                self.code_length
            )));
        }
        if self.admission_permits == 0 {
            return Err(LeaseError::Configuration(
                "admission_permits must be at least 1".into(),
            ));
        }
        if self.store_shards == 0 {
            return Err(LeaseError::Configuration(
                "store_shards must be at least 1".into(),
            ));
        }
        if self.session_ttl_secs <= 0 {
            return Err(LeaseError::Configuration(
                "session_ttl_secs must be positive".into(),
            ));
        }
        if let Some(limit) = &self.rate_limit {
            if limit.max_calls == 0 || limit.window_ms == 0 {
                return Err(LeaseError::Configuration(
                    "rate_limit needs max_calls and window_ms above zero".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Sliding-window rate limit per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: constants::DEFAULT_RATE_LIMIT_CALLS,
            window_ms: constants::DEFAULT_RATE_LIMIT_WINDOW_MS,
        }
    }
}
