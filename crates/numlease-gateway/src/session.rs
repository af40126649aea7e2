//! Credential → account resolution.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};
use numlease_types::{AccountId, CredentialFailure, LeaseError, Result, constants};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Resolves a caller credential to the account it speaks for.
pub trait SessionResolver: Send + Sync {
    fn resolve(&self, credential: &str) -> Result<AccountId>;
}

#[derive(Debug, Clone, Copy)]
struct Session {
    account: AccountId,
    expires_at: DateTime<Utc>,
}

/// Opaque bearer tokens held in memory.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `account`, valid for `ttl`. Expired sessions
    /// are dropped on the way.
    pub fn issue(&self, account: AccountId, ttl: Duration) -> Result<String> {
        self.issue_at(account, ttl, Utc::now())
    }

    fn issue_at(&self, account: AccountId, ttl: Duration, now: DateTime<Utc>) -> Result<String> {
        let token: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(constants::SESSION_TOKEN_LENGTH)
            .map(char::from)
            .collect();
        let session = Session {
            account,
            expires_at: now + ttl,
        };
        let mut sessions = self.sessions.write()?;
        sessions.retain(|_, s| now < s.expires_at);
        sessions.insert(token.clone(), session);
        drop(sessions);
        tracing::debug!(%account, expires_at = %session.expires_at, "Session issued");
        Ok(token)
    }

    /// Resolve `token` as of `now`.
    pub fn resolve_at(&self, token: &str, now: DateTime<Utc>) -> Result<AccountId> {
        let sessions = self.sessions.read()?;
        let session = sessions.get(token).ok_or(LeaseError::CredentialInvalid {
            reason: CredentialFailure::Invalid,
        })?;
        if now >= session.expires_at {
            return Err(LeaseError::CredentialInvalid {
                reason: CredentialFailure::Expired,
            });
        }
        Ok(session.account)
    }

    /// Invalidate `token`. Returns whether it existed.
    pub fn revoke(&self, token: &str) -> Result<bool> {
        Ok(self.sessions.write()?.remove(token).is_some())
    }

    /// Forget every expired session.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut sessions = self.sessions.write()?;
        let before = sessions.len();
        sessions.retain(|_, s| now < s.expires_at);
        Ok(before - sessions.len())
    }
}

impl SessionResolver for SessionTable {
    fn resolve(&self, credential: &str) -> Result<AccountId> {
        self.resolve_at(credential, Utc::now())
    }
}
