//! # Refresh Token Store
//!
//! Persistence seam for issued refresh tokens. The provider records every
//! refresh token it issues and consults the store on rotation; a token that
//! cannot be atomically removed is treated as revoked or never issued.
//!
//! ## Contract
//!
//! | Operation                | Guarantee                                        |
//! |--------------------------|--------------------------------------------------|
//! | `store_token`            | Record visible to later lookups                  |
//! | `get_tokens`             | Active records only, expired treated as absent   |
//! | `invalidate_token`       | Atomic: exactly one caller observes `true`       |
//! | `invalidate_all_tokens`  | Drops every record for the subject               |
//!
//! `invalidate_token` is the commit point of refresh rotation. Two
//! concurrent rotations of the same token race on it, and the loser gets
//! `false`, which the provider surfaces as a revoked-token error.

use std::collections::HashSet;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use crate::error::SecurityError;

#[cfg(feature = "postgres")]
pub mod postgres;

/// One issued refresh token, keyed by its compact form.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TokenRecord {
    token: String,
    subject: String,
    expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn new(
        token: impl Into<String>,
        subject: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            token: token.into(),
            subject: subject.into(),
            expires_at,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Whether the record is still live at `now`.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

// The compact token is a live credential; keep it out of debug output.
impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("token", &"<redacted>")
            .field("subject", &self.subject)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Storage backend for issued refresh tokens.
#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Persist a newly issued record.
    async fn store_token(&self, record: TokenRecord) -> Result<(), SecurityError>;

    /// All active records for `subject`. Expired records never appear.
    async fn get_tokens(&self, subject: &str) -> Result<HashSet<TokenRecord>, SecurityError>;

    /// Atomically remove the record for `token`. Returns `true` iff an
    /// active record was removed by this call.
    async fn invalidate_token(&self, token: &str) -> Result<bool, SecurityError>;

    /// Remove every record for `subject`.
    async fn invalidate_all_tokens(&self, subject: &str) -> Result<(), SecurityError>;
}

// ─── In-memory backend ─────────────────────────────────────────────────────

/// Process-local store backed by a concurrent map keyed by subject.
///
/// Expired records are dropped lazily on lookup; there is no background
/// sweeper. Suitable for single-node deployments and tests.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    tokens: DashMap<String, HashSet<TokenRecord>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn store_token(&self, record: TokenRecord) -> Result<(), SecurityError> {
        self.tokens
            .entry(record.subject.clone())
            .or_default()
            .insert(record);
        Ok(())
    }

    async fn get_tokens(&self, subject: &str) -> Result<HashSet<TokenRecord>, SecurityError> {
        let now = Utc::now();
        match self.tokens.get_mut(subject) {
            Some(mut entry) => {
                entry.value_mut().retain(|record| record.is_active(now));
                Ok(entry.value().clone())
            }
            None => Ok(HashSet::new()),
        }
    }

    async fn invalidate_token(&self, token: &str) -> Result<bool, SecurityError> {
        let now = Utc::now();
        for mut entry in self.tokens.iter_mut() {
            let found = entry
                .value()
                .iter()
                .find(|record| record.token == token)
                .cloned();
            if let Some(record) = found {
                // The shard lock is held across find and remove, so only
                // one caller can take a given record.
                entry.value_mut().remove(&record);
                return Ok(record.is_active(now));
            }
        }
        Ok(false)
    }

    async fn invalidate_all_tokens(&self, subject: &str) -> Result<(), SecurityError> {
        self.tokens.remove(subject);
        Ok(())
    }
}
