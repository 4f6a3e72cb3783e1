//! # Token Provider
//!
//! Issues, rotates, and validates every token the subsystem produces. One
//! provider instance owns the key material, the refresh-token store, and
//! the issuance settings; everything else routes through it.
//!
//! ## Operations
//!
//! | Operation               | Keys      | Shape                               |
//! |-------------------------|-----------|-------------------------------------|
//! | `create_token`          | JWT       | Access / identity / refresh triple  |
//! | `refresh_token`         | JWT       | Rotates a refresh token, single use |
//! | `authenticate`          | JWT       | Compact token to [`Principal`]      |
//! | `create_jws`            | JWS       | Detached payload-digest signature   |
//! | `validate_jws`          | JWS       | Digest recomputed, compared CT      |
//! | `create_jwe`            | JWE       | Signed-then-encrypted JSON payload  |
//! | `extract_data_from_jwe` | JWE       | Opens and verifies the payload      |
//!
//! ## Envelope Policy
//!
//! With [`TokenSettings::jwe_enabled`] set, the auth-token triple travels
//! encrypted: each signed token is sealed for the JWT key pair and the
//! transmitted form has five segments. Validation accepts both shapes
//! through the same path, so the flag can be toggled without invalidating
//! outstanding tokens.
//!
//! ## Refresh Rotation
//!
//! A refresh token is single use. Rotation looks the presented token up in
//! the store and then removes it; the removal is the commit point, so a
//! replayed token loses the race and surfaces as
//! [`SecurityError::RevokedOrUnknownToken`].

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::debug;

use warden_policy::Principal;

use crate::claims::{Token, TokenClaims, TOKEN_TYPE_BEARER};
use crate::codec::{self, TokenShape};
use crate::error::SecurityError;
use crate::jwks::JwkSet;
use crate::keys::KeyMaterial;
use crate::store::{TokenRecord, TokenStore};

// ─── Settings ──────────────────────────────────────────────────────────────

/// The identity whose display attributes back identity tokens. When a
/// refresh arrives without an authenticated caller, a subject matching
/// `username` is re-granted these authorities.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityProfile {
    pub username: String,
    pub name: String,
    pub email: String,
    pub authorities: Vec<String>,
}

impl Default for IdentityProfile {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            name: "Administrator".to_string(),
            email: "admin@warden.local".to_string(),
            authorities: vec![
                warden_policy::authority::ADMIN.to_string(),
                warden_policy::authority::USER.to_string(),
            ],
        }
    }
}

/// Issuance settings. All lifetimes are seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSettings {
    pub issuer: String,
    /// Encrypt the auth-token triple after signing.
    pub jwe_enabled: bool,
    pub access_token_ttl_secs: i64,
    pub id_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub jws_ttl_secs: i64,
    pub jwe_ttl_secs: i64,
    pub identity: IdentityProfile,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            issuer: "warden".to_string(),
            jwe_enabled: true,
            access_token_ttl_secs: 3_600,
            id_token_ttl_secs: 3_600,
            refresh_token_ttl_secs: 86_400,
            jws_ttl_secs: 3_600,
            jwe_ttl_secs: 3_600,
            identity: IdentityProfile::default(),
        }
    }
}

impl TokenSettings {
    fn access_ttl(&self) -> Duration {
        Duration::seconds(self.access_token_ttl_secs)
    }

    fn id_ttl(&self) -> Duration {
        Duration::seconds(self.id_token_ttl_secs)
    }

    fn refresh_ttl(&self) -> Duration {
        Duration::seconds(self.refresh_token_ttl_secs)
    }

    fn jws_ttl(&self) -> Duration {
        Duration::seconds(self.jws_ttl_secs)
    }

    fn jwe_ttl(&self) -> Duration {
        Duration::seconds(self.jwe_ttl_secs)
    }
}

// ─── Provider ──────────────────────────────────────────────────────────────

pub struct TokenProvider {
    keys: Arc<KeyMaterial>,
    store: Arc<dyn TokenStore>,
    settings: TokenSettings,
}

impl TokenProvider {
    pub fn new(
        keys: Arc<KeyMaterial>,
        store: Arc<dyn TokenStore>,
        settings: TokenSettings,
    ) -> Self {
        Self {
            keys,
            store,
            settings,
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.settings
    }

    /// Public keys of all three pairs as a JWK set.
    pub fn jwks(&self) -> JwkSet {
        JwkSet::from_material(&self.keys)
    }

    // ─── Auth-token triple ─────────────────────────────────────────────────

    /// Issue an access / identity / refresh triple for `principal` and
    /// record the refresh token for later rotation.
    pub async fn create_token(&self, principal: &Principal) -> Result<Token, SecurityError> {
        let now = Utc::now();
        let settings = &self.settings;
        let subject = principal.subject();

        let access = TokenClaims::access(
            subject,
            principal.authorities(),
            &settings.issuer,
            now,
            settings.access_ttl(),
        );
        let (name, email) = self.identity_attributes(subject);
        let id = TokenClaims::id(subject, name, email, &settings.issuer, now, settings.id_ttl());
        let refresh = TokenClaims::refresh(subject, &settings.issuer, now, settings.refresh_ttl());

        let access_token = self.emit(&access)?;
        let id_token = self.emit(&id)?;
        let refresh_token = self.emit(&refresh)?;

        // The record keys on the transmitted form, which is what a caller
        // presents back at rotation time.
        self.store
            .store_token(TokenRecord::new(
                refresh_token.clone(),
                subject,
                now + settings.refresh_ttl(),
            ))
            .await?;

        debug!(subject, wrapped = settings.jwe_enabled, "issued token triple");

        Ok(Token {
            access_token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            access_token_expires_in: settings.access_token_ttl_secs,
            id_token,
            id_token_expires_in: settings.id_token_ttl_secs,
            refresh_token,
            refresh_token_expires_in: settings.refresh_token_ttl_secs,
        })
    }

    /// Rotate `presented` into a fresh triple. The presented token must be
    /// valid, known to the store, and not yet rotated; when `caller` is
    /// given, its subject must match the token's.
    pub async fn refresh_token(
        &self,
        caller: Option<&Principal>,
        presented: &str,
    ) -> Result<Token, SecurityError> {
        let claims = self.parse_token(presented)?;
        let subject = claims
            .sub
            .clone()
            .ok_or_else(|| SecurityError::MalformedToken("refresh token has no subject".into()))?;

        if let Some(caller) = caller {
            if caller.subject() != subject {
                return Err(SecurityError::SubjectMismatch);
            }
        }

        let known = self
            .store
            .get_tokens(&subject)
            .await?
            .iter()
            .any(|record| record.token() == presented);
        if !known {
            return Err(SecurityError::RevokedOrUnknownToken);
        }
        // Membership above is advisory; this removal is the commit point
        // that makes rotation single use under concurrency.
        if !self.store.invalidate_token(presented).await? {
            return Err(SecurityError::RevokedOrUnknownToken);
        }

        let principal = match caller {
            Some(caller) => caller.clone(),
            None => self.rebuild_principal(&subject),
        };
        debug!(subject, "rotated refresh token");
        self.create_token(&principal).await
    }

    /// Drop every stored refresh token for `subject`.
    pub async fn invalidate_all(&self, subject: &str) -> Result<(), SecurityError> {
        self.store.invalidate_all_tokens(subject).await?;
        debug!(subject, "invalidated all refresh tokens");
        Ok(())
    }

    /// Validate a compact token of either shape and return its claims.
    /// This is the one parsing path: wrapped tokens are opened first, and
    /// the payload of an envelope must itself be a plain signed token.
    pub fn parse_token(&self, token: &str) -> Result<TokenClaims, SecurityError> {
        let inner = match codec::classify(token)? {
            TokenShape::Plain => return self.verify_plain(token),
            TokenShape::Wrapped => codec::open(token, self.keys.jwt().private())?,
        };
        let inner = String::from_utf8(inner)
            .map_err(|_| SecurityError::MalformedToken("envelope payload is not UTF-8".into()))?;
        match codec::classify(&inner)? {
            TokenShape::Plain => self.verify_plain(&inner),
            TokenShape::Wrapped => Err(SecurityError::MalformedToken(
                "envelopes cannot nest".into(),
            )),
        }
    }

    /// Validate a compact token and derive the caller it represents.
    pub fn authenticate(&self, token: &str) -> Result<Principal, SecurityError> {
        self.parse_token(token)?
            .to_principal()
            .ok_or_else(|| SecurityError::MalformedToken("token has no subject".into()))
    }

    // ─── Detached signatures ───────────────────────────────────────────────

    /// Sign `payload` detached: the token carries the SHA-256 digest of the
    /// payload, not the payload itself.
    pub fn create_jws(&self, payload: &[u8]) -> Result<String, SecurityError> {
        let digest = hex::encode(Sha256::digest(payload));
        let claims = TokenClaims::detached_signature(
            &digest,
            &self.settings.issuer,
            Utc::now(),
            self.settings.jws_ttl(),
        );
        codec::sign_claims(&claims, self.keys.jws())
    }

    /// Check a detached signature against `payload`. The digest comparison
    /// is constant time.
    pub fn validate_jws(
        &self,
        token: &str,
        payload: &[u8],
    ) -> Result<TokenClaims, SecurityError> {
        let claims = codec::verify_claims(token, self.keys.jws(), &self.settings.issuer)?;
        let carried = claims.data_str().ok_or_else(|| {
            SecurityError::MalformedToken("signature token has no digest claim".into())
        })?;
        let expected = hex::encode(Sha256::digest(payload));
        if expected.as_bytes().ct_eq(carried.as_bytes()).into() {
            Ok(claims)
        } else {
            Err(SecurityError::InvalidSignature(
                "payload digest mismatch".into(),
            ))
        }
    }

    // ─── Payload envelopes ─────────────────────────────────────────────────

    /// Sign `payload` into a claim set, then seal it for the JWE pair.
    pub fn create_jwe(&self, payload: &serde_json::Value) -> Result<String, SecurityError> {
        let claims = TokenClaims::payload(
            payload.clone(),
            &self.settings.issuer,
            Utc::now(),
            self.settings.jwe_ttl(),
        );
        let signed = codec::sign_claims(&claims, self.keys.jwe())?;
        codec::seal(signed.as_bytes(), self.keys.jwe().public())
    }

    /// Open a payload envelope and return the carried JSON value. Failures
    /// surface as malformed or expired only; an envelope whose inner
    /// signature does not verify is indistinguishable from a corrupt one.
    pub fn extract_data_from_jwe(
        &self,
        token: &str,
    ) -> Result<serde_json::Value, SecurityError> {
        if codec::classify(token)? != TokenShape::Wrapped {
            return Err(SecurityError::MalformedToken(
                "payload envelopes have five segments".into(),
            ));
        }
        let inner = codec::open(token, self.keys.jwe().private())?;
        let inner = String::from_utf8(inner)
            .map_err(|_| SecurityError::MalformedToken("envelope payload is not UTF-8".into()))?;
        if codec::classify(&inner)? != TokenShape::Plain {
            return Err(SecurityError::MalformedToken(
                "envelopes cannot nest".into(),
            ));
        }
        let claims = codec::verify_claims(&inner, self.keys.jwe(), &self.settings.issuer)
            .map_err(|e| match e {
                SecurityError::ExpiredToken => SecurityError::ExpiredToken,
                _ => SecurityError::MalformedToken(
                    "envelope payload does not verify".into(),
                ),
            })?;
        claims.data.ok_or_else(|| {
            SecurityError::MalformedToken("envelope has no payload claim".into())
        })
    }

    // ─── Internals ─────────────────────────────────────────────────────────

    /// Sign with the JWT pair and, when enabled, seal for transport.
    fn emit(&self, claims: &TokenClaims) -> Result<String, SecurityError> {
        let signed = codec::sign_claims(claims, self.keys.jwt())?;
        if self.settings.jwe_enabled {
            codec::seal(signed.as_bytes(), self.keys.jwt().public())
        } else {
            Ok(signed)
        }
    }

    fn verify_plain(&self, token: &str) -> Result<TokenClaims, SecurityError> {
        codec::verify_claims(token, self.keys.jwt(), &self.settings.issuer)
    }

    fn identity_attributes(&self, subject: &str) -> (Option<String>, Option<String>) {
        let identity = &self.settings.identity;
        if subject == identity.username {
            (Some(identity.name.clone()), Some(identity.email.clone()))
        } else {
            (None, None)
        }
    }

    /// Principal for an unauthenticated rotation. Only the configured
    /// identity gets its authorities back; anyone else starts empty.
    fn rebuild_principal(&self, subject: &str) -> Principal {
        let identity = &self.settings.identity;
        if subject == identity.username {
            Principal::new(subject, identity.authorities.clone())
        } else {
            Principal::new(subject, Vec::new())
        }
    }
}
