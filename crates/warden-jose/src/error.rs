//! # Security Error Taxonomy
//!
//! Every failure the token subsystem can surface, in one enum. Errors from
//! the underlying cryptographic libraries are translated into these variants
//! at the point of use — raw `jsonwebtoken`, `rsa`, or `aes-gcm` error types
//! never cross the crate boundary, and error text never includes token or
//! key material.
//!
//! Client-recoverable variants (missing/malformed/expired/revoked
//! credentials) map to 4xx responses in the HTTP layer; [`Encoding`],
//! [`Store`], and [`KeyMaterial`] are server-side failures.
//!
//! [`Encoding`]: SecurityError::Encoding
//! [`Store`]: SecurityError::Store
//! [`KeyMaterial`]: SecurityError::KeyMaterial

use thiserror::Error;

/// Errors surfaced by the token subsystem and the policy filters built on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecurityError {
    /// A required credential (signature header, token envelope, login
    /// credential) was absent or blank.
    #[error("missing credential: {0}")]
    MissingCredential(String),

    /// The token could not be parsed as a compact JOSE serialization, or a
    /// decrypted payload was not the expected shape.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// Signature verification failed, or a detached-signature hash did not
    /// match the presented payload.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// The token's expiry claim is in the past.
    #[error("token has expired")]
    ExpiredToken,

    /// The refresh token is not among the subject's active tokens — it was
    /// rotated, invalidated, or never issued. Presenting one is the reuse
    /// signal refresh rotation exists to detect.
    #[error("refresh token is revoked or unknown")]
    RevokedOrUnknownToken,

    /// The authenticated caller does not match the token's subject.
    #[error("token subject does not match the authenticated principal")]
    SubjectMismatch,

    /// The rate limiter rejected the request. Carries the limiter metrics
    /// the HTTP layer echoes as response headers.
    #[error("rate limit exceeded: {remaining} of {limit} permits remaining")]
    RateLimitExceeded {
        /// Permits allowed per refresh period.
        limit: u64,
        /// Permits still available in the current period.
        remaining: u64,
        /// Epoch second at which the current period ends.
        reset: i64,
        /// Seconds until a permit becomes available.
        retry_after: u64,
    },

    /// Internal failure constructing a token (signing, key wrapping, claim
    /// serialization).
    #[error("token encoding failed: {0}")]
    Encoding(String),

    /// The token store failed (I/O, connection, constraint).
    #[error("token store failure: {0}")]
    Store(String),

    /// Key material could not be loaded or parsed. Fatal at startup.
    #[error("key material error: {0}")]
    KeyMaterial(String),
}

impl SecurityError {
    /// Whether the client can recover by re-authenticating or correcting the
    /// request (as opposed to a server-side fault).
    pub fn is_client_recoverable(&self) -> bool {
        !matches!(
            self,
            SecurityError::Encoding(_) | SecurityError::Store(_) | SecurityError::KeyMaterial(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(
            SecurityError::MissingCredential("X-JWS-Signature header".into()).to_string(),
            "missing credential: X-JWS-Signature header"
        );
        assert_eq!(SecurityError::ExpiredToken.to_string(), "token has expired");
        assert_eq!(
            SecurityError::RevokedOrUnknownToken.to_string(),
            "refresh token is revoked or unknown"
        );
        assert_eq!(
            SecurityError::RateLimitExceeded {
                limit: 50,
                remaining: 0,
                reset: 1_700_000_000,
                retry_after: 12,
            }
            .to_string(),
            "rate limit exceeded: 0 of 50 permits remaining"
        );
    }

    #[test]
    fn recoverability_split() {
        assert!(SecurityError::ExpiredToken.is_client_recoverable());
        assert!(SecurityError::SubjectMismatch.is_client_recoverable());
        assert!(!SecurityError::Encoding("sign".into()).is_client_recoverable());
        assert!(!SecurityError::Store("connection reset".into()).is_client_recoverable());
        assert!(!SecurityError::KeyMaterial("bad PEM".into()).is_client_recoverable());
    }
}
