//! # Filter Pipeline Order
//!
//! Fixed integer positions for every filter in the HTTP pipeline. Matching
//! decides whether a filter acts on a request; this registry decides where
//! it sits, and that position is a hard guarantee independent of per-route
//! decisions.
//!
//! | order | filter | direction |
//! |-------|--------|-----------|
//! | 1 | request logging | inbound |
//! | 2 | API version check | inbound |
//! | 3 | header validation | inbound |
//! | 4 | trace propagation | inbound |
//! | 5 | payload decryption | inbound |
//! | 6 | signature verification | inbound |
//! | 7 | bearer authentication | inbound |
//! | 8 | sanitization | inbound |
//! | 10 | rate limiting | inbound |
//! | 11 | signature creation | outbound |
//! | 12 | payload encryption | outbound |
//!
//! Position 9 is reserved for request idempotency, which is not part of this
//! pipeline; the remaining values stay stable so operators can reason about
//! filter placement across deployments.

use serde::{Deserialize, Serialize};

/// Pipeline position of a concrete filter. Lower runs earlier on the inbound
/// path; the outbound filters (signature creation, encryption) transform the
/// response after the handler and apply in reverse wrapping order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FilterOrder {
    /// Structured request/response logging.
    Logging = 1,
    /// URI version segment check.
    ApiVersion = 2,
    /// Required-header constraint validation.
    HeaderValidation = 3,
    /// Request/correlation id propagation.
    Trace = 4,
    /// Inbound JWE payload decryption.
    Decryption = 5,
    /// Detached-signature verification of the request body.
    SignatureVerification = 6,
    /// Bearer-token authentication.
    BearerAuth = 7,
    /// HTML-escaping of JSON string values.
    Sanitize = 8,
    /// Token-bucket rate limiting.
    RateLimit = 10,
    /// Detached-signature creation over the response body.
    SignatureCreation = 11,
    /// Outbound JWE payload encryption.
    Encryption = 12,
}

impl FilterOrder {
    /// The numeric pipeline position.
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// All orders in pipeline sequence.
    pub fn pipeline() -> &'static [FilterOrder] {
        &[
            FilterOrder::Logging,
            FilterOrder::ApiVersion,
            FilterOrder::HeaderValidation,
            FilterOrder::Trace,
            FilterOrder::Decryption,
            FilterOrder::SignatureVerification,
            FilterOrder::BearerAuth,
            FilterOrder::Sanitize,
            FilterOrder::RateLimit,
            FilterOrder::SignatureCreation,
            FilterOrder::Encryption,
        ]
    }
}

impl std::fmt::Display for FilterOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FilterOrder::Logging => "logging",
            FilterOrder::ApiVersion => "api-version",
            FilterOrder::HeaderValidation => "header-validation",
            FilterOrder::Trace => "trace",
            FilterOrder::Decryption => "decryption",
            FilterOrder::SignatureVerification => "signature-verification",
            FilterOrder::BearerAuth => "bearer-auth",
            FilterOrder::Sanitize => "sanitize",
            FilterOrder::RateLimit => "rate-limit",
            FilterOrder::SignatureCreation => "signature-creation",
            FilterOrder::Encryption => "encryption",
        };
        write!(f, "{name}")
    }
}
