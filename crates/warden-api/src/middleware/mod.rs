//! # The Fixed-Order Filter Pipeline
//!
//! Eleven cross-cutting filters, each a thin Tower middleware over one
//! [`PolicyFilter`] from warden-policy. Matching (does this filter act on
//! this request?) is the chain's per-route decision; position is the
//! [`FilterOrder`] integer, wired in `lib.rs` and guaranteed regardless of
//! any per-route exemption:
//!
//! ```text
//! logging → version → headers → trace → decrypt → verify-signature
//!   → bearer-auth → sanitize → rate-limit → handler
//!   → encrypt-response → sign-response
//! ```
//!
//! Every chain is built once at startup from [`FilterSettings`] and held in
//! a [`FilterPipeline`] shared through application state.

use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::http::{request, response};
use axum::response::Response;

use warden_policy::{FilterOrder, PolicyChain, PolicyFilter, PolicyRequest};

use crate::config::FilterSettings;
use crate::error::AppError;
use crate::ratelimit::LimiterChoice;

pub mod auth;
pub mod crypto;
pub mod headers;
pub mod logging;
pub mod metrics;
pub mod rate_limit;
pub mod sanitize;
pub mod signature;
pub mod trace;
pub mod version;

use headers::HeaderPolicy;

/// Largest request or response body a filter will buffer.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Routes that sit outside the API surface and skip most filters.
const OPEN_PATHS: [&str; 4] = ["/health/**", "/metrics", "/.well-known/**", "/api-docs/**"];

/// Security endpoints whose bodies are themselves crypto inputs; detached
/// signatures do not apply to them (verification *is* one of them).
const UNSIGNED_SECURITY_PATHS: [&str; 3] = [
    "/api/*/security/sign",
    "/api/*/security/encrypt",
    "/api/*/security/decrypt",
];

/// All eleven concrete filters, built once from configuration.
pub struct FilterPipeline {
    pub logging: PolicyFilter<bool>,
    pub api_version: PolicyFilter<bool>,
    /// Version strings the deployment serves (`v1` plus configured extras).
    pub supported_versions: Vec<String>,
    pub header_validation: PolicyFilter<HeaderPolicy>,
    pub trace: PolicyFilter<bool>,
    pub decryption: PolicyFilter<bool>,
    pub signature_verification: PolicyFilter<bool>,
    pub bearer_auth: PolicyFilter<bool>,
    pub sanitize: PolicyFilter<bool>,
    pub rate_limit: PolicyFilter<LimiterChoice>,
    pub signature_creation: PolicyFilter<bool>,
    pub encryption: PolicyFilter<bool>,
}

impl FilterPipeline {
    pub fn from_settings(settings: &FilterSettings) -> Self {
        Self {
            logging: PolicyFilter::new("logging", Self::logging_chain()),
            api_version: PolicyFilter::new("api-version", Self::api_chain(FilterOrder::ApiVersion)),
            supported_versions: settings.effective_versions(),
            header_validation: PolicyFilter::new(
                "header-validation",
                Self::header_chain(settings),
            ),
            trace: PolicyFilter::new("trace", Self::trace_chain()),
            decryption: PolicyFilter::new("decryption", Self::decryption_chain(settings)),
            signature_verification: PolicyFilter::new(
                "signature-verification",
                Self::signature_chain(FilterOrder::SignatureVerification, settings),
            ),
            bearer_auth: PolicyFilter::new("bearer-auth", Self::bearer_chain(settings)),
            sanitize: PolicyFilter::new("sanitize", Self::sanitize_chain(settings)),
            rate_limit: PolicyFilter::new("rate-limit", Self::rate_limit_chain(settings)),
            signature_creation: PolicyFilter::new(
                "signature-creation",
                Self::signature_chain(FilterOrder::SignatureCreation, settings),
            ),
            encryption: PolicyFilter::new("encryption", Self::encryption_chain(settings)),
        }
    }

    /// Log everything except the probe endpoints.
    fn logging_chain() -> PolicyChain<bool> {
        PolicyChain::builder(FilterOrder::Logging, false)
            .request_matchers(["/health/**", "/metrics"])
            .permit_all()
            .any_request()
            .apply()
            .build()
    }

    /// Apply to the API surface only; open routes have no version segment.
    fn api_chain(order: FilterOrder) -> PolicyChain<bool> {
        PolicyChain::builder(order, false)
            .request_matchers(["/api/**"])
            .apply()
            .build()
    }

    fn header_chain(settings: &FilterSettings) -> PolicyChain<HeaderPolicy> {
        let rules = HeaderPolicy::compile(&settings.effective_headers());
        PolicyChain::builder(FilterOrder::HeaderValidation, HeaderPolicy::unconstrained())
            .request_matchers(["/api/**"])
            .decide(rules)
            .build()
    }

    fn trace_chain() -> PolicyChain<bool> {
        PolicyChain::builder(FilterOrder::Trace, false)
            .request_matchers(["/metrics"])
            .permit_all()
            .any_request()
            .apply()
            .build()
    }

    fn decryption_chain(settings: &FilterSettings) -> PolicyChain<bool> {
        PolicyChain::builder(FilterOrder::Decryption, false)
            .request_matchers(settings.effective_decrypt_paths())
            .apply()
            .build()
    }

    /// Shared by verification (order 6) and creation (order 11): the same
    /// routes are signed in both directions.
    fn signature_chain(order: FilterOrder, settings: &FilterSettings) -> PolicyChain<bool> {
        PolicyChain::builder(order, false)
            .request_matchers(["/api/*/auth/**"])
            .permit_all()
            .request_matchers(UNSIGNED_SECURITY_PATHS)
            .permit_all()
            .request_matchers(settings.unsigned_paths.iter().cloned())
            .permit_all()
            .request_matchers(["/api/**"])
            .apply()
            .build()
    }

    fn bearer_chain(settings: &FilterSettings) -> PolicyChain<bool> {
        PolicyChain::builder(FilterOrder::BearerAuth, true)
            .request_matchers(OPEN_PATHS)
            .permit_all()
            .request_matchers(["/api/*/auth/token", "/api/*/auth/refresh"])
            .permit_all()
            .request_matchers(settings.public_paths.iter().cloned())
            .permit_all()
            .any_request()
            .apply()
            .build()
    }

    fn sanitize_chain(settings: &FilterSettings) -> PolicyChain<bool> {
        PolicyChain::builder(FilterOrder::Sanitize, false)
            .request_matchers(settings.unsanitized_paths.iter().cloned())
            .permit_all()
            .request_matchers(["/api/**"])
            .apply()
            .build()
    }

    fn rate_limit_chain(settings: &FilterSettings) -> PolicyChain<LimiterChoice> {
        let mut builder = PolicyChain::builder(
            FilterOrder::RateLimit,
            LimiterChoice::named("default"),
        )
        .request_matchers(["/health/**", "/metrics"])
        .decide(LimiterChoice::Exempt);
        // Route-specific limiters ahead of the built-in jwks bucket and the
        // catch-all default.
        for rule in &settings.rate_limited_paths {
            builder = builder
                .request_matchers([rule.pattern.clone()])
                .decide(LimiterChoice::named(&rule.limiter));
        }
        builder
            .request_matchers(["/.well-known/**"])
            .decide(LimiterChoice::named("jwks"))
            .build()
    }

    fn encryption_chain(settings: &FilterSettings) -> PolicyChain<bool> {
        PolicyChain::builder(FilterOrder::Encryption, false)
            .request_matchers(settings.effective_encrypt_paths())
            .apply()
            .build()
    }
}

impl std::fmt::Debug for FilterPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterPipeline")
            .field("supported_versions", &self.supported_versions)
            .finish_non_exhaustive()
    }
}

/// The policy-framework view of an HTTP request: method and path only.
pub(crate) fn policy_request(request: &Request) -> PolicyRequest<'_> {
    PolicyRequest::new(request.method().as_str(), request.uri().path())
}

/// Buffer the request body so a filter can read it and still forward it.
pub(crate) async fn buffer_request(
    request: Request,
) -> Result<(request::Parts, Bytes), AppError> {
    let (parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| AppError::BadRequest(format!("cannot read request body: {e}")))?;
    Ok((parts, bytes))
}

/// Buffer the response body so an outbound filter can transform it.
pub(crate) async fn buffer_response(
    response: Response,
) -> Result<(response::Parts, Bytes), AppError> {
    let (parts, body) = response.into_parts();
    let bytes = axum::body::to_bytes(body, BODY_LIMIT)
        .await
        .map_err(|e| AppError::Internal(format!("cannot read response body: {e}")))?;
    Ok((parts, bytes))
}

/// Rebuild a request around a replacement body, dropping the stale length.
pub(crate) fn rebuild_request(mut parts: request::Parts, body: Vec<u8>) -> Request {
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Request::from_parts(parts, Body::from(body))
}

/// Rebuild a response around a replacement body, dropping the stale length.
pub(crate) fn rebuild_response(mut parts: response::Parts, body: Vec<u8>) -> Response {
    parts.headers.remove(axum::http::header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline() -> FilterPipeline {
        FilterPipeline::from_settings(&FilterSettings::default())
    }

    fn req<'a>(method: &'a str, path: &'a str) -> PolicyRequest<'a> {
        PolicyRequest::new(method, path)
    }

    #[test]
    fn chains_sit_at_their_registry_positions() {
        let p = pipeline();
        assert_eq!(p.logging.order(), FilterOrder::Logging);
        assert_eq!(p.api_version.order(), FilterOrder::ApiVersion);
        assert_eq!(p.header_validation.order(), FilterOrder::HeaderValidation);
        assert_eq!(p.trace.order(), FilterOrder::Trace);
        assert_eq!(p.decryption.order(), FilterOrder::Decryption);
        assert_eq!(
            p.signature_verification.order(),
            FilterOrder::SignatureVerification
        );
        assert_eq!(p.bearer_auth.order(), FilterOrder::BearerAuth);
        assert_eq!(p.sanitize.order(), FilterOrder::Sanitize);
        assert_eq!(p.rate_limit.order(), FilterOrder::RateLimit);
        assert_eq!(p.signature_creation.order(), FilterOrder::SignatureCreation);
        assert_eq!(p.encryption.order(), FilterOrder::Encryption);
    }

    #[test]
    fn probes_are_exempt_where_it_matters() {
        let p = pipeline();
        let health = req("GET", "/health/live");
        assert!(!p.logging.applies(&health));
        assert!(!p.bearer_auth.applies(&health));
        assert!(!p.api_version.applies(&health));
        assert_eq!(p.rate_limit.decide(&health), &LimiterChoice::Exempt);
    }

    #[test]
    fn auth_endpoints_are_public_but_logout_is_not() {
        let p = pipeline();
        assert!(!p.bearer_auth.applies(&req("POST", "/api/v1/auth/token")));
        assert!(!p.bearer_auth.applies(&req("POST", "/api/v1/auth/refresh")));
        assert!(p.bearer_auth.applies(&req("POST", "/api/v1/auth/logout")));
        assert!(p.bearer_auth.applies(&req("POST", "/api/v1/security/sign")));
    }

    #[test]
    fn login_bodies_are_transparently_encrypted() {
        let p = pipeline();
        assert!(p.decryption.applies(&req("POST", "/api/v1/auth/token")));
        assert!(p.encryption.applies(&req("POST", "/api/v1/auth/token")));
        assert!(!p.decryption.applies(&req("POST", "/api/v1/auth/refresh")));
    }

    #[test]
    fn signature_scope_excludes_auth_and_crypto_endpoints() {
        let p = pipeline();
        for exempt in [
            "/api/v1/auth/token",
            "/api/v1/security/sign",
            "/api/v1/security/encrypt",
            "/api/v1/security/decrypt",
        ] {
            assert!(
                !p.signature_verification.applies(&req("POST", exempt)),
                "{exempt} must not require a detached signature"
            );
        }
        assert!(p
            .signature_verification
            .applies(&req("POST", "/api/v1/security/verify")));
        assert!(p
            .signature_creation
            .applies(&req("POST", "/api/v1/security/verify")));
        assert!(!p.signature_verification.applies(&req("GET", "/metrics")));
    }

    #[test]
    fn jwks_uses_its_own_bucket() {
        let p = pipeline();
        assert_eq!(
            p.rate_limit.decide(&req("GET", "/.well-known/jwks.json")),
            &LimiterChoice::named("jwks")
        );
        assert_eq!(
            p.rate_limit.decide(&req("POST", "/api/v1/security/sign")),
            &LimiterChoice::named("default")
        );
    }

    #[test]
    fn configured_routes_bind_their_limiter_ahead_of_default() {
        let mut settings = FilterSettings::default();
        settings.limiters.insert(
            "auth".to_string(),
            crate::config::LimiterSettings {
                limit_for_period: 3,
                refresh_period_secs: 60,
            },
        );
        settings.rate_limited_paths.push(crate::config::RateLimitRule {
            pattern: "/api/*/auth/**".to_string(),
            limiter: "auth".to_string(),
        });
        let p = FilterPipeline::from_settings(&settings);
        assert_eq!(
            p.rate_limit.decide(&req("POST", "/api/v1/auth/token")),
            &LimiterChoice::named("auth")
        );
    }

    #[test]
    fn public_path_overrides_reach_the_bearer_chain() {
        let mut settings = FilterSettings::default();
        settings.public_paths.push("/api/*/demo/**".to_string());
        let p = FilterPipeline::from_settings(&settings);
        assert!(!p.bearer_auth.applies(&req("GET", "/api/v1/demo/list")));
        assert!(p.bearer_auth.applies(&req("GET", "/api/v1/other")));
    }
}
