//! # warden-api — HTTP Surface
//!
//! Axum server exposing the token subsystem: the auth-token lifecycle,
//! detached signatures and payload envelopes as a service, the JWK set,
//! and operational endpoints. Every cross-cutting concern is a policy
//! filter from warden-policy wired at a fixed position:
//!
//! | # | Filter                 | Acts on                                |
//! |---|------------------------|----------------------------------------|
//! | 1 | logging                | everything but probes                  |
//! | 2 | api version            | `/api/**`                              |
//! | 3 | header validation      | `/api/**`                              |
//! | 4 | trace propagation      | everything but `/metrics`              |
//! | 5 | payload decryption     | configured routes, login by default    |
//! | 6 | signature verification | signed API routes                      |
//! | 7 | bearer auth            | everything not explicitly public       |
//! | 8 | sanitization           | `/api/**` minus exemptions             |
//! | 10| rate limiting          | everything but probes                  |
//! | 11| signature creation     | the same routes verification covers    |
//! | 12| payload encryption     | configured routes, login by default    |
//!
//! The layering below is innermost-first: the last `.layer` call wraps
//! everything, so logging is the first filter a request meets and the
//! response-side filters (11, 12) transform the body from the inside out.

pub mod config;
pub mod error;
pub mod middleware;
pub mod openapi;
pub mod ratelimit;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use crate::middleware::{
    auth::bearer_auth_middleware, crypto::decryption_middleware, crypto::encryption_middleware,
    headers::header_validation_middleware, logging::logging_middleware,
    metrics::metrics_middleware, rate_limit::rate_limit_middleware, sanitize::sanitize_middleware,
    signature::signature_creation_middleware, signature::signature_verification_middleware,
    trace::trace_middleware, version::api_version_middleware, BODY_LIMIT,
};
pub use crate::state::AppState;

/// Build the complete application router with the filter pipeline wired
/// at its fixed positions.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::router())
        .merge(openapi::router())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(from_fn_with_state(state.clone(), encryption_middleware))
        .layer(from_fn_with_state(state.clone(), signature_creation_middleware))
        .layer(from_fn_with_state(state.clone(), rate_limit_middleware))
        .layer(from_fn_with_state(state.clone(), sanitize_middleware))
        .layer(from_fn_with_state(state.clone(), bearer_auth_middleware))
        .layer(from_fn_with_state(
            state.clone(),
            signature_verification_middleware,
        ))
        .layer(from_fn_with_state(state.clone(), decryption_middleware))
        .layer(from_fn_with_state(state.clone(), trace_middleware))
        .layer(from_fn_with_state(state.clone(), header_validation_middleware))
        .layer(from_fn_with_state(state.clone(), api_version_middleware))
        .layer(from_fn_with_state(state.clone(), logging_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(Extension(state.metrics.clone()))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use warden_jose::{InMemoryTokenStore, KeyMaterial};

    use crate::config::AppConfig;
    use crate::state::AppState;

    fn test_keys() -> Arc<KeyMaterial> {
        static KEYS: OnceLock<Arc<KeyMaterial>> = OnceLock::new();
        Arc::clone(
            KEYS.get_or_init(|| Arc::new(KeyMaterial::generate().expect("test key material"))),
        )
    }

    fn test_app() -> axum::Router {
        let config = AppConfig::default();
        crate::app(AppState::new(
            &config,
            test_keys(),
            Arc::new(InMemoryTokenStore::new()),
        ))
    }

    #[tokio::test]
    async fn probes_answer_without_any_credentials() {
        let app = test_app();
        for path in ["/health/live", "/health/ready"] {
            let response = app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn unsupported_version_is_rejected_before_header_validation() {
        // No trace headers either, but the version filter sits earlier.
        let response = test_app()
            .oneshot(
                Request::post("/api/v9/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn api_requests_without_trace_headers_are_rejected() {
        let response = test_app()
            .oneshot(
                Request::post("/api/v1/auth/logout")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn protected_routes_demand_a_bearer_token() {
        let response = test_app()
            .oneshot(
                Request::post("/api/v1/auth/logout")
                    .header("x-request-id", "req-12345678")
                    .header("x-correlation-id", "corr-1234567")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn jwks_and_openapi_are_public() {
        let app = test_app();
        for path in ["/.well-known/jwks.json", "/api-docs/openapi.json"] {
            let response = app
                .clone()
                .oneshot(Request::get(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{path}");
        }
    }
}
