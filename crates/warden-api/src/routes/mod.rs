//! HTTP route handlers, grouped by surface: the auth-token lifecycle, the
//! security utility endpoints, and the system endpoints (probes, JWKS,
//! metrics). All routes live in one router so the policy chains, not the
//! router topology, decide which filters act on each of them.

use axum::routing::{get, post};
use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod security;
pub mod system;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/:version/auth/token", post(auth::login))
        .route("/api/:version/auth/refresh", post(auth::refresh))
        .route("/api/:version/auth/logout", post(auth::logout))
        .route("/api/:version/security/sign", post(security::sign))
        .route("/api/:version/security/verify", post(security::verify))
        .route("/api/:version/security/encrypt", post(security::encrypt))
        .route("/api/:version/security/decrypt", post(security::decrypt))
        .route("/.well-known/jwks.json", get(system::jwks))
        .route("/health/live", get(system::liveness))
        .route("/health/ready", get(system::readiness))
        .route("/metrics", get(system::metrics))
}
