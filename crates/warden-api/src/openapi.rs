//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into a single OpenAPI spec,
//! served at `/api-docs/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds the bearer-token security scheme to the spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some(
                            "Access token from POST /api/v1/auth/token, sent as \
                             `Authorization: Bearer <token>`.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Warden — Security Token API",
        version = "0.3.2",
        description = "Token issuance and JOSE services: RS256 access / identity / \
                       refresh triples with single-use rotation, detached JWS \
                       signatures, and signed-then-encrypted JWE payload envelopes. \
                       All `/api/*` requests must carry valid `X-Request-ID` and \
                       `X-Correlation-ID` headers; most also carry a detached \
                       signature in `X-JWS-Signature`.",
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    paths(
        crate::routes::auth::login,
        crate::routes::auth::refresh,
        crate::routes::auth::logout,
        crate::routes::security::sign,
        crate::routes::security::verify,
        crate::routes::security::encrypt,
        crate::routes::security::decrypt,
        crate::routes::system::jwks,
        crate::routes::system::liveness,
        crate::routes::system::readiness,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            crate::error::ErrorDetail,
            crate::middleware::crypto::TokenEnvelope,
            crate::routes::auth::LoginRequest,
            crate::routes::auth::RefreshRequest,
            crate::routes::security::SignResponse,
            crate::routes::security::VerifyResponse,
        ),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Auth-token lifecycle: login, refresh rotation, logout"),
        (name = "security", description = "Detached signatures and payload envelopes as a service"),
        (name = "system", description = "Probes and the public JWK set"),
    )
)]
pub struct ApiDoc;

pub fn router() -> Router<AppState> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
