//! Auth-token lifecycle: login, refresh rotation, logout.
//!
//! The login route's body travels inside the transparent encryption
//! envelope, so by the time the handler runs the credentials are plain
//! JSON; the response triple is sealed again on the way out by the
//! encryption filter.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use warden_jose::{SecurityError, Token};
use warden_policy::Principal;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Issue an access / identity / refresh triple for valid credentials.
#[utoipa::path(
    post,
    path = "/api/v1/auth/token",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token triple, sealed into the transport envelope"),
        (status = 401, description = "Unknown username or wrong password"),
    ),
)]
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<Token>, AppError> {
    let identity = &state.provider.settings().identity;
    if request.username != identity.username || *request.password != *state.password {
        return Err(SecurityError::MissingCredential("valid credentials".to_string()).into());
    }

    let principal = Principal::new(&request.username, identity.authorities.clone());
    let token = state.provider.create_token(&principal).await?;
    state.metrics.token_issued();
    tracing::info!(subject = %request.username, "login succeeded");
    Ok(Json(token))
}

/// Rotate a refresh token into a fresh triple. Works with or without a
/// bearer token; an authenticated caller must match the token's subject.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Fresh token triple; the presented refresh token is dead"),
        (status = 401, description = "Presented token is invalid, expired, or already rotated"),
        (status = 403, description = "Authenticated caller does not own the token"),
    ),
)]
pub async fn refresh(
    State(state): State<AppState>,
    caller: Option<Extension<Principal>>,
    Json(request): Json<RefreshRequest>,
) -> Result<Json<Token>, AppError> {
    let caller = caller.map(|Extension(principal)| principal);
    let token = state
        .provider
        .refresh_token(caller.as_ref(), &request.refresh_token)
        .await?;
    state.metrics.token_rotated();
    state.metrics.token_issued();
    Ok(Json(token))
}

/// Invalidate every outstanding refresh token of the caller.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    security(("bearer" = [])),
    responses(
        (status = 204, description = "All refresh tokens for the caller are invalidated"),
        (status = 401, description = "Missing or invalid bearer token"),
    ),
)]
pub async fn logout(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> Result<StatusCode, AppError> {
    state.provider.invalidate_all(principal.subject()).await?;
    tracing::info!(subject = %principal.subject(), "logout");
    Ok(StatusCode::NO_CONTENT)
}
