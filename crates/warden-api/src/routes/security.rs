//! Security utility endpoints: detached signatures and payload envelopes
//! as a service. These routes are the crypto operations themselves, so the
//! detached-signature filters leave their request bodies alone.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use warden_jose::SecurityError;

use crate::error::AppError;
use crate::middleware::crypto::TokenEnvelope;
use crate::middleware::signature::SIGNATURE_HEADER;
use crate::state::AppState;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignResponse {
    /// Compact JWS carrying the SHA-256 digest of the posted body.
    pub jws: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyResponse {
    pub valid: bool,
}

/// Produce a detached signature over the raw request body.
#[utoipa::path(
    post,
    path = "/api/v1/security/sign",
    tag = "security",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Detached signature over the posted bytes", body = SignResponse),
    ),
)]
pub async fn sign(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SignResponse>, AppError> {
    let jws = state.provider.create_jws(&body)?;
    Ok(Json(SignResponse { jws }))
}

/// Verify the `X-JWS-Signature` header against the raw request body.
///
/// The verification filter has already rejected anything invalid before
/// this handler runs; the handler re-checks so the route also works when
/// configuration exempts it from the filter.
#[utoipa::path(
    post,
    path = "/api/v1/security/verify",
    tag = "security",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Signature matches the posted bytes", body = VerifyResponse),
        (status = 401, description = "Missing header or signature mismatch"),
    ),
)]
pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<VerifyResponse>, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| SecurityError::MissingCredential("X-JWS-Signature header".to_string()))?;
    state.provider.validate_jws(signature, &body)?;
    Ok(Json(VerifyResponse { valid: true }))
}

/// Seal a JSON payload into a signed-then-encrypted envelope.
#[utoipa::path(
    post,
    path = "/api/v1/security/encrypt",
    tag = "security",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Compact JWE wrapped in the token envelope", body = TokenEnvelope),
    ),
)]
pub async fn encrypt(
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<Json<TokenEnvelope>, AppError> {
    let token = state.provider.create_jwe(&payload)?;
    Ok(Json(TokenEnvelope { token }))
}

/// Open a payload envelope and return the carried JSON.
#[utoipa::path(
    post,
    path = "/api/v1/security/decrypt",
    tag = "security",
    security(("bearer" = [])),
    request_body = TokenEnvelope,
    responses(
        (status = 200, description = "The decrypted JSON payload"),
        (status = 401, description = "Blank, corrupt, or expired envelope"),
    ),
)]
pub async fn decrypt(
    State(state): State<AppState>,
    Json(envelope): Json<TokenEnvelope>,
) -> Result<Json<Value>, AppError> {
    if envelope.token.trim().is_empty() {
        return Err(SecurityError::MissingCredential("token envelope".to_string()).into());
    }
    let payload = state.provider.extract_data_from_jwe(&envelope.token)?;
    Ok(Json(payload))
}
