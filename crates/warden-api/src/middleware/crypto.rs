//! Payload decryption (order 5) and encryption (order 12).
//!
//! Routes with transparently encrypted bodies exchange the JSON envelope
//! `{"token": "<compact JWE>"}`. Inbound, the envelope is opened through
//! [`TokenProvider::extract_data_from_jwe`] and the carried payload
//! replaces the request body before any later filter or the handler sees
//! it. Outbound, a successful response body is signed-then-sealed through
//! [`TokenProvider::create_jwe`] and replaced by the same envelope shape.
//!
//! Encryption is the innermost filter, so a signed response (order 11)
//! signs the *sealed* body — the signature covers exactly the bytes on the
//! wire.
//!
//! [`TokenProvider::extract_data_from_jwe`]: warden_jose::TokenProvider::extract_data_from_jwe
//! [`TokenProvider::create_jwe`]: warden_jose::TokenProvider::create_jwe

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use warden_jose::SecurityError;

use crate::error::AppError;
use crate::middleware::{
    buffer_request, buffer_response, policy_request, rebuild_request, rebuild_response,
};
use crate::state::AppState;

/// The wire shape of an encrypted payload, in both directions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenEnvelope {
    /// A compact five-segment JWE.
    pub token: String,
}

pub async fn decryption_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.pipeline.decryption.applies(&policy_request(&request)) {
        return Ok(next.run(request).await);
    }

    let (parts, bytes) = buffer_request(request).await?;
    let envelope: TokenEnvelope = serde_json::from_slice(&bytes)
        .map_err(|_| SecurityError::MissingCredential("token envelope".to_string()))?;
    if envelope.token.trim().is_empty() {
        return Err(SecurityError::MissingCredential("token envelope".to_string()).into());
    }

    let payload = state.provider.extract_data_from_jwe(&envelope.token)?;
    let body = serde_json::to_vec(&payload)
        .map_err(|e| AppError::Internal(format!("re-encoding decrypted payload: {e}")))?;

    let mut request = rebuild_request(parts, body);
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    Ok(next.run(request).await)
}

pub async fn encryption_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let applies = state.pipeline.encryption.applies(&policy_request(&request));
    let response = next.run(request).await;
    // Error bodies stay readable; only the payload of a successful
    // response is sealed.
    if !applies || !response.status().is_success() {
        return Ok(response);
    }

    let (parts, bytes) = buffer_response(response).await?;
    let payload: Value = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
    let token = state.provider.create_jwe(&payload)?;
    let body = serde_json::to_vec(&TokenEnvelope { token })
        .map_err(|e| AppError::Internal(format!("encoding token envelope: {e}")))?;

    let mut response = rebuild_response(parts, body);
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    Ok(response)
}
