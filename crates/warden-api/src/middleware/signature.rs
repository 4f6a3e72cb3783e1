//! Detached signatures: verification (order 6) and creation (order 11).
//!
//! The `X-JWS-Signature` header carries a compact JWS whose `data` claim
//! is the SHA-256 digest of the body it signs. Verification buffers the
//! request body (it must remain readable downstream), recomputes the
//! digest, and checks it against the claim after signature and expiry
//! validation; a missing header is a missing credential, and every other
//! failure surfaces as an invalid signature. Creation signs the fully
//! produced response body and attaches the compact form in the same
//! header.

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use warden_jose::SecurityError;

use crate::error::AppError;
use crate::middleware::{buffer_request, buffer_response, policy_request, rebuild_request, rebuild_response};
use crate::state::AppState;

/// The detached-signature header, both directions.
pub const SIGNATURE_HEADER: &str = "x-jws-signature";

/// Collapse verification failures to the filter's taxonomy: the header was
/// present, so everything short of a server fault is an invalid signature.
fn as_signature_error(err: SecurityError) -> SecurityError {
    match err {
        SecurityError::InvalidSignature(_) => err,
        SecurityError::ExpiredToken => {
            SecurityError::InvalidSignature("signature token has expired".to_string())
        }
        SecurityError::Encoding(_) | SecurityError::Store(_) | SecurityError::KeyMaterial(_) => {
            err
        }
        _ => SecurityError::InvalidSignature("signature token does not verify".to_string()),
    }
}

pub async fn signature_verification_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state
        .pipeline
        .signature_verification
        .applies(&policy_request(&request))
    {
        return Ok(next.run(request).await);
    }

    let signature = request
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or_else(|| SecurityError::MissingCredential("X-JWS-Signature header".to_string()))?;

    let (parts, bytes) = buffer_request(request).await?;
    state
        .provider
        .validate_jws(&signature, &bytes)
        .map_err(as_signature_error)?;

    // Forward the buffered request unchanged.
    Ok(next.run(rebuild_request(parts, bytes.to_vec())).await)
}

pub async fn signature_creation_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let applies = state
        .pipeline
        .signature_creation
        .applies(&policy_request(&request));
    let response = next.run(request).await;
    if !applies {
        return Ok(response);
    }

    let (parts, bytes) = buffer_response(response).await?;
    let signature = state.provider.create_jws(&bytes)?;
    let mut response = rebuild_response(parts, bytes.to_vec());
    if let Ok(value) = HeaderValue::from_str(&signature) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(SIGNATURE_HEADER), value);
    }
    Ok(response)
}
