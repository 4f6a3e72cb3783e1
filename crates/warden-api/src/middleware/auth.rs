//! Bearer authentication (order 7).
//!
//! On protected routes the `Authorization: Bearer` token is required and
//! validated through [`TokenProvider::authenticate`]; the resulting
//! [`Principal`] travels downstream as a request extension. On public
//! routes a presented token is still attached when it validates — the
//! refresh endpoint uses this to bind rotation to the caller — but its
//! absence or invalidity is not an error there.
//!
//! [`TokenProvider::authenticate`]: warden_jose::TokenProvider::authenticate

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use warden_jose::SecurityError;
use warden_policy::Principal;

use crate::error::AppError;
use crate::middleware::policy_request;
use crate::state::AppState;

/// The token of an `Authorization: Bearer <token>` header, when present.
pub fn bearer_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let protected = state.pipeline.bearer_auth.applies(&policy_request(&request));
    let token = bearer_token(request.headers()).map(str::to_string);

    match (protected, token) {
        (true, None) => {
            return Err(SecurityError::MissingCredential(
                "Authorization bearer token".to_string(),
            )
            .into());
        }
        (true, Some(token)) => {
            let principal = state.provider.authenticate(&token)?;
            request.extensions_mut().insert::<Principal>(principal);
        }
        (false, Some(token)) => {
            // Opportunistic: a valid token identifies the caller even on
            // public routes; an invalid one is simply ignored there.
            if let Ok(principal) = state.provider.authenticate(&token) {
                request.extensions_mut().insert::<Principal>(principal);
            }
        }
        (false, None) => {}
    }

    Ok(next.run(request).await)
}
