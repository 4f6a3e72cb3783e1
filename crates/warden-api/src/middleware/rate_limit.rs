//! Rate limiting (order 10).
//!
//! Resolves the route's limiter through the policy chain, derives the
//! client key (authenticated subject first — this filter runs after
//! bearer auth — then forwarded address, then peer address), and takes
//! one permit. The bucket's accounting is written as `X-Rate-Limit-*`
//! headers on every outcome; rejections additionally carry `Retry-After`
//! through the error mapper.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use warden_policy::Principal;

use crate::error::AppError;
use crate::middleware::policy_request;
use crate::ratelimit::{LimiterChoice, RateLimitStatus};
use crate::state::AppState;

pub const LIMIT_HEADER: &str = "x-rate-limit-limit";
pub const REMAINING_HEADER: &str = "x-rate-limit-remaining";
pub const RESET_HEADER: &str = "x-rate-limit-reset";

/// Who the bucket belongs to.
fn client_key(request: &Request) -> String {
    if let Some(principal) = request.extensions().get::<Principal>() {
        return principal.subject().to_string();
    }
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
    {
        return forwarded.to_string();
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn write_status(response: &mut Response, status: RateLimitStatus) {
    let headers = response.headers_mut();
    for (name, value) in [
        (LIMIT_HEADER, status.limit.to_string()),
        (REMAINING_HEADER, status.remaining.to_string()),
        (RESET_HEADER, status.reset.to_string()),
    ] {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let choice = state.pipeline.rate_limit.decide(&policy_request(&request)).clone();
    let LimiterChoice::Named(limiter) = choice else {
        return Ok(next.run(request).await);
    };

    let client = client_key(&request);
    // Rejection carries the same accounting; the error mapper turns it
    // into a 429 with headers.
    let status = state.limiter.try_acquire(&limiter, &client)?;

    let mut response = next.run(request).await;
    write_status(&mut response, status);
    Ok(response)
}
