//! Trace propagation (order 4).
//!
//! Reads `X-Request-ID` and `X-Correlation-ID` (generating a UUID for any
//! missing one), attaches them to the request as a [`TraceContext`]
//! extension — an explicit value, never thread-local state — wraps the
//! downstream future in a span carrying both ids, and echoes the headers
//! on the response.

use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

use crate::middleware::policy_request;
use crate::state::AppState;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Per-request trace identity, carried as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub request_id: String,
    pub correlation_id: String,
}

fn header_or_uuid(request: &Request, name: &str) -> String {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

pub async fn trace_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if !state.pipeline.trace.applies(&policy_request(&request)) {
        return next.run(request).await;
    }

    let context = TraceContext {
        request_id: header_or_uuid(&request, REQUEST_ID_HEADER),
        correlation_id: header_or_uuid(&request, CORRELATION_ID_HEADER),
    };
    let span = tracing::info_span!(
        "request",
        request_id = %context.request_id,
        correlation_id = %context.correlation_id,
    );
    request.extensions_mut().insert(context.clone());

    let mut response = next.run(request).instrument(span).await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&context.request_id) {
        headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }
    if let Ok(value) = HeaderValue::from_str(&context.correlation_id) {
        headers.insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    }
    response
}
