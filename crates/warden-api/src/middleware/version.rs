//! API version check (order 2).
//!
//! The version is the `vN` segment after `/api/`; a path without one is
//! served as `v1`. An unsupported version fails the request before any
//! other filter looks at it.

use std::sync::OnceLock;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use regex::Regex;

use crate::error::AppError;
use crate::middleware::policy_request;
use crate::state::AppState;

/// The implied version for paths without a version segment.
pub const DEFAULT_VERSION: &str = "v1";

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^/api/(v\d+)(/|$)").expect("static pattern"))
}

/// Extract the version segment of `path`, if it carries one.
pub fn extract_version(path: &str) -> Option<&str> {
    version_pattern()
        .captures(path)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

pub async fn api_version_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.pipeline.api_version.applies(&policy_request(&request)) {
        let version = extract_version(request.uri().path()).unwrap_or(DEFAULT_VERSION);
        if !state
            .pipeline
            .supported_versions
            .iter()
            .any(|supported| supported == version)
        {
            return Err(AppError::UnsupportedApiVersion(format!(
                "{version} (supported: {})",
                state.pipeline.supported_versions.join(", ")
            )));
        }
    }
    Ok(next.run(request).await)
}
