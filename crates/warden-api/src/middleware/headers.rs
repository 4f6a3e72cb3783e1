//! Header validation (order 3).
//!
//! Each matched route carries a compiled constraint set; every constraint
//! is evaluated and violations accumulate, so one response reports every
//! problem at once. A missing header is validated as the empty string,
//! which trips both the not-blank and minimum-length constraints.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use regex::Regex;

use crate::config::HeaderRule;
use crate::error::AppError;
use crate::middleware::policy_request;
use crate::state::AppState;

/// One compiled header constraint.
#[derive(Debug, Clone)]
pub struct HeaderConstraint {
    name: String,
    not_blank: bool,
    min_length: usize,
    max_length: usize,
    pattern: Option<Regex>,
}

impl HeaderConstraint {
    /// All violations of this constraint against `value` (empty string for
    /// an absent header).
    fn violations(&self, value: &str) -> Vec<String> {
        let mut violations = Vec::new();
        if self.not_blank && value.trim().is_empty() {
            violations.push(format!("{}: must not be blank", self.name));
        }
        let len = value.chars().count();
        if len < self.min_length || len > self.max_length {
            violations.push(format!(
                "{}: size must be between {} and {}",
                self.name, self.min_length, self.max_length
            ));
        }
        if let Some(pattern) = &self.pattern {
            if !pattern.is_match(value) {
                violations.push(format!("{}: must match {}", self.name, pattern.as_str()));
            }
        }
        violations
    }
}

/// The header filter's per-route decision: the constraints to enforce.
#[derive(Debug, Clone, Default)]
pub struct HeaderPolicy {
    constraints: Arc<Vec<HeaderConstraint>>,
}

impl HeaderPolicy {
    /// No constraints; the decision for exempt routes.
    pub fn unconstrained() -> Self {
        Self::default()
    }

    /// Compile configured rules. Patterns were validated at config load, so
    /// a failure here is a programming error.
    pub fn compile(rules: &[HeaderRule]) -> Self {
        let constraints = rules
            .iter()
            .map(|rule| HeaderConstraint {
                name: rule.header.clone(),
                not_blank: rule.not_blank,
                min_length: rule.min_length,
                max_length: rule.max_length,
                pattern: rule
                    .pattern
                    .as_deref()
                    .map(|p| Regex::new(p).expect("header pattern validated at config load")),
            })
            .collect();
        Self {
            constraints: Arc::new(constraints),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Evaluate every constraint; the accumulated violation list.
    pub fn check(&self, headers: &axum::http::HeaderMap) -> Vec<String> {
        let mut violations = Vec::new();
        for constraint in self.constraints.iter() {
            let value = headers
                .get(&constraint.name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("");
            violations.extend(constraint.violations(value));
        }
        violations
    }
}

pub async fn header_validation_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let policy = state
        .pipeline
        .header_validation
        .decide(&policy_request(&request))
        .clone();
    if !policy.is_empty() {
        let violations = policy.check(request.headers());
        if !violations.is_empty() {
            return Err(AppError::HeaderValidation { violations });
        }
    }
    Ok(next.run(request).await)
}
