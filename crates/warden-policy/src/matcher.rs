//! # Request Matchers
//!
//! Predicates over the request line that drive policy-chain evaluation.
//! The framework ships a path-pattern matcher ([`PathRequestMatcher`]) with
//! optional method constraint; any closure over [`PolicyRequest`] is also a
//! matcher, so callers can express arbitrary predicates without a wrapper
//! type.
//!
//! ## Pattern Language
//!
//! Patterns are `/`-separated segment lists:
//!
//! - a literal segment matches itself exactly;
//! - `*` matches exactly one segment (never crosses a `/`);
//! - a final `**` matches any remaining suffix, including the empty one.
//!
//! `/api/v1/auth/**` therefore covers `/api/v1/auth`, `/api/v1/auth/token`,
//! and `/api/v1/auth/refresh/x`, while `/api/*/health` covers
//! `/api/v1/health` but not `/api/v1/live/health`. A `**` anywhere but the
//! final segment is matched as the literal text `**`.

/// A borrowed view of the request line, the sole input to matching.
///
/// Constructed by the HTTP layer from the incoming request's method and path
/// (query string excluded). Matching never needs headers or the body, so the
/// framework stays independent of any particular HTTP stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyRequest<'a> {
    method: &'a str,
    path: &'a str,
}

impl<'a> PolicyRequest<'a> {
    /// Create a request view. `method` is the uppercase HTTP method
    /// (`"GET"`, `"POST"`, ...); `path` is the URI path without query.
    pub fn new(method: &'a str, path: &'a str) -> Self {
        Self { method, path }
    }

    /// The HTTP method.
    pub fn method(&self) -> &str {
        self.method
    }

    /// The URI path.
    pub fn path(&self) -> &str {
        self.path
    }
}

/// A predicate over [`PolicyRequest`].
///
/// Implemented by [`PathRequestMatcher`] and by any
/// `Fn(&PolicyRequest<'_>) -> bool + Send + Sync` closure.
pub trait RequestMatcher: Send + Sync {
    /// Whether this matcher covers the given request.
    fn matches(&self, request: &PolicyRequest<'_>) -> bool;
}

impl<F> RequestMatcher for F
where
    F: Fn(&PolicyRequest<'_>) -> bool + Send + Sync,
{
    fn matches(&self, request: &PolicyRequest<'_>) -> bool {
        self(request)
    }
}

// ---------------------------------------------------------------------------
// Path patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternSegment {
    Literal(String),
    AnyOne,
}

/// A compiled path pattern (see the module docs for the pattern language).
///
/// Compilation is infallible: every string is a valid pattern. Patterns are
/// compiled once at chain-build time and matched per request without
/// allocating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPattern {
    raw: String,
    segments: Vec<PatternSegment>,
    match_suffix: bool,
}

impl PathPattern {
    /// Compile a pattern.
    pub fn new(pattern: impl Into<String>) -> Self {
        let raw = pattern.into();
        let mut parts: Vec<&str> = raw.split('/').filter(|s| !s.is_empty()).collect();
        let match_suffix = parts.last() == Some(&"**");
        if match_suffix {
            parts.pop();
        }
        let segments = parts
            .into_iter()
            .map(|s| {
                if s == "*" {
                    PatternSegment::AnyOne
                } else {
                    PatternSegment::Literal(s.to_string())
                }
            })
            .collect();
        Self {
            raw,
            segments,
            match_suffix,
        }
    }

    /// The pattern source text.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether `path` matches this pattern.
    pub fn matches(&self, path: &str) -> bool {
        let mut actual = path.split('/').filter(|s| !s.is_empty());
        for expected in &self.segments {
            let Some(segment) = actual.next() else {
                return false;
            };
            match expected {
                PatternSegment::Literal(lit) => {
                    if segment != lit {
                        return false;
                    }
                }
                PatternSegment::AnyOne => {}
            }
        }
        // All pattern segments consumed; the remainder decides.
        self.match_suffix || actual.next().is_none()
    }
}

impl std::fmt::Display for PathPattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.raw)
    }
}

/// Matches requests by path pattern, optionally constrained to one method.
#[derive(Debug, Clone)]
pub struct PathRequestMatcher {
    method: Option<String>,
    pattern: PathPattern,
}

impl PathRequestMatcher {
    /// Match `pattern` on any method.
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            method: None,
            pattern: PathPattern::new(pattern),
        }
    }

    /// Match `pattern` only for `method` (uppercase, e.g. `"POST"`).
    pub fn with_method(method: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            method: Some(method.into()),
            pattern: PathPattern::new(pattern),
        }
    }

    /// The compiled pattern.
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }
}

impl RequestMatcher for PathRequestMatcher {
    fn matches(&self, request: &PolicyRequest<'_>) -> bool {
        if let Some(method) = &self.method {
            if method != request.method() {
                return false;
            }
        }
        self.pattern.matches(request.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req<'a>(method: &'a str, path: &'a str) -> PolicyRequest<'a> {
        PolicyRequest::new(method, path)
    }

    // -- PathPattern --

    #[test]
    fn literal_pattern_exact_match() {
        let p = PathPattern::new("/api/v1/health");
        assert!(p.matches("/api/v1/health"));
        assert!(!p.matches("/api/v1/health/live"));
        assert!(!p.matches("/api/v1"));
    }

    #[test]
    fn single_star_matches_one_segment() {
        let p = PathPattern::new("/api/*/health");
        assert!(p.matches("/api/v1/health"));
        assert!(p.matches("/api/v2/health"));
        assert!(!p.matches("/api/health")); // star needs a segment
        assert!(!p.matches("/api/v1/live/health")); // star never crosses '/'
    }

    #[test]
    fn double_star_matches_any_suffix() {
        let p = PathPattern::new("/api/v1/auth/**");
        assert!(p.matches("/api/v1/auth"));
        assert!(p.matches("/api/v1/auth/token"));
        assert!(p.matches("/api/v1/auth/refresh/extra"));
        assert!(!p.matches("/api/v1/other"));
    }

    #[test]
    fn bare_double_star_matches_everything() {
        let p = PathPattern::new("/**");
        assert!(p.matches("/"));
        assert!(p.matches("/anything"));
        assert!(p.matches("/a/b/c"));
    }

    #[test]
    fn trailing_slash_is_insignificant() {
        let p = PathPattern::new("/api/v1/health");
        assert!(p.matches("/api/v1/health/"));
    }

    #[test]
    fn pattern_display_is_source_text() {
        let p = PathPattern::new("/api/v1/**");
        assert_eq!(p.to_string(), "/api/v1/**");
        assert_eq!(p.as_str(), "/api/v1/**");
    }

    // -- PathRequestMatcher --

    #[test]
    fn matcher_without_method_ignores_method() {
        let m = PathRequestMatcher::new("/api/v1/messages/**");
        assert!(m.matches(&req("GET", "/api/v1/messages/1")));
        assert!(m.matches(&req("DELETE", "/api/v1/messages/1")));
    }

    #[test]
    fn matcher_with_method_requires_method() {
        let m = PathRequestMatcher::with_method("POST", "/api/v1/auth/token");
        assert!(m.matches(&req("POST", "/api/v1/auth/token")));
        assert!(!m.matches(&req("GET", "/api/v1/auth/token")));
    }

    // -- Closure matchers --

    #[test]
    fn closures_are_matchers() {
        let m = |r: &PolicyRequest<'_>| r.path().ends_with(".json");
        assert!(m.matches(&req("GET", "/.well-known/jwks.json")));
        assert!(!m.matches(&req("GET", "/api/v1/health")));
    }

    // -- Properties --

    #[test]
    fn proptest_suffix_pattern_covers_all_extensions() {
        use proptest::prelude::*;

        proptest!(|(suffix in "[a-z0-9/]{0,24}")| {
            let p = PathPattern::new("/api/**");
            let path = format!("/api/{suffix}");
            prop_assert!(p.matches(&path));
        });
    }

    #[test]
    fn proptest_literal_pattern_matches_only_itself() {
        use proptest::prelude::*;

        proptest!(|(a in "[a-z]{1,8}", b in "[a-z]{1,8}")| {
            let exact = format!("/{a}/{b}");
            let longer = format!("/{a}/{b}/extra");
            let shorter = format!("/{a}");
            let p = PathPattern::new(exact.clone());
            prop_assert!(p.matches(&exact));
            prop_assert!(!p.matches(&longer));
            prop_assert!(!p.matches(&shorter));
        });
    }
}
