//! One generic filter type instead of seven near-duplicates.
//!
//! Every concrete pipeline concern is a [`PolicyFilter<A>`]: a named,
//! ordered [`PolicyChain`] whose decision payload `A` is the action the
//! filter enacts when it intercepts a request. The HTTP layer owns the
//! enactment; this type owns the per-request decision.
//!
//! ```
//! use warden_policy::{FilterOrder, PolicyChain, PolicyFilter, PolicyRequest};
//!
//! let filter = PolicyFilter::new(
//!     "sanitize",
//!     PolicyChain::builder(FilterOrder::Sanitize, false)
//!         .request_matchers(["/actuator/**", "/.well-known/**"])
//!         .permit_all()
//!         .any_request()
//!         .apply()
//!         .build(),
//! );
//!
//! assert!(!filter.applies(&PolicyRequest::new("GET", "/actuator/health")));
//! assert!(filter.applies(&PolicyRequest::new("POST", "/api/v1/messages")));
//! ```

use std::fmt;

use crate::chain::PolicyChain;
use crate::matcher::PolicyRequest;
use crate::order::FilterOrder;

/// A named pipeline filter: one [`PolicyChain`] plus the identity the HTTP
/// layer logs and registers it under.
pub struct PolicyFilter<A> {
    name: &'static str,
    chain: PolicyChain<A>,
}

impl<A> PolicyFilter<A> {
    pub fn new(name: &'static str, chain: PolicyChain<A>) -> Self {
        Self { name, chain }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fixed position in the pipeline, independent of per-request matching.
    pub fn order(&self) -> FilterOrder {
        self.chain.order()
    }

    /// The action to enact for `request`.
    pub fn decide(&self, request: &PolicyRequest<'_>) -> &A {
        self.chain.decide(request)
    }
}

impl PolicyFilter<bool> {
    /// Whether the filter should act on `request` at all. The `false`
    /// branch is the per-route exemption.
    pub fn applies(&self, request: &PolicyRequest<'_>) -> bool {
        *self.decide(request)
    }
}

impl<A: fmt::Debug> fmt::Debug for PolicyFilter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyFilter")
            .field("name", &self.name)
            .field("order", &self.order())
            .field("rules", &self.chain.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Bucket {
        Off,
        Named(&'static str),
    }

    #[test]
    fn decisions_carry_arbitrary_actions() {
        let chain = PolicyChain::builder(FilterOrder::RateLimit, Bucket::Named("default"))
            .request_matchers(["/api/v1/auth/**"])
            .decide(Bucket::Named("auth"))
            .request_matchers(["/actuator/**"])
            .decide(Bucket::Off)
            .build();
        let filter = PolicyFilter::new("rate-limit", chain);

        assert_eq!(filter.name(), "rate-limit");
        assert_eq!(filter.order(), FilterOrder::RateLimit);
        assert_eq!(
            filter.decide(&PolicyRequest::new("POST", "/api/v1/auth/token")),
            &Bucket::Named("auth")
        );
        assert_eq!(
            filter.decide(&PolicyRequest::new("GET", "/actuator/health")),
            &Bucket::Off
        );
        assert_eq!(
            filter.decide(&PolicyRequest::new("GET", "/api/v1/cities")),
            &Bucket::Named("default")
        );
    }

    #[test]
    fn boolean_filters_expose_applies() {
        let chain = PolicyChain::builder(FilterOrder::Logging, true)
            .request_matchers(["/health/**"])
            .permit_all()
            .build();
        let filter = PolicyFilter::new("logging", chain);

        assert!(!filter.applies(&PolicyRequest::new("GET", "/health/liveness")));
        assert!(filter.applies(&PolicyRequest::new("GET", "/api/v1/cities")));
    }
}
