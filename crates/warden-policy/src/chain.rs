//! # Policy Chains
//!
//! An ordered list of `(matcher, decision)` rules plus a default decision,
//! generic over the decision type `D`. One chain instance backs one concrete
//! filter; the decision payload is whatever that filter needs — a plain
//! `bool` for apply/exempt concerns, a limiter name for rate limiting, a
//! header-constraint set for header validation.
//!
//! ## Closed Groups
//!
//! The builder never keeps a hidden "rules added since the last call" cursor.
//! [`PolicyChainBuilder::request_matchers`] returns a [`MatcherGroup`] that
//! owns exactly the matchers given to it; the group's terminal method
//! consumes it, binds the decision to those matchers, and hands the builder
//! back. Between opening a group and closing it no other mutation is
//! possible, because the builder itself has moved into the group.
//!
//! ```
//! use warden_policy::{FilterOrder, PolicyChain, PolicyRequest};
//!
//! let chain: PolicyChain<bool> = PolicyChain::builder(FilterOrder::RateLimit, false)
//!     .request_matchers(["/api/v1/health/**"])
//!     .decide(false)
//!     .any_request()
//!     .decide(true)
//!     .build();
//!
//! assert!(!chain.decide(&PolicyRequest::new("GET", "/api/v1/health/live")));
//! assert!(chain.decide(&PolicyRequest::new("POST", "/api/v1/messages")));
//! ```

use std::sync::Arc;

use crate::matcher::{PathRequestMatcher, PolicyRequest, RequestMatcher};
use crate::order::FilterOrder;

/// One `(matcher, decision)` entry of a chain.
pub struct PolicyRule<D> {
    matcher: Arc<dyn RequestMatcher>,
    decision: D,
}

impl<D> PolicyRule<D> {
    /// The decision this rule yields when its matcher matches.
    pub fn decision(&self) -> &D {
        &self.decision
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for PolicyRule<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRule")
            .field("decision", &self.decision)
            .finish_non_exhaustive()
    }
}

/// Immutable first-match-wins policy chain (see the module docs).
pub struct PolicyChain<D> {
    rules: Vec<PolicyRule<D>>,
    default_decision: D,
    order: FilterOrder,
}

impl<D> PolicyChain<D> {
    /// Start building a chain for the filter at `order`, with
    /// `default_decision` applying to requests no rule matches. The default
    /// can be replaced later through [`PolicyChainBuilder::any_request`].
    pub fn builder(order: FilterOrder, default_decision: D) -> PolicyChainBuilder<D> {
        PolicyChainBuilder {
            rules: Vec::new(),
            default_decision,
            order,
            any_request_bound: false,
        }
    }

    /// Evaluate the chain: the decision of the first rule whose matcher
    /// matches `request`, or the default decision when none does.
    pub fn decide(&self, request: &PolicyRequest<'_>) -> &D {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(request))
            .map(|rule| &rule.decision)
            .unwrap_or(&self.default_decision)
    }

    /// The chain's position in the filter pipeline.
    pub fn order(&self) -> FilterOrder {
        self.order
    }

    /// The decision applied when no rule matches.
    pub fn default_decision(&self) -> &D {
        &self.default_decision
    }

    /// Number of registered rules (excluding the default).
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the chain has no rules beyond the default.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<D: std::fmt::Debug> std::fmt::Debug for PolicyChain<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyChain")
            .field("order", &self.order)
            .field("rules", &self.rules.len())
            .field("default_decision", &self.default_decision)
            .finish()
    }
}

/// Accumulates rules for a [`PolicyChain`]. Obtained from
/// [`PolicyChain::builder`]; consumed by [`build`](Self::build).
pub struct PolicyChainBuilder<D> {
    rules: Vec<PolicyRule<D>>,
    default_decision: D,
    order: FilterOrder,
    any_request_bound: bool,
}

impl<D> PolicyChainBuilder<D> {
    /// Open a group over path patterns (any method).
    pub fn request_matchers<I, S>(self, patterns: I) -> MatcherGroup<D>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let matchers = patterns
            .into_iter()
            .map(|p| Arc::new(PathRequestMatcher::new(p)) as Arc<dyn RequestMatcher>)
            .collect();
        MatcherGroup {
            builder: self,
            matchers,
            catch_all: false,
        }
    }

    /// Open a group over path patterns constrained to one HTTP method.
    pub fn request_matchers_with_method<I, S>(self, method: &str, patterns: I) -> MatcherGroup<D>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let matchers = patterns
            .into_iter()
            .map(|p| {
                Arc::new(PathRequestMatcher::with_method(method, p)) as Arc<dyn RequestMatcher>
            })
            .collect();
        MatcherGroup {
            builder: self,
            matchers,
            catch_all: false,
        }
    }

    /// Open a group over one arbitrary matcher.
    pub fn matching(self, matcher: impl RequestMatcher + 'static) -> MatcherGroup<D> {
        MatcherGroup {
            builder: self,
            matchers: vec![Arc::new(matcher)],
            catch_all: false,
        }
    }

    /// Open the catch-all group: its terminal decision becomes the chain's
    /// default.
    ///
    /// # Panics
    ///
    /// Panics if the catch-all was already configured on this builder.
    /// Registering two catch-alls is a programming error — the second would
    /// silently overwrite the first — so it fails fast at build time.
    pub fn any_request(self) -> MatcherGroup<D> {
        assert!(
            !self.any_request_bound,
            "any_request() can only be called once per policy chain"
        );
        MatcherGroup {
            builder: self,
            matchers: Vec::new(),
            catch_all: true,
        }
    }

    /// Finish the chain.
    pub fn build(self) -> PolicyChain<D> {
        PolicyChain {
            rules: self.rules,
            default_decision: self.default_decision,
            order: self.order,
        }
    }
}

/// A closed matcher group awaiting its decision. Terminal methods consume
/// the group and return the builder.
pub struct MatcherGroup<D> {
    builder: PolicyChainBuilder<D>,
    matchers: Vec<Arc<dyn RequestMatcher>>,
    catch_all: bool,
}

impl<D: Clone> MatcherGroup<D> {
    /// Bind `decision` to every matcher in this group (or, for the
    /// catch-all group, install it as the chain default) and return the
    /// builder.
    pub fn decide(mut self, decision: D) -> PolicyChainBuilder<D> {
        if self.catch_all {
            self.builder.default_decision = decision;
            self.builder.any_request_bound = true;
        } else {
            for matcher in self.matchers {
                self.builder.rules.push(PolicyRule {
                    matcher,
                    decision: decision.clone(),
                });
            }
        }
        self.builder
    }
}

impl MatcherGroup<bool> {
    /// Exempt this group's requests from the filter (`decide(false)`).
    pub fn permit_all(self) -> PolicyChainBuilder<bool> {
        self.decide(false)
    }

    /// Apply the filter to this group's requests (`decide(true)`).
    pub fn apply(self) -> PolicyChainBuilder<bool> {
        self.decide(true)
    }
}
