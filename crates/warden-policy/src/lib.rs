//! # warden-policy — Ordered Policy-Filter Framework
//!
//! The declarative core of the Warden security pipeline. Every cross-cutting
//! HTTP concern (rate limiting, detached signatures, payload encryption,
//! sanitization, header validation, API versioning, tracing) is driven by the
//! same mechanism: an ordered list of `(request matcher, decision)` rules plus
//! a default decision, evaluated first-match-wins per request.
//!
//! ## Evaluation Model
//!
//! A [`PolicyChain<D>`] holds rules in registration order. For an inbound
//! request the chain returns the decision of the **first** rule whose matcher
//! matches; if none match, the default decision. Registration order is
//! precedence — register specific matchers before broad ones. Evaluation is
//! O(n) in rule count and allocation-free.
//!
//! ## Builder
//!
//! Chains are built once at startup and are immutable afterwards.
//! [`PolicyChainBuilder::request_matchers`] opens a closed [`MatcherGroup`]
//! whose terminal method fixes the decision for exactly the matchers in that
//! group; [`PolicyChainBuilder::any_request`] opens the catch-all group that
//! fixes the chain's default decision and may be taken at most once — a
//! second call is a programming error and panics at build time.
//!
//! ## Pipeline Order
//!
//! Matching decides *whether* a filter acts on a given request; the
//! [`FilterOrder`] registry decides *where* the filter sits in the pipeline.
//! The two are deliberately independent: a filter keeps its fixed position
//! even on requests it passes through untouched.

pub mod chain;
pub mod filter;
pub mod matcher;
pub mod order;
pub mod principal;

pub use chain::{MatcherGroup, PolicyChain, PolicyChainBuilder, PolicyRule};
pub use filter::PolicyFilter;
pub use matcher::{PathPattern, PathRequestMatcher, PolicyRequest, RequestMatcher};
pub use order::FilterOrder;
pub use principal::{authority, Principal};
