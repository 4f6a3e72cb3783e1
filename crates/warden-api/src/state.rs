//! Shared application state: everything the handlers and filters need,
//! built once at startup and cloned cheaply per request.

use std::sync::Arc;

use warden_jose::{KeyMaterial, TokenProvider, TokenStore};

use crate::config::AppConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::middleware::FilterPipeline;
use crate::ratelimit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<TokenProvider>,
    pub pipeline: Arc<FilterPipeline>,
    pub limiter: Arc<RateLimiter>,
    pub metrics: ApiMetrics,
    /// Password of the configured identity; its username and display
    /// attributes live in the provider's settings.
    pub password: Arc<str>,
}

impl AppState {
    pub fn new(config: &AppConfig, keys: Arc<KeyMaterial>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            provider: Arc::new(TokenProvider::new(keys, store, config.token.clone())),
            pipeline: Arc::new(FilterPipeline::from_settings(&config.filters)),
            limiter: Arc::new(RateLimiter::new(config.filters.effective_limiters())),
            metrics: ApiMetrics::new(),
            password: Arc::from(config.auth.password.as_str()),
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}
