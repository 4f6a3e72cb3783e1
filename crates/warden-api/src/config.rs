//! # Runtime Configuration
//!
//! YAML-backed configuration for the server binary, deserialized into
//! plain settings structs. A missing file yields the full default
//! configuration: ephemeral generated keys, the sample identity, and the
//! stock filter policies.
//!
//! Key material is the one fatal concern: when sources are configured but
//! unreadable the process must refuse to start, so [`KeySettings::load`]
//! errors propagate out of `main` instead of being defaulted away.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use warden_jose::{KeyMaterial, KeyPairSources, SecurityError, TokenSettings};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerSettings,
    pub auth: AuthSettings,
    pub keys: KeySettings,
    pub token: TokenSettings,
    pub filters: FilterSettings,
    pub database: Option<DatabaseSettings>,
}

impl AppConfig {
    /// Load configuration from `path`, or defaults when `path` is `None`,
    /// then apply environment overrides and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            None => Self::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(port) = std::env::var("PORT").ok().and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Ok(url) = std::env::var("WARDEN_DATABASE_URL") {
            let settings = self.database.get_or_insert_with(DatabaseSettings::default);
            settings.url = url;
        }
        if let Some(enabled) = std::env::var("WARDEN_JWE_ENABLED")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.token.jwe_enabled = enabled;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for rule in &self.filters.headers {
            if let Some(pattern) = &rule.pattern {
                Regex::new(pattern).map_err(|e| {
                    ConfigError::Invalid(format!(
                        "header rule for {}: bad pattern: {e}",
                        rule.header
                    ))
                })?;
            }
            if rule.min_length > rule.max_length {
                return Err(ConfigError::Invalid(format!(
                    "header rule for {}: min_length exceeds max_length",
                    rule.header
                )));
            }
        }
        let limiters = self.filters.effective_limiters();
        for route in &self.filters.rate_limited_paths {
            if !limiters.contains_key(&route.limiter) {
                return Err(ConfigError::Invalid(format!(
                    "rate limit rule for {} names unknown limiter {}",
                    route.pattern, route.limiter
                )));
            }
        }
        for (name, limiter) in &limiters {
            if limiter.limit_for_period == 0 || limiter.refresh_period_secs == 0 {
                return Err(ConfigError::Invalid(format!(
                    "limiter {name}: limit_for_period and refresh_period_secs must be positive"
                )));
            }
        }
        Ok(())
    }
}

// ─── Server & credentials ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Password for the configured identity. The username and display
/// attributes live in [`TokenSettings::identity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// Sample credential; override in any real deployment.
    pub password: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            password: "password".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 5,
        }
    }
}

// ─── Key material ──────────────────────────────────────────────────────────

/// PEM sources for the three RSA pairs. Either all three are configured or
/// none: a partial set is a configuration error, and an absent set means
/// ephemeral keys are generated at startup (tokens do not survive restarts).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct KeySettings {
    pub jwt: Option<KeyPairSources>,
    pub jws: Option<KeyPairSources>,
    pub jwe: Option<KeyPairSources>,
}

impl KeySettings {
    pub fn load(&self) -> Result<KeyMaterial, SecurityError> {
        match (&self.jwt, &self.jws, &self.jwe) {
            (None, None, None) => {
                tracing::warn!("no key material configured, generating ephemeral RSA pairs");
                KeyMaterial::generate()
            }
            (Some(jwt), Some(jws), Some(jwe)) => KeyMaterial::from_sources(jwt, jws, jwe),
            _ => Err(SecurityError::KeyMaterial(
                "either all three key pairs must be configured or none".to_string(),
            )),
        }
    }
}

// ─── Filter policies ───────────────────────────────────────────────────────

/// Per-filter route policies. Lists extend the built-in defaults; the
/// chains themselves are assembled in the middleware module.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSettings {
    /// Extra paths reachable without a bearer token.
    pub public_paths: Vec<String>,
    /// Extra paths exempt from detached-signature verification and
    /// response signing.
    pub unsigned_paths: Vec<String>,
    /// Extra paths exempt from request sanitization.
    pub unsanitized_paths: Vec<String>,
    /// Paths whose request bodies arrive as `{"token": "<JWE>"}` and are
    /// decrypted before the handler runs.
    pub decrypt_paths: Vec<String>,
    /// Paths whose response bodies are sealed into `{"token": "<JWE>"}`.
    pub encrypt_paths: Vec<String>,
    /// Header rules merged put-if-absent over the trace-header defaults.
    pub headers: Vec<HeaderRule>,
    /// API versions served in addition to `v1`.
    pub api_versions: Vec<String>,
    /// Named limiters merged over the built-in `default` and `jwks` ones.
    pub limiters: BTreeMap<String, LimiterSettings>,
    /// Routes bound to a named limiter ahead of the catch-all `default`.
    pub rate_limited_paths: Vec<RateLimitRule>,
}

/// Character set shared by the trace headers.
pub const HEADER_PATTERN: &str = "^[a-zA-Z0-9-]*$";

impl FilterSettings {
    /// Paths that, with the defaults, carry transparently encrypted bodies.
    pub fn effective_decrypt_paths(&self) -> Vec<String> {
        let mut paths = vec!["/api/*/auth/token".to_string()];
        paths.extend(self.decrypt_paths.iter().cloned());
        paths
    }

    pub fn effective_encrypt_paths(&self) -> Vec<String> {
        let mut paths = vec!["/api/*/auth/token".to_string()];
        paths.extend(self.encrypt_paths.iter().cloned());
        paths
    }

    /// Configured header rules plus, put-if-absent, the trace-header
    /// defaults: both correlation headers must be 8-36 characters of
    /// `[a-zA-Z0-9-]` and not blank.
    pub fn effective_headers(&self) -> Vec<HeaderRule> {
        let mut rules = self.headers.clone();
        for default in [
            HeaderRule::trace_default("X-Request-ID"),
            HeaderRule::trace_default("X-Correlation-ID"),
        ] {
            if !rules
                .iter()
                .any(|r| r.header.eq_ignore_ascii_case(&default.header))
            {
                rules.push(default);
            }
        }
        rules
    }

    /// Supported API versions: `v1` plus whatever is configured.
    pub fn effective_versions(&self) -> Vec<String> {
        let mut versions = vec!["v1".to_string()];
        for version in &self.api_versions {
            if !versions.contains(version) {
                versions.push(version.clone());
            }
        }
        versions
    }

    /// Named limiters with the built-ins ensured.
    pub fn effective_limiters(&self) -> BTreeMap<String, LimiterSettings> {
        let mut limiters = self.limiters.clone();
        limiters
            .entry("default".to_string())
            .or_insert(LimiterSettings {
                limit_for_period: 10,
                refresh_period_secs: 1,
            });
        limiters.entry("jwks".to_string()).or_insert(LimiterSettings {
            limit_for_period: 5,
            refresh_period_secs: 1,
        });
        limiters
    }
}

/// Constraint set for one request header, violations accumulating across
/// all configured rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderRule {
    pub header: String,
    pub not_blank: bool,
    pub min_length: usize,
    pub max_length: usize,
    pub pattern: Option<String>,
}

impl Default for HeaderRule {
    fn default() -> Self {
        Self {
            header: String::new(),
            not_blank: false,
            min_length: 0,
            max_length: usize::MAX,
            pattern: None,
        }
    }
}

impl HeaderRule {
    fn trace_default(header: &str) -> Self {
        Self {
            header: header.to_string(),
            not_blank: true,
            min_length: 8,
            max_length: 36,
            pattern: Some(HEADER_PATTERN.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Permits available per refresh period.
    pub limit_for_period: u64,
    /// Window length in seconds.
    pub refresh_period_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub pattern: String,
    pub limiter: String,
}
