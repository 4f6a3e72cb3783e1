//! # warden-jose — Token Issuance and JOSE Codec
//!
//! This crate is the security token subsystem of the workspace:
//!
//! - **RS256 auth tokens**: access / identity / refresh triples issued by
//!   [`TokenProvider`], optionally sealed into JWE envelopes for transport.
//! - **Refresh rotation** with single-use semantics backed by a pluggable
//!   [`TokenStore`]; replayed tokens surface as revoked.
//! - **Detached JWS signatures** over arbitrary payloads, carrying the
//!   payload's SHA-256 digest rather than the payload itself.
//! - **JWE payload envelopes** (RSA-OAEP-256 + A256GCM) that sign, then
//!   encrypt, arbitrary JSON values.
//! - **JWK export** of the three public keys for off-box verification.
//!
//! ## Key Pairs
//!
//! Three RSA-2048 pairs with fixed kids: `1` signs detached signatures,
//! `2` signs (and when enabled, seals) auth tokens, `3` signs and seals
//! payload envelopes. Key material is loaded through [`KeySource`] or
//! generated at startup.
//!
//! ## Persistence
//!
//! Refresh tokens live in an [`InMemoryTokenStore`] by default; the
//! `postgres` feature adds a sqlx-backed store for multi-node deployments.

pub mod claims;
pub mod codec;
pub mod error;
pub mod jwks;
pub mod keys;
pub mod provider;
pub mod store;

// Re-export primary types.
pub use claims::{Token, TokenClaims, TOKEN_TYPE_BEARER};
pub use codec::{classify, TokenShape};
pub use error::SecurityError;
pub use jwks::{Jwk, JwkSet};
pub use keys::{kid, KeyMaterial, KeyPairSources, KeySource, RsaKeyPair};
pub use provider::{IdentityProfile, TokenProvider, TokenSettings};
pub use store::{InMemoryTokenStore, TokenRecord, TokenStore};

#[cfg(feature = "postgres")]
pub use store::postgres::PostgresTokenStore;

/// Shared key material for tests. RSA generation is slow enough that every
/// test in the crate reuses one set.
#[cfg(test)]
pub(crate) mod testkeys {
    use crate::keys::KeyMaterial;
    use std::sync::{Arc, OnceLock};

    static MATERIAL: OnceLock<Arc<KeyMaterial>> = OnceLock::new();

    fn shared() -> &'static Arc<KeyMaterial> {
        MATERIAL.get_or_init(|| Arc::new(KeyMaterial::generate().expect("test key material")))
    }

    pub fn material() -> &'static KeyMaterial {
        shared()
    }

    pub fn material_arc() -> Arc<KeyMaterial> {
        Arc::clone(shared())
    }
}
