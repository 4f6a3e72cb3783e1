//! # RSA Key Material
//!
//! Three independent RSA key pairs, one per cryptographic domain:
//!
//! | domain | kid | used for |
//! |--------|-----|----------|
//! | JWS | `"1"` | detached payload signatures |
//! | JWT | `"2"` | auth-token signing (and JWE-wrapping of auth tokens) |
//! | JWE | `"3"` | payload encryption envelopes |
//!
//! ## Key Separation
//!
//! The pairs are deliberately independent: the JWE pair never signs auth
//! tokens and the JWT pair never signs detached signatures. Compromise of
//! one domain's key does not compromise the others. [`KeyMaterial`] holds
//! all three and is loaded once at startup; a load failure is fatal before
//! the process serves a single request.
//!
//! Each [`RsaKeyPair`] keeps the same key in two representations: the
//! `jsonwebtoken` encoding/decoding keys for RS256 operations, and the
//! parsed RSA components for OAEP key wrapping and JWKS export.

use std::path::PathBuf;

use jsonwebtoken::{DecodingKey, EncodingKey};
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};

use crate::error::SecurityError;

/// Fixed key ids, one per domain, as published in the JWKS document.
pub mod kid {
    /// Detached-signature (JWS) pair.
    pub const JWS: &str = "1";
    /// Auth-token (JWT) pair.
    pub const JWT: &str = "2";
    /// Payload-encryption (JWE) pair.
    pub const JWE: &str = "3";
}

// ─── Key sources ───────────────────────────────────────────────────────────

/// Where a PEM document comes from. Deserializes from configuration as
/// `inline: <pem>`, `file: <path>`, or `env: <var name>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeySource {
    /// The PEM text itself.
    Inline(String),
    /// Path to a PEM file.
    File(PathBuf),
    /// Name of an environment variable holding the PEM text.
    Env(String),
}

impl KeySource {
    /// Resolve the source to PEM text.
    pub fn resolve(&self) -> Result<String, SecurityError> {
        match self {
            KeySource::Inline(pem) => Ok(pem.clone()),
            KeySource::File(path) => std::fs::read_to_string(path).map_err(|e| {
                SecurityError::KeyMaterial(format!("reading {}: {e}", path.display()))
            }),
            KeySource::Env(var) => std::env::var(var)
                .map_err(|_| SecurityError::KeyMaterial(format!("env var {var} is not set"))),
        }
    }
}

/// The public/private sources for one key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairSources {
    /// Source of the public-key PEM.
    pub public: KeySource,
    /// Source of the private-key PEM.
    pub private: KeySource,
}

// ─── RsaKeyPair ────────────────────────────────────────────────────────────

/// One domain's RSA key pair, ready for both RS256 and OAEP use.
pub struct RsaKeyPair {
    kid: &'static str,
    encoding: EncodingKey,
    decoding: DecodingKey,
    public: RsaPublicKey,
    private: RsaPrivateKey,
}

impl RsaKeyPair {
    /// Parse a pair from PEM text. Accepts PKCS#8 (`PRIVATE KEY` /
    /// `PUBLIC KEY`) and PKCS#1 (`RSA PRIVATE KEY` / `RSA PUBLIC KEY`)
    /// encodings.
    pub fn from_pem(
        kid: &'static str,
        public_pem: &str,
        private_pem: &str,
    ) -> Result<Self, SecurityError> {
        let private = RsaPrivateKey::from_pkcs8_pem(private_pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(private_pem))
            .map_err(|e| SecurityError::KeyMaterial(format!("private key (kid {kid}): {e}")))?;
        let public = RsaPublicKey::from_public_key_pem(public_pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(public_pem))
            .map_err(|e| SecurityError::KeyMaterial(format!("public key (kid {kid}): {e}")))?;
        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| SecurityError::KeyMaterial(format!("private key (kid {kid}): {e}")))?;
        let decoding = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| SecurityError::KeyMaterial(format!("public key (kid {kid}): {e}")))?;
        Ok(Self {
            kid,
            encoding,
            decoding,
            public,
            private,
        })
    }

    /// Generate a fresh 2048-bit pair. For development servers and tests;
    /// production deployments load provisioned PEMs.
    pub fn generate(kid: &'static str) -> Result<Self, SecurityError> {
        let mut rng = rand::rngs::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 2048)
            .map_err(|e| SecurityError::KeyMaterial(format!("generating kid {kid}: {e}")))?;
        let private_pem = private
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| SecurityError::KeyMaterial(format!("encoding kid {kid}: {e}")))?;
        let public_pem = private
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| SecurityError::KeyMaterial(format!("encoding kid {kid}: {e}")))?;
        Self::from_pem(kid, &public_pem, &private_pem)
    }

    /// Load a pair from configured sources.
    pub fn from_sources(kid: &'static str, sources: &KeyPairSources) -> Result<Self, SecurityError> {
        let public_pem = sources.public.resolve()?;
        let private_pem = sources.private.resolve()?;
        Self::from_pem(kid, &public_pem, &private_pem)
    }

    /// The key id published in the JWKS document.
    pub fn kid(&self) -> &'static str {
        self.kid
    }

    /// RS256 signing key.
    pub fn encoding(&self) -> &EncodingKey {
        &self.encoding
    }

    /// RS256 verification key.
    pub fn decoding(&self) -> &DecodingKey {
        &self.decoding
    }

    /// RSA public key (OAEP encryption, JWKS export).
    pub fn public(&self) -> &RsaPublicKey {
        &self.public
    }

    /// RSA private key (OAEP decryption).
    pub fn private(&self) -> &RsaPrivateKey {
        &self.private
    }
}

impl std::fmt::Debug for RsaKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Key material never appears in debug output.
        f.debug_struct("RsaKeyPair").field("kid", &self.kid).finish_non_exhaustive()
    }
}

// ─── KeyMaterial ───────────────────────────────────────────────────────────

/// The three domain pairs, loaded once and shared read-only.
#[derive(Debug)]
pub struct KeyMaterial {
    jwt: RsaKeyPair,
    jws: RsaKeyPair,
    jwe: RsaKeyPair,
}

impl KeyMaterial {
    /// Load all three pairs from configured sources.
    pub fn from_sources(
        jwt: &KeyPairSources,
        jws: &KeyPairSources,
        jwe: &KeyPairSources,
    ) -> Result<Self, SecurityError> {
        Ok(Self {
            jwt: RsaKeyPair::from_sources(kid::JWT, jwt)?,
            jws: RsaKeyPair::from_sources(kid::JWS, jws)?,
            jwe: RsaKeyPair::from_sources(kid::JWE, jwe)?,
        })
    }

    /// Generate all three pairs. For development servers and tests.
    pub fn generate() -> Result<Self, SecurityError> {
        Ok(Self {
            jwt: RsaKeyPair::generate(kid::JWT)?,
            jws: RsaKeyPair::generate(kid::JWS)?,
            jwe: RsaKeyPair::generate(kid::JWE)?,
        })
    }

    /// Auth-token pair (kid `"2"`).
    pub fn jwt(&self) -> &RsaKeyPair {
        &self.jwt
    }

    /// Detached-signature pair (kid `"1"`).
    pub fn jws(&self) -> &RsaKeyPair {
        &self.jws
    }

    /// Payload-encryption pair (kid `"3"`).
    pub fn jwe(&self) -> &RsaKeyPair {
        &self.jwe
    }
}
