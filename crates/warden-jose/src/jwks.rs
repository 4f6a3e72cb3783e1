//! JWK export of the subsystem's public keys.
//!
//! Three entries, one per pair, in kid order: `1` (detached signatures),
//! `2` (auth tokens), `3` (payload envelopes). Only public parameters
//! leave this module.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use rsa::traits::PublicKeyParts;
use serde::{Deserialize, Serialize};

use crate::keys::{KeyMaterial, RsaKeyPair};

/// One RSA public key in JWK form (RFC 7517).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub public_key_use: String,
    pub alg: String,
    /// Modulus, minimal big-endian, base64url.
    pub n: String,
    /// Exponent, minimal big-endian, base64url.
    pub e: String,
}

impl Jwk {
    fn from_pair(pair: &RsaKeyPair, public_key_use: &str, alg: &str) -> Self {
        let public = pair.public();
        Self {
            kty: "RSA".to_string(),
            kid: pair.kid().to_string(),
            public_key_use: public_key_use.to_string(),
            alg: alg.to_string(),
            n: URL_SAFE_NO_PAD.encode(public.n().to_bytes_be()),
            e: URL_SAFE_NO_PAD.encode(public.e().to_bytes_be()),
        }
    }
}

/// The full key set served at `/.well-known/jwks.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    pub fn from_material(material: &KeyMaterial) -> Self {
        Self {
            keys: vec![
                Jwk::from_pair(material.jws(), "sig", "RS256"),
                Jwk::from_pair(material.jwt(), "sig", "RS256"),
                Jwk::from_pair(material.jwe(), "enc", "RSA-OAEP-256"),
            ],
        }
    }
}
