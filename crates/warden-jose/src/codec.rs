//! # Compact JOSE Codec
//!
//! The wire layer: RS256 signing/verification of claim sets and the
//! five-part compact JWE envelope (RSA-OAEP-256 key wrapping, A256GCM
//! content encryption). Byte-compatible with standard JOSE libraries —
//! tokens sealed here open elsewhere and vice versa.
//!
//! ## Shape Classification
//!
//! Every token entering the subsystem is first classified by
//! [`classify`]: three dot-separated segments is a plain signed token,
//! five is a JWE envelope, anything else is malformed. Call sites branch
//! on the returned [`TokenShape`] instead of counting separators
//! themselves.
//!
//! ## Envelope Construction
//!
//! Sealing generates a fresh 256-bit content-encryption key and 96-bit IV
//! per envelope, wraps the CEK with RSA-OAEP (SHA-256), and authenticates
//! the protected header by passing its transmitted base64url form as GCM
//! associated data. The final 16 bytes of the GCM output travel as the
//! separate tag segment.

use aes_gcm::aead::{Aead, KeyInit, Payload};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use jsonwebtoken::{decode, encode, Algorithm, Header, Validation};
use rand::RngCore;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::claims::TokenClaims;
use crate::error::SecurityError;
use crate::keys::RsaKeyPair;

/// Key-wrapping algorithm for envelopes.
const JWE_ALG: &str = "RSA-OAEP-256";
/// Content-encryption algorithm for envelopes.
const JWE_ENC: &str = "A256GCM";
/// GCM authentication tag length in bytes.
const GCM_TAG_LEN: usize = 16;

/// The two valid shapes of a compact token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenShape {
    /// `header.payload.signature` — a signed token.
    Plain,
    /// `header.key.iv.ciphertext.tag` — a JWE envelope.
    Wrapped,
}

/// Classify a compact token by segment count.
pub fn classify(token: &str) -> Result<TokenShape, SecurityError> {
    match token.split('.').count() {
        3 => Ok(TokenShape::Plain),
        5 => Ok(TokenShape::Wrapped),
        n => Err(SecurityError::MalformedToken(format!(
            "compact serialization has {n} segments, expected 3 or 5"
        ))),
    }
}

// ─── RS256 signing ─────────────────────────────────────────────────────────

/// Sign a claim set with `key` as a compact RS256 token. The header carries
/// the pair's kid so verifiers can correlate against the published JWKS.
pub fn sign_claims(claims: &TokenClaims, key: &RsaKeyPair) -> Result<String, SecurityError> {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(key.kid().to_string());
    encode(&header, claims, key.encoding()).map_err(|e| SecurityError::Encoding(e.to_string()))
}

/// Verify a compact RS256 token against `key` and `issuer`, with exact
/// (zero-leeway) expiry checking, and return its claims.
pub fn verify_claims(
    token: &str,
    key: &RsaKeyPair,
    issuer: &str,
) -> Result<TokenClaims, SecurityError> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = 0;
    validation.set_issuer(&[issuer]);
    decode::<TokenClaims>(token, key.decoding(), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SecurityError::ExpiredToken,
            jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                SecurityError::InvalidSignature("signature does not verify".into())
            }
            _ => SecurityError::MalformedToken(e.to_string()),
        })
}

// ─── JWE envelope ──────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct JweHeader {
    alg: String,
    enc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    cty: Option<String>,
}

/// Seal `payload` into a compact JWE for `recipient`. The content type is
/// declared as `JWT` — the subsystem only ever wraps signed tokens.
pub fn seal(payload: &[u8], recipient: &RsaPublicKey) -> Result<String, SecurityError> {
    let header = JweHeader {
        alg: JWE_ALG.to_string(),
        enc: JWE_ENC.to_string(),
        cty: Some("JWT".to_string()),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| SecurityError::Encoding(e.to_string()))?;
    let header_b64 = URL_SAFE_NO_PAD.encode(header_json);

    let mut rng = rand::rngs::OsRng;
    let mut cek = [0u8; 32];
    rng.fill_bytes(&mut cek);
    let encrypted_key = recipient
        .encrypt(&mut rng, Oaep::new::<Sha256>(), &cek)
        .map_err(|e| SecurityError::Encoding(format!("key wrap: {e}")))?;

    let mut iv = [0u8; 12];
    rng.fill_bytes(&mut iv);

    let cipher = Aes256Gcm::new_from_slice(&cek)
        .map_err(|e| SecurityError::Encoding(format!("content key: {e}")))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: payload,
                aad: header_b64.as_bytes(),
            },
        )
        .map_err(|_| SecurityError::Encoding("content encryption failed".into()))?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - GCM_TAG_LEN);

    Ok([
        header_b64.as_str(),
        &URL_SAFE_NO_PAD.encode(encrypted_key),
        &URL_SAFE_NO_PAD.encode(iv),
        &URL_SAFE_NO_PAD.encode(ciphertext),
        &URL_SAFE_NO_PAD.encode(tag),
    ]
    .join("."))
}

/// Open a compact JWE with `private` and return the plaintext payload.
/// The transmitted header segment is authenticated as GCM associated data,
/// so any header tampering fails the tag check.
pub fn open(token: &str, private: &RsaPrivateKey) -> Result<Vec<u8>, SecurityError> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 5 {
        return Err(SecurityError::MalformedToken(format!(
            "envelope has {} segments, expected 5",
            parts.len()
        )));
    }

    let header: JweHeader = serde_json::from_slice(&b64_decode(parts[0], "protected header")?)
        .map_err(|_| SecurityError::MalformedToken("protected header is not valid JSON".into()))?;
    if header.alg != JWE_ALG || header.enc != JWE_ENC {
        return Err(SecurityError::MalformedToken(format!(
            "unsupported envelope algorithms {}/{}",
            header.alg, header.enc
        )));
    }

    let cek = private
        .decrypt(Oaep::new::<Sha256>(), &b64_decode(parts[1], "encrypted key")?)
        .map_err(|_| SecurityError::MalformedToken("key unwrap failed".into()))?;
    if cek.len() != 32 {
        return Err(SecurityError::MalformedToken(
            "content key is not 256 bits".into(),
        ));
    }

    let iv = b64_decode(parts[2], "initialization vector")?;
    if iv.len() != 12 {
        return Err(SecurityError::MalformedToken(
            "initialization vector is not 96 bits".into(),
        ));
    }
    let tag = b64_decode(parts[4], "authentication tag")?;
    if tag.len() != GCM_TAG_LEN {
        return Err(SecurityError::MalformedToken(
            "authentication tag is not 128 bits".into(),
        ));
    }

    let mut message = b64_decode(parts[3], "ciphertext")?;
    message.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(&cek)
        .map_err(|_| SecurityError::MalformedToken("content key is unusable".into()))?;
    cipher
        .decrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &message,
                aad: parts[0].as_bytes(),
            },
        )
        .map_err(|_| SecurityError::MalformedToken("envelope authentication failed".into()))
}

fn b64_decode(segment: &str, what: &str) -> Result<Vec<u8>, SecurityError> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|_| SecurityError::MalformedToken(format!("{what} is not base64url")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkeys;
    use chrono::{Duration, Utc};

    const ISSUER: &str = "https://warden.example";

    fn access_claims(ttl: Duration) -> TokenClaims {
        TokenClaims::access(
            "alice",
            &["ROLE_USER".to_string()],
            ISSUER,
            Utc::now(),
            ttl,
        )
    }

    // -- classify --

    #[test]
    fn classify_plain_and_wrapped() {
        assert_eq!(classify("a.b.c").unwrap(), TokenShape::Plain);
        assert_eq!(classify("a.b.c.d.e").unwrap(), TokenShape::Wrapped);
    }

    #[test]
    fn classify_rejects_other_segment_counts() {
        for token in ["", "a", "a.b", "a.b.c.d", "a.b.c.d.e.f"] {
            assert!(
                matches!(classify(token), Err(SecurityError::MalformedToken(_))),
                "{token:?} should be malformed"
            );
        }
    }

    // -- RS256 --

    #[test]
    fn sign_verify_roundtrip() {
        let key = testkeys::material().jwt();
        let claims = access_claims(Duration::seconds(60));
        let token = sign_claims(&claims, key).unwrap();

        assert_eq!(classify(&token).unwrap(), TokenShape::Plain);
        let verified = verify_claims(&token, key, ISSUER).unwrap();
        assert_eq!(verified, claims);
    }

    #[test]
    fn header_carries_kid() {
        let key = testkeys::material().jwt();
        let token = sign_claims(&access_claims(Duration::seconds(60)), key).unwrap();
        let header = jsonwebtoken::decode_header(&token).unwrap();
        assert_eq!(header.kid.as_deref(), Some("2"));
        assert_eq!(header.alg, Algorithm::RS256);
    }

    #[test]
    fn wrong_key_fails_signature() {
        let material = testkeys::material();
        let token = sign_claims(&access_claims(Duration::seconds(60)), material.jwt()).unwrap();
        let err = verify_claims(&token, material.jws(), ISSUER).unwrap_err();
        assert!(matches!(err, SecurityError::InvalidSignature(_)));
    }

    #[test]
    fn expired_token_fails_regardless_of_signature() {
        let key = testkeys::material().jwt();
        let token = sign_claims(&access_claims(Duration::seconds(-120)), key).unwrap();
        assert_eq!(
            verify_claims(&token, key, ISSUER).unwrap_err(),
            SecurityError::ExpiredToken
        );
    }

    #[test]
    fn issuer_mismatch_fails() {
        let key = testkeys::material().jwt();
        let token = sign_claims(&access_claims(Duration::seconds(60)), key).unwrap();
        assert!(matches!(
            verify_claims(&token, key, "https://other.example"),
            Err(SecurityError::MalformedToken(_))
        ));
    }

    #[test]
    fn tampered_payload_fails() {
        let key = testkeys::material().jwt();
        let token = sign_claims(&access_claims(Duration::seconds(60)), key).unwrap();
        let mut parts: Vec<String> = token.split('.').map(String::from).collect();
        // Swap the payload for a differently-privileged one.
        let forged = TokenClaims::access(
            "alice",
            &["ROLE_ADMIN".to_string()],
            ISSUER,
            Utc::now(),
            Duration::seconds(60),
        );
        parts[1] = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&forged).unwrap());
        let tampered = parts.join(".");
        assert!(matches!(
            verify_claims(&tampered, key, ISSUER),
            Err(SecurityError::InvalidSignature(_))
        ));
    }

    // -- JWE --

    #[test]
    fn seal_open_roundtrip() {
        let key = testkeys::material().jwe();
        let payload = b"inner.signed.token";
        let envelope = seal(payload, key.public()).unwrap();

        assert_eq!(classify(&envelope).unwrap(), TokenShape::Wrapped);
        assert_eq!(open(&envelope, key.private()).unwrap(), payload);
    }

    #[test]
    fn envelope_header_declares_algorithms() {
        let key = testkeys::material().jwe();
        let envelope = seal(b"x", key.public()).unwrap();
        let header_b64 = envelope.split('.').next().unwrap();
        let header: serde_json::Value =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header_b64).unwrap()).unwrap();
        assert_eq!(header["alg"], "RSA-OAEP-256");
        assert_eq!(header["enc"], "A256GCM");
        assert_eq!(header["cty"], "JWT");
    }

    #[test]
    fn envelopes_are_nondeterministic() {
        let key = testkeys::material().jwe();
        let a = seal(b"payload", key.public()).unwrap();
        let b = seal(b"payload", key.public()).unwrap();
        // Fresh CEK and IV per envelope.
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_private_key_fails_unwrap() {
        let material = testkeys::material();
        let envelope = seal(b"payload", material.jwe().public()).unwrap();
        assert!(matches!(
            open(&envelope, material.jwt().private()),
            Err(SecurityError::MalformedToken(_))
        ));
    }

    #[test]
    fn tampered_ciphertext_fails_authentication() {
        let key = testkeys::material().jwe();
        let envelope = seal(b"payload of note", key.public()).unwrap();
        let mut parts: Vec<String> = envelope.split('.').map(String::from).collect();
        let mut ciphertext = URL_SAFE_NO_PAD.decode(&parts[3]).unwrap();
        ciphertext[0] ^= 0x01;
        parts[3] = URL_SAFE_NO_PAD.encode(ciphertext);
        assert!(matches!(
            open(&parts.join("."), key.private()),
            Err(SecurityError::MalformedToken(_))
        ));
    }

    #[test]
    fn tampered_header_fails_authentication() {
        // The header is bound as associated data: changing even its
        // whitespace invalidates the tag.
        let key = testkeys::material().jwe();
        let envelope = seal(b"payload", key.public()).unwrap();
        let mut parts: Vec<String> = envelope.split('.').map(String::from).collect();
        parts[0] = URL_SAFE_NO_PAD
            .encode(r#"{"alg":"RSA-OAEP-256","enc":"A256GCM","cty":"JWT" }"#);
        assert!(matches!(
            open(&parts.join("."), key.private()),
            Err(SecurityError::MalformedToken(_))
        ));
    }

    #[test]
    fn foreign_algorithm_is_rejected() {
        let key = testkeys::material().jwe();
        let envelope = seal(b"payload", key.public()).unwrap();
        let mut parts: Vec<String> = envelope.split('.').map(String::from).collect();
        parts[0] = URL_SAFE_NO_PAD.encode(r#"{"alg":"RSA-OAEP","enc":"A256GCM"}"#);
        let err = open(&parts.join("."), key.private()).unwrap_err();
        assert!(matches!(err, SecurityError::MalformedToken(_)));
    }

    #[test]
    fn proptest_seal_open_arbitrary_payloads() {
        use proptest::prelude::*;

        let key = testkeys::material().jwe();
        proptest!(ProptestConfig::with_cases(8), |(payload in proptest::collection::vec(any::<u8>(), 0..512))| {
            let envelope = seal(&payload, key.public()).unwrap();
            prop_assert_eq!(open(&envelope, key.private()).unwrap(), payload);
        });
    }
}
