//! Shared helpers for the HTTP integration suite.
//!
//! Every test drives the full application router through `oneshot`, so the
//! complete filter pipeline is live: trace headers are mandatory on `/api`
//! routes, login bodies travel sealed, and rate limits apply. The helpers
//! here share one set of RSA keys between the server under test and a
//! client-side [`TokenProvider`], which lets tests seal envelopes and mint
//! bearer tokens the server accepts.

#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use warden_api::config::AppConfig;
use warden_api::AppState;
use warden_jose::{InMemoryTokenStore, KeyMaterial, Token, TokenProvider, TokenSettings};
use warden_policy::{authority, Principal};

/// One key set for the whole test binary; RSA generation is slow.
pub fn keys() -> Arc<KeyMaterial> {
    static KEYS: OnceLock<Arc<KeyMaterial>> = OnceLock::new();
    Arc::clone(KEYS.get_or_init(|| Arc::new(KeyMaterial::generate().expect("test key material"))))
}

/// The application under test: default configuration, shared keys, a
/// fresh in-memory token store.
pub fn test_app() -> axum::Router {
    let config = AppConfig::default();
    let state = AppState::new(&config, keys(), Arc::new(InMemoryTokenStore::new()));
    warden_api::app(state)
}

/// A client-side provider over the same keys and issuer as the server,
/// for sealing envelopes, minting bearer tokens, and opening responses.
pub fn client() -> TokenProvider {
    TokenProvider::new(
        keys(),
        Arc::new(InMemoryTokenStore::new()),
        TokenSettings::default(),
    )
}

/// Mint a bearer access token the server will accept for `subject`.
pub async fn bearer_for(subject: &str) -> String {
    let principal = Principal::new(
        subject,
        vec![authority::ADMIN.to_string(), authority::USER.to_string()],
    );
    client()
        .create_token(&principal)
        .await
        .expect("client-side token")
        .access_token
}

/// POST with valid trace headers and a JSON body.
pub fn api_post(uri: &str, body: Value) -> Request<Body> {
    api_post_raw(uri, serde_json::to_vec(&body).unwrap(), "application/json")
}

/// POST with valid trace headers and arbitrary bytes.
pub fn api_post_raw(uri: &str, body: Vec<u8>, content_type: &str) -> Request<Body> {
    Request::post(uri)
        .header("x-request-id", "req-12345678")
        .header("x-correlation-id", "corr-12345678")
        .header("content-type", content_type)
        .body(Body::from(body))
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap_or_else(|e| {
        panic!(
            "response body is not JSON ({e}): {}",
            String::from_utf8_lossy(&bytes)
        )
    })
}

pub fn error_code(body: &Value) -> &str {
    body["error"]["code"].as_str().unwrap_or("")
}

/// Log in as the default identity through the sealed-envelope flow and
/// return the issued triple.
pub async fn login(app: &axum::Router) -> Token {
    login_with(app, "admin", "password")
        .await
        .expect("default credentials log in")
}

/// Log in with arbitrary credentials; `Err` carries the response on any
/// non-200 status.
pub async fn login_with(
    app: &axum::Router,
    username: &str,
    password: &str,
) -> Result<Token, axum::response::Response> {
    let sealed = client()
        .create_jwe(&json!({ "username": username, "password": password }))
        .expect("seal credentials");
    let response = app
        .clone()
        .oneshot(api_post("/api/v1/auth/token", json!({ "token": sealed })))
        .await
        .unwrap();
    if response.status() != StatusCode::OK {
        return Err(response);
    }

    // The response is sealed the same way the request was.
    let envelope = body_json(response).await;
    let payload = client()
        .extract_data_from_jwe(envelope["token"].as_str().expect("envelope token"))
        .expect("open login response");
    Ok(serde_json::from_value(payload).expect("token triple"))
}
