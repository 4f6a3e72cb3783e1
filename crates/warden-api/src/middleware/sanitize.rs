//! Request sanitization (order 8).
//!
//! HTML-escapes every string value in a JSON request body, recursively
//! through objects and arrays. Object keys and non-string scalars are left
//! alone, and a body that is not JSON passes through unchanged.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use serde_json::Value;

use crate::error::AppError;
use crate::middleware::{buffer_request, policy_request, rebuild_request};
use crate::state::AppState;

/// Escape the five HTML-significant characters.
pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Escape every string value in the tree, in place.
pub fn sanitize_value(value: &mut Value) {
    match value {
        Value::String(s) => *s = escape_html(s),
        Value::Array(items) => items.iter_mut().for_each(sanitize_value),
        Value::Object(map) => map.values_mut().for_each(sanitize_value),
        _ => {}
    }
}

pub async fn sanitize_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if !state.pipeline.sanitize.applies(&policy_request(&request)) {
        return Ok(next.run(request).await);
    }

    let (parts, bytes) = buffer_request(request).await?;
    let request = match serde_json::from_slice::<Value>(&bytes) {
        Ok(mut value) => {
            sanitize_value(&mut value);
            let body = serde_json::to_vec(&value)
                .map_err(|e| AppError::Internal(format!("re-encoding sanitized body: {e}")))?;
            rebuild_request(parts, body)
        }
        // Non-JSON bodies pass through untouched.
        Err(_) => rebuild_request(parts, bytes.to_vec()),
    };
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn escapes_all_five_characters() {
        assert_eq!(
            escape_html(r#"<a href="x">&'b'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&amp;&#39;b&#39;&lt;/a&gt;"
        );
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn sanitizes_nested_strings_only() {
        let mut value = json!({
            "title": "<script>alert(1)</script>",
            "count": 3,
            "flag": true,
            "tags": ["<b>", {"inner": "a & b"}],
        });
        sanitize_value(&mut value);
        assert_eq!(value["title"], "&lt;script&gt;alert(1)&lt;/script&gt;");
        assert_eq!(value["count"], 3);
        assert_eq!(value["flag"], true);
        assert_eq!(value["tags"][0], "&lt;b&gt;");
        assert_eq!(value["tags"][1]["inner"], "a &amp; b");
    }

    #[test]
    fn clean_payloads_are_untouched() {
        let original = json!({"username": "admin", "password": "password"});
        let mut value = original.clone();
        sanitize_value(&mut value);
        assert_eq!(value, original);
    }
}
