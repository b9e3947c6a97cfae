//! Credential scrubbing for log fields and diagnostics payloads.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

pub const REDACTED: &str = "[REDACTED]";

const MAX_STRING_LEN: usize = 512;

const DENYLIST_KEYS: [&str; 8] = [
    "token",
    "authorization",
    "cookie",
    "password",
    "secret",
    "private_key",
    "api_key",
    "credential",
];

/// Returns true when a field name is known to carry credentials.
pub fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    DENYLIST_KEYS.iter().any(|entry| lower.contains(entry))
}

/// Returns true for strings that look like bearer headers, JWTs, or long
/// opaque secrets.
pub fn looks_like_sensitive_value(raw: &str) -> bool {
    if raw.to_ascii_lowercase().starts_with("bearer ") {
        return true;
    }
    if raw.matches('.').count() == 2 && raw.len() > 40 && !raw.contains(' ') {
        return true;
    }
    is_long_hex(raw) || is_long_base64(raw)
}

/// Sanitize a value recorded under `key`, recursing into objects and arrays.
pub fn sanitize_value(key: &str, value: &Value) -> Value {
    if is_sensitive_key(key) {
        return Value::String(REDACTED.to_string());
    }

    match value {
        Value::String(s) => sanitize_string(s),
        Value::Object(map) => {
            let mut out = Map::new();
            for (k, v) in map {
                out.insert(k.clone(), sanitize_value(k, v));
            }
            Value::Object(out)
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|item| sanitize_value(key, item)).collect())
        }
        _ => value.clone(),
    }
}

fn sanitize_string(raw: &str) -> Value {
    if looks_like_sensitive_value(raw) {
        return Value::String(REDACTED.to_string());
    }
    if raw.len() > MAX_STRING_LEN {
        return Value::String(format!("[TRUNCATED:{}]", sha256_prefixed(raw)));
    }
    Value::String(raw.to_string())
}

fn is_long_hex(value: &str) -> bool {
    value.len() > 48 && value.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_long_base64(value: &str) -> bool {
    value.len() > 48
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '_' | '-'))
}

fn sha256_prefixed(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("sha256:{}", hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sensitive_keys_are_redacted() {
        assert!(is_sensitive_key("access_token"));
        assert!(is_sensitive_key("Authorization"));
        assert!(is_sensitive_key("password"));
        assert!(!is_sensitive_key("username"));
        assert_eq!(
            sanitize_value("refresh_token", &json!("def456")),
            json!(REDACTED)
        );
    }

    #[test]
    fn bearer_strings_are_redacted_under_any_key() {
        assert_eq!(
            sanitize_value("header", &json!("Bearer abc123")),
            json!(REDACTED)
        );
    }

    #[test]
    fn nested_objects_are_sanitized() {
        let body = json!({
            "username": "runner",
            "password": "hunter2",
            "profile": { "refresh_token": "x" },
        });
        let clean = sanitize_value("body", &body);
        assert_eq!(clean["username"], json!("runner"));
        assert_eq!(clean["password"], json!(REDACTED));
        assert_eq!(clean["profile"]["refresh_token"], json!(REDACTED));
    }

    #[test]
    fn long_strings_are_truncated_to_digest() {
        let long = "word ".repeat(200);
        let clean = sanitize_value("note", &json!(long));
        assert!(clean.as_str().unwrap().starts_with("[TRUNCATED:sha256:"));
    }

    #[test]
    fn plain_values_pass_through() {
        assert_eq!(sanitize_value("status", &json!(500)), json!(500));
        assert_eq!(sanitize_value("url", &json!("/workouts")), json!("/workouts"));
    }
}
