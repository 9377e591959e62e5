//! Redaction of audit payloads.
//!
//! Header names, query keys and body keys are matched case-insensitively by
//! substring against the sensitive-field list. Matching values are replaced
//! by the redaction marker; every other value is truncated.

use std::collections::BTreeMap;

use axum::http::HeaderMap;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::config::AuditConfig;

const TRUNCATION_SUFFIX: &str = "...";

#[derive(Debug, Clone)]
pub struct Sanitizer {
    sensitive: Vec<String>,
    marker: String,
    max_value_len: usize,
}

impl Sanitizer {
    pub fn from_config(config: &AuditConfig) -> Self {
        Self {
            sensitive: config
                .sensitive_fields
                .iter()
                .map(|f| f.to_lowercase())
                .collect(),
            marker: config.redaction_marker.clone(),
            max_value_len: config.max_value_len,
        }
    }

    pub fn is_sensitive(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.sensitive.iter().any(|s| name.contains(s.as_str()))
    }

    fn value(&self, name: &str, raw: &str) -> String {
        if self.is_sensitive(name) {
            self.marker.clone()
        } else {
            truncate(raw, self.max_value_len)
        }
    }

    pub fn headers(&self, headers: &HeaderMap) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (name, value) in headers {
            let rendered = match value.to_str() {
                Ok(v) => self.value(name.as_str(), v),
                Err(_) => "<binary>".to_string(),
            };
            out.entry(name.as_str().to_string())
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(&rendered);
                })
                .or_insert(rendered);
        }
        out
    }

    pub fn query(&self, pairs: &[(String, String)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.clone(), self.value(k, v)))
            .collect()
    }

    /// Render a body for the audit trail. Anything that parses as JSON is
    /// redacted per key whatever its declared type. Form bodies are redacted
    /// per key; anything else is kept as truncated text.
    pub fn body(&self, bytes: &[u8], content_type: Option<&str>) -> Value {
        if bytes.is_empty() {
            return Value::Null;
        }

        if let Ok(json) = serde_json::from_slice::<Value>(bytes) {
            return self.json(None, json);
        }

        if content_type.is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded")) {
            let form = url::form_urlencoded::parse(bytes)
                .map(|(k, v)| {
                    let v = self.value(&k, &v);
                    (k.into_owned(), Value::String(v))
                })
                .collect();
            return Value::Object(form);
        }

        match std::str::from_utf8(bytes) {
            Ok(text) => Value::String(truncate(text, self.max_value_len)),
            Err(_) => Value::String(format!("<{} bytes binary>", bytes.len())),
        }
    }

    fn json(&self, key: Option<&str>, value: Value) -> Value {
        if key.is_some_and(|k| self.is_sensitive(k)) {
            return Value::String(self.marker.clone());
        }
        match value {
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| {
                        let v = self.json(Some(&k), v);
                        (k, v)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(items.into_iter().map(|v| self.json(None, v)).collect()),
            Value::String(s) => Value::String(truncate(&s, self.max_value_len)),
            other => other,
        }
    }
}

/// SHA-256 of the sanitized payload rendering, hex encoded.
pub fn digest(payload: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload.to_string().as_bytes());
    hex::encode(hasher.finalize())
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{TRUNCATION_SUFFIX}", &text[..cut]),
        None => text.to_string(),
    }
}
