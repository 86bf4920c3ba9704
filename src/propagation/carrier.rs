//! Header carriers.
//!
//! The codec reads from and writes to anything implementing `HeaderCarrier`,
//! so the same code serves axum's `HeaderMap` and plain string maps.

use axum::http::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;

/// A flat, string-keyed header collection.
///
/// Lookups and removals are case-insensitive, matching HTTP header semantics.
pub trait HeaderCarrier {
    /// Get the value stored under `key`, ignoring ASCII case.
    fn get(&self, key: &str) -> Option<&str>;

    /// Store `value` under `key`, replacing any existing value.
    fn set(&mut self, key: &str, value: String);

    /// Remove every entry stored under `key`, ignoring ASCII case.
    fn remove(&mut self, key: &str);

    /// All keys currently present.
    fn keys(&self) -> Vec<&str>;
}

/// An exact key match wins. Otherwise, among keys differing only in case,
/// the lexicographically smallest one is used, so lookups do not depend on
/// hash order. `keys` is sorted for the same reason.
impl HeaderCarrier for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<&str> {
        if let Some(value) = HashMap::get(self, key) {
            return Some(value.as_str());
        }
        self.iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(key))
            .min_by(|(a, _), (b, _)| a.cmp(b))
            .map(|(_, v)| v.as_str())
    }

    fn set(&mut self, key: &str, value: String) {
        HeaderCarrier::remove(self, key);
        self.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) {
        self.retain(|k, _| !k.eq_ignore_ascii_case(key));
    }

    fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = HashMap::keys(self).map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl HeaderCarrier for HeaderMap {
    fn get(&self, key: &str) -> Option<&str> {
        HeaderMap::get(self, key).and_then(|v| v.to_str().ok())
    }

    fn set(&mut self, key: &str, value: String) {
        let name = match HeaderName::from_bytes(key.as_bytes()) {
            Ok(name) => name,
            Err(_) => {
                tracing::debug!(header = %key, "Skipping invalid header name");
                return;
            }
        };
        match HeaderValue::from_str(&value) {
            Ok(value) => {
                self.insert(name, value);
            }
            Err(_) => {
                tracing::debug!(header = %key, "Skipping invalid header value");
            }
        }
    }

    fn remove(&mut self, key: &str) {
        HeaderMap::remove(self, key);
    }

    fn keys(&self) -> Vec<&str> {
        HeaderMap::keys(self).map(HeaderName::as_str).collect()
    }
}
