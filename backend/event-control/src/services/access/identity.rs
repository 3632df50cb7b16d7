//! Registration identity normalization and fingerprinting.
//!
//! The identity key is a one-way SHA-256 over the canonically ordered
//! normalized registration data. It lets a returning viewer on a new device
//! reclaim access by re-entering the same identity, without exposing PII in
//! index attributes.

use std::collections::BTreeMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn normalize_name(name: &str) -> String {
    name.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Flattens submitted form data to trimmed string values under sorted keys.
pub fn normalize_form_data(form: &Value) -> BTreeMap<String, String> {
    let mut normalized = BTreeMap::new();
    if let Value::Object(map) = form {
        for (key, value) in map {
            let rendered = match value {
                Value::String(s) => s.trim().to_string(),
                Value::Null => continue,
                other => other.to_string(),
            };
            normalized.insert(key.trim().to_string(), rendered);
        }
    }
    normalized
}

/// SHA-256 hex digest of `{"email", "fields", "name"}` in canonical order.
pub fn identity_key(
    name: Option<&str>,
    email: Option<&str>,
    fields: &BTreeMap<String, String>,
) -> String {
    let mut canonical = BTreeMap::new();
    canonical.insert(
        "email",
        Value::String(email.map(normalize_email).unwrap_or_default()),
    );
    canonical.insert(
        "fields",
        Value::Object(
            fields
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.to_lowercase())))
                .collect(),
        ),
    );
    canonical.insert(
        "name",
        Value::String(name.map(normalize_name).unwrap_or_default()),
    );
    let payload = serde_json::to_string(&canonical).unwrap_or_default();
    hex::encode(Sha256::digest(payload.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_and_name_normalization() {
        assert_eq!(normalize_email("  A.User@Example.COM "), "a.user@example.com");
        assert_eq!(normalize_name("  Ada   Lovelace "), "ada lovelace");
    }

    #[test]
    fn identity_key_is_stable_under_field_order() {
        let a = normalize_form_data(&json!({"firstName": "A", "lastName": "B"}));
        let b = normalize_form_data(&json!({"lastName": "B", "firstName": "A"}));
        assert_eq!(
            identity_key(Some("Ada"), Some("a@x"), &a),
            identity_key(Some("Ada"), Some("a@x"), &b)
        );
    }

    #[test]
    fn identity_key_is_case_insensitive() {
        let fields = BTreeMap::new();
        assert_eq!(
            identity_key(Some("Ada"), Some("A@X"), &fields),
            identity_key(Some("ada"), Some("a@x"), &fields)
        );
    }

    #[test]
    fn different_identities_diverge() {
        let fields = BTreeMap::new();
        assert_ne!(
            identity_key(Some("Ada"), Some("a@x"), &fields),
            identity_key(Some("Ada"), Some("b@x"), &fields)
        );
    }
}
