//! Hashing - SHA-256 over Published Bodies and Render Inputs
//!
//! Two publishes of the same inputs yield the same hashes, which is what
//! makes a re-publish detectable as a no-op.

use serde::Serialize;
use serde_json::{to_string, Value};
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v: Value = serde_json::to_value(value)?;
    to_string(&sort_value(&v))
}

fn sort_value(v: &Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut sorted: Vec<_> = map.iter().collect();
            sorted.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sort_value(v)))
                    .collect(),
            )
        }
        Value::Array(arr) => Value::Array(arr.iter().map(sort_value).collect()),
        _ => v.clone(),
    }
}

/// Hash of a rendered document body.
pub fn content_hash(body: &str) -> String {
    sha256_hex(body.as_bytes())
}

/// Hash of everything a render depends on.
///
/// render_hash = sha256(slug + template + canonical_page + canonical_widgets + engine_version)
pub fn compute_render_hash(
    slug: &str,
    template: &str,
    page: &impl Serialize,
    widgets: &impl Serialize,
    engine_version: &str,
) -> Result<String, serde_json::Error> {
    let combined = format!(
        "{}:{}:{}:{}:{}",
        slug,
        template,
        canonical_json(page)?,
        canonical_json(widgets)?,
        engine_version
    );
    Ok(sha256_hex(combined.as_bytes()))
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_canonical_json_sorted() {
        // preserve_order keeps insertion order in Value, so sorting must be explicit
        let obj = json!({"z": 1, "a": 2, "m": {"y": 1, "b": 2}});
        let canonical = canonical_json(&obj).unwrap();
        assert_eq!(canonical, r#"{"a":2,"m":{"b":2,"y":1},"z":1}"#);
    }

    #[test]
    fn test_content_hash_known_value() {
        assert_eq!(
            content_hash(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_render_hash_sensitive_to_inputs() {
        let page = json!({"slug": "home", "configuration": []});
        let widgets = json!([]);
        let h1 = compute_render_hash("home", "main", &page, &widgets, "1.0.0").unwrap();
        let h2 = compute_render_hash("home", "main", &page, &widgets, "1.0.0").unwrap();
        let h3 = compute_render_hash("home", "landing", &page, &widgets, "1.0.0").unwrap();
        assert_eq!(h1, h2);
        assert_ne!(h1, h3);
    }
}
