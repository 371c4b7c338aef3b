// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic cache keys.

use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::query::QuerySpec;

const FINGERPRINT_VERSION: &str = "corebrain:fp:v1";

/// SHA-256 of the normalized query, its natural-language text, and the
/// caller's permission scope, as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(spec: &QuerySpec, natural_query: &str, scope_id: &str) -> Self {
        let mut canonical = String::new();
        write_canonical(&spec.to_value(), &mut canonical);

        let text = normalize_text(natural_query);

        let mut hasher = Sha256::new();
        for part in [FINGERPRINT_VERSION, canonical.as_str(), text.as_str(), scope_id] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        Self(hex::encode(hasher.finalize()))
    }

    /// Wrap an already-computed digest.
    pub fn from_raw(digest: impl Into<String>) -> Self {
        Self(digest.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Case-folded, whitespace-collapsed query text.
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// JSON with object keys sorted recursively. Sort documents stay ordered
/// because their key order is semantic; they are written as pair lists.
fn write_canonical(value: &Value, out: &mut String) {
    write_value(value, out, false);
}

fn write_value(value: &Value, out: &mut String, ordered: bool) {
    match value {
        Value::Object(map) => {
            out.push('{');
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            if !ordered {
                entries.sort_by(|a, b| a.0.cmp(b.0));
            }
            for (i, (key, v)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_value(v, out, key == "sort" || key == "$sort");
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(item, out, false);
            }
            out.push(']');
        }
        other => out.push_str(&other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Candidate, QueryHints, Validator};
    use crate::schema::{CollectionSchema, FieldInfo, SchemaDescriptor};
    use corebrain_core::{PermissionContext, PermissionLevel};
    use serde_json::json;

    fn spec(raw: Value) -> QuerySpec {
        let mut coll = CollectionSchema::default();
        for f in ["price", "category", "sales", "name"] {
            coll.schema.insert(
                f.into(),
                FieldInfo {
                    field_type: "string".into(),
                    example: String::new(),
                },
            );
        }
        let mut schema = SchemaDescriptor::default();
        schema.collections.insert("products".into(), coll);
        let ctx = PermissionContext::new("c", PermissionLevel::Read, vec!["products".into()]);
        Validator::default()
            .validate(
                &Candidate::from_value(raw).unwrap(),
                &QueryHints::default(),
                &ctx,
                &schema,
            )
            .unwrap()
    }

    #[test]
    fn key_order_in_filters_does_not_matter() {
        let a = spec(json!({"collection": "products", "query": {"price": 1, "category": "a"}}));
        let b = spec(json!({"collection": "products", "query": {"category": "a", "price": 1}}));
        assert_eq!(
            Fingerprint::compute(&a, "cheap a", "scope"),
            Fingerprint::compute(&b, "cheap a", "scope")
        );
    }

    #[test]
    fn sort_order_matters() {
        let a = spec(json!({"collection": "products", "sort": {"sales": -1, "name": 1}}));
        let b = spec(json!({"collection": "products", "sort": {"name": 1, "sales": -1}}));
        assert_ne!(
            Fingerprint::compute(&a, "q", "scope"),
            Fingerprint::compute(&b, "q", "scope")
        );
    }

    #[test]
    fn text_is_normalized_and_scope_distinguishes() {
        let s = spec(json!({"collection": "products"}));
        assert_eq!(
            Fingerprint::compute(&s, "Top  5 products", "scope"),
            Fingerprint::compute(&s, "top 5 PRODUCTS ", "scope")
        );
        assert_ne!(
            Fingerprint::compute(&s, "top 5 products", "read"),
            Fingerprint::compute(&s, "top 5 products", "admin")
        );
        assert_eq!(Fingerprint::compute(&s, "x", "y").as_str().len(), 64);
    }
}
