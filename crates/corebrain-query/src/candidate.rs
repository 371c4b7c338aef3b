// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Extraction of a candidate query from free-form model output.
//!
//! The model is asked for a single JSON object. Anything that does not yield
//! exactly that shape is "no candidate", never a guess.

use serde::Deserialize;
use serde_json::Value;

/// Code-fence languages a candidate may be wrapped in.
const FENCE_LANGUAGES: &[&str] = &["", "json", "mongodb", "js", "javascript"];

/// Prefix the model uses to decline producing a query.
pub const DECLINE_PREFIX: &str = "ERROR:";

/// Untrusted query structure as written by the model.
///
/// Only the shape is checked here; every value is still raw JSON until the
/// validator turns it into a [`crate::QuerySpec`].
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Candidate {
    #[serde(default)]
    pub collection: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    #[serde(default, alias = "filter")]
    pub query: Option<Value>,
    #[serde(default)]
    pub projection: Option<Value>,
    #[serde(default)]
    pub sort: Option<Value>,
    #[serde(default)]
    pub limit: Option<Value>,
    #[serde(default)]
    pub skip: Option<Value>,
    #[serde(default)]
    pub pipeline: Option<Value>,
}

impl Candidate {
    /// Builds a candidate from an already-structured JSON value.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(_) => serde_json::from_value(value).ok(),
            _ => None,
        }
    }

    /// Operation name, defaulting to `aggregate` when a pipeline is present
    /// and `find` otherwise.
    pub fn operation_name(&self) -> &str {
        match (&self.operation, &self.pipeline) {
            (Some(op), _) => op.as_str(),
            (None, Some(_)) => "aggregate",
            (None, None) => "find",
        }
    }
}

/// Extracts the candidate query from a model reply, if there is one.
pub fn parse_candidate(text: &str) -> Option<Candidate> {
    let text = text.trim();
    if text.is_empty() || text.starts_with(DECLINE_PREFIX) {
        return None;
    }

    for block in fenced_blocks(text) {
        if let Some(candidate) = parse_object(block) {
            return Some(candidate);
        }
    }

    let bare = text.strip_prefix("json").unwrap_or(text).trim();
    parse_object(bare).or_else(|| {
        let start = bare.find('{')?;
        let end = bare.rfind('}')?;
        (start < end)
            .then(|| parse_object(&bare[start..=end]))
            .flatten()
    })
}

fn parse_object(text: &str) -> Option<Candidate> {
    let value: Value = serde_json::from_str(text.trim()).ok()?;
    Candidate::from_value(value)
}

/// Bodies of ``` fenced blocks whose language tag is acceptable.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;
    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        let Some(line_end) = after.find('\n') else {
            break;
        };
        let language = after[..line_end].trim().to_ascii_lowercase();
        let body = &after[line_end + 1..];
        let Some(close) = body.find("```") else {
            break;
        };
        if FENCE_LANGUAGES.contains(&language.as_str()) {
            blocks.push(&body[..close]);
        }
        rest = &body[close + 3..];
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_json_reply() {
        let c = parse_candidate(r#"{"collection": "products", "operation": "find", "query": {}}"#)
            .unwrap();
        assert_eq!(c.collection.as_deref(), Some("products"));
        assert_eq!(c.operation_name(), "find");
    }

    #[test]
    fn fenced_json_with_prose() {
        let reply = "Here is the query:\n```json\n{\"collection\": \"products\", \"sort\": {\"sales\": -1}, \"limit\": 5}\n```\nThis sorts by sales.";
        let c = parse_candidate(reply).unwrap();
        assert_eq!(c.sort, Some(json!({"sales": -1})));
        assert_eq!(c.limit, Some(json!(5)));
    }

    #[test]
    fn mongodb_fence_is_accepted() {
        let reply = "```mongodb\n{\"collection\": \"orders\", \"pipeline\": [{\"$count\": \"n\"}]}\n```";
        let c = parse_candidate(reply).unwrap();
        assert_eq!(c.operation_name(), "aggregate");
    }

    #[test]
    fn json_prefix_is_stripped() {
        let c = parse_candidate("json {\"collection\": \"products\"}").unwrap();
        assert_eq!(c.collection.as_deref(), Some("products"));
    }

    #[test]
    fn filter_alias() {
        let c = parse_candidate(r#"{"collection": "products", "filter": {"price": 1}}"#).unwrap();
        assert_eq!(c.query, Some(json!({"price": 1})));
    }

    #[test]
    fn decline_and_garbage_yield_none() {
        assert!(parse_candidate("ERROR: cannot answer from data").is_none());
        assert!(parse_candidate("I am not sure what you mean.").is_none());
        assert!(parse_candidate("").is_none());
        assert!(parse_candidate("[1, 2, 3]").is_none());
    }

    #[test]
    fn unknown_top_level_keys_are_rejected() {
        assert!(parse_candidate(r#"{"collection": "products", "drop": true}"#).is_none());
    }

    #[test]
    fn other_fence_languages_are_ignored() {
        let reply = "```python\n{\"collection\": \"products\"}\n```";
        // Not a candidate fence, but the embedded object is still located.
        assert!(parse_candidate(reply).is_some());
        assert!(parse_candidate("```python\nprint(1)\n```").is_none());
    }
}
