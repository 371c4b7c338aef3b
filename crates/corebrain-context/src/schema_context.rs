// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema excerpt for the elicitation prompt.

use std::collections::BTreeMap;

use corebrain_query::{CollectionSchema, SchemaDescriptor};
use serde_json::json;

/// Schema context rendered for the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaExcerpt {
    pub text: String,
    /// Collections left out to stay within the budget.
    pub omitted: usize,
}

/// Renders `schema` as pretty JSON. Over `char_budget` characters, only
/// `max_collections` collections are kept: the hinted one first, then the
/// rest by name.
pub fn render_schema(
    schema: &SchemaDescriptor,
    hint: Option<&str>,
    char_budget: usize,
    max_collections: usize,
) -> SchemaExcerpt {
    let full = to_text(schema.collections.iter());
    if full.chars().count() <= char_budget {
        return SchemaExcerpt {
            text: full,
            omitted: 0,
        };
    }

    let mut names: Vec<&String> = schema.collections.keys().collect();
    if let Some(hint) = hint {
        if let Some(pos) = names.iter().position(|n| n.as_str() == hint) {
            let hinted = names.remove(pos);
            names.insert(0, hinted);
        }
    }
    let keep = max_collections.max(1).min(names.len());
    let omitted = names.len() - keep;
    let selected = names[..keep]
        .iter()
        .filter_map(|name| schema.collections.get_key_value(*name));

    let mut text = to_text(selected);
    if omitted > 0 {
        text.push_str(&format!("\n\n... and {omitted} more collections."));
    }
    SchemaExcerpt { text, omitted }
}

fn to_text<'a>(entries: impl Iterator<Item = (&'a String, &'a CollectionSchema)>) -> String {
    // serde_json::Map keeps insertion order here, so the hinted collection stays first.
    let mut collections = serde_json::Map::new();
    for (name, coll) in entries {
        let fields: BTreeMap<_, _> = coll
            .schema
            .iter()
            .map(|(f, info)| (f, json!({"type": info.field_type, "example": info.example})))
            .collect();
        collections.insert(
            name.clone(),
            json!({"document_count": coll.document_count, "schema": fields}),
        );
    }
    serde_json::to_string_pretty(&json!({ "collections": collections })).unwrap_or_default()
}
