// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Bounded, permission-filtered rendering of query results.

use corebrain_core::{Document, PermissionContext};
use corebrain_store::ExecutionResult;
use serde_json::{Map, Value};
use tracing::debug;

/// Rows ready for the synthesis prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedResult {
    pub rows: Vec<Value>,
    /// `rows` serialized as one JSON array. Never longer than the budget.
    pub text: String,
    pub truncated: bool,
    /// Hidden field occurrences removed across all documents.
    pub dropped_fields: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ResultFormatter {
    byte_budget: usize,
}

impl ResultFormatter {
    pub fn new(byte_budget: usize) -> Self {
        Self {
            byte_budget: byte_budget.max(2),
        }
    }

    pub fn byte_budget(&self) -> usize {
        self.byte_budget
    }

    /// Redact, then keep whole documents in executor order while the
    /// serialized array fits the budget.
    pub fn format(&self, result: &ExecutionResult, ctx: &PermissionContext) -> FormattedResult {
        let (redacted, dropped_fields) = redact_documents(&result.documents, &result.collection, ctx);

        let mut text = String::from("[");
        let mut rows = Vec::with_capacity(redacted.len());
        let mut truncated = false;
        for row in redacted {
            let rendered = row.to_string();
            let separator = usize::from(!rows.is_empty());
            if text.len() + separator + rendered.len() + 1 > self.byte_budget {
                truncated = true;
                break;
            }
            if separator == 1 {
                text.push(',');
            }
            text.push_str(&rendered);
            rows.push(row);
        }
        text.push(']');

        if truncated || dropped_fields > 0 {
            debug!(
                collection = %result.collection,
                kept = rows.len(),
                total = result.documents.len(),
                dropped_fields,
                "result formatted"
            );
        }
        FormattedResult {
            rows,
            text,
            truncated,
            dropped_fields,
        }
    }
}

/// Copies of `docs` without the fields `ctx` may not see, plus the number
/// of fields removed.
pub fn redact_documents(
    docs: &[Document],
    collection: &str,
    ctx: &PermissionContext,
) -> (Vec<Value>, usize) {
    let mut dropped = 0;
    let rows = docs
        .iter()
        .map(|doc| Value::Object(redact_object(doc, "", collection, ctx, &mut dropped)))
        .collect();
    (rows, dropped)
}

fn redact_object(
    map: &Map<String, Value>,
    prefix: &str,
    collection: &str,
    ctx: &PermissionContext,
    dropped: &mut usize,
) -> Map<String, Value> {
    let mut out = Map::with_capacity(map.len());
    for (key, value) in map {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if !ctx.field_visible(collection, &path) {
            *dropped += 1;
            continue;
        }
        out.insert(key.clone(), redact_value(value, &path, collection, ctx, dropped));
    }
    out
}

fn redact_value(
    value: &Value,
    path: &str,
    collection: &str,
    ctx: &PermissionContext,
    dropped: &mut usize,
) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_object(map, path, collection, ctx, dropped)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_value(item, path, collection, ctx, dropped))
                .collect(),
        ),
        other => other.clone(),
    }
}
