// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sorting and projection of document streams.

use std::cmp::Ordering;

use corebrain_core::Document;
use corebrain_query::{Projection, SortKey};
use serde_json::Value;

use crate::value::{compare, first, get_exact, remove_path, set_path};

const NULL: Value = Value::Null;

/// Stable multi-key sort. Missing fields sort as null.
pub fn sort_documents(docs: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    docs.sort_by(|a, b| compare_by(a, b, keys));
}

fn compare_by(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = first(a, &key.field).unwrap_or(&NULL);
        let right = first(b, &key.field).unwrap_or(&NULL);
        let ordering = compare(left, right);
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering.is_ne() {
            return ordering;
        }
    }
    Ordering::Equal
}

pub fn project(doc: &Document, projection: &Projection) -> Document {
    match projection {
        Projection::Include { fields, exclude_id } => {
            let mut out = Document::new();
            if !exclude_id {
                if let Some(id) = doc.get("_id") {
                    out.insert("_id".into(), id.clone());
                }
            }
            for field in fields.iter().filter(|f| f.as_str() != "_id") {
                if let Some(value) = get_exact(doc, field) {
                    set_path(&mut out, field, value.clone());
                }
            }
            out
        }
        Projection::Exclude(fields) => {
            let mut out = doc.clone();
            for field in fields {
                remove_path(&mut out, field);
            }
            out
        }
    }
}
