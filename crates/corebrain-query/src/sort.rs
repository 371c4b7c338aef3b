// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sort specifications.

use serde_json::{Map, Value, json};

use crate::error::RejectionReason;
use crate::operators::check_path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }
}

/// Parses `{field: 1|-1}` or `[[field, 1|-1], ...]`. `null` means unsorted.
pub fn parse_sort(value: &Value) -> Result<Vec<SortKey>, RejectionReason> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Object(map) => map
            .iter()
            .map(|(field, dir)| sort_key(field, dir))
            .collect(),
        Value::Array(pairs) => pairs
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([Value::String(field), dir]) => sort_key(field, dir),
                _ => Err(RejectionReason::malformed(
                    "sort pairs must be [field, direction]",
                )),
            })
            .collect(),
        _ => Err(RejectionReason::malformed("sort must be an object")),
    }
}

fn sort_key(field: &str, dir: &Value) -> Result<SortKey, RejectionReason> {
    check_path(field)?;
    let descending = match dir {
        Value::Number(n) => match n.as_i64() {
            Some(1) => false,
            Some(-1) => true,
            _ => return Err(RejectionReason::malformed("sort direction must be 1 or -1")),
        },
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "asc" | "ascending" => false,
            "desc" | "descending" => true,
            _ => return Err(RejectionReason::malformed("sort direction must be 1 or -1")),
        },
        Value::Object(_) => return Err(crate::operators::reject_operator("$meta")),
        _ => return Err(RejectionReason::malformed("sort direction must be 1 or -1")),
    };
    Ok(SortKey {
        field: field.to_string(),
        descending,
    })
}

/// Sort keys as an ordered `{field: 1|-1}` document.
pub fn sort_to_value(keys: &[SortKey]) -> Value {
    let mut map = Map::new();
    for key in keys {
        map.insert(key.field.clone(), json!(if key.descending { -1 } else { 1 }));
    }
    Value::Object(map)
}
