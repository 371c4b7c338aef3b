// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `find` projections.

use serde_json::{Map, Value, json};

use crate::error::RejectionReason;
use crate::operators::{check_path, reject_operator};

/// Which fields a `find` returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    /// Only these fields, plus `_id` unless `exclude_id`.
    Include { fields: Vec<String>, exclude_id: bool },
    /// Everything except these fields.
    Exclude(Vec<String>),
}

impl Projection {
    /// Parses `{field: 0|1|true|false}`. `null` or `{}` means no projection.
    pub fn parse(value: &Value) -> Result<Option<Self>, RejectionReason> {
        let map = match value {
            Value::Null => return Ok(None),
            Value::Object(map) if map.is_empty() => return Ok(None),
            Value::Object(map) => map,
            _ => return Err(RejectionReason::malformed("projection must be an object")),
        };

        let mut include = Vec::new();
        let mut exclude = Vec::new();
        let mut exclude_id = false;
        for (field, flag) in map {
            check_path(field)?;
            let keep = match flag {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                Value::Object(inner) => {
                    let op = inner.keys().next().cloned().unwrap_or_default();
                    return Err(reject_operator(&op));
                }
                _ => return Err(RejectionReason::malformed("projection values must be 0 or 1")),
            };
            match (field.as_str(), keep) {
                ("_id", false) => exclude_id = true,
                ("_id", true) => {}
                (_, true) => include.push(field.clone()),
                (_, false) => exclude.push(field.clone()),
            }
        }

        match (include.is_empty(), exclude.is_empty()) {
            (false, false) => Err(RejectionReason::malformed(
                "projection cannot mix inclusion and exclusion",
            )),
            (false, true) => Ok(Some(Projection::Include {
                fields: include,
                exclude_id,
            })),
            (true, false) => {
                if exclude_id {
                    exclude.push("_id".to_string());
                }
                Ok(Some(Projection::Exclude(exclude)))
            }
            (true, true) if exclude_id => Ok(Some(Projection::Exclude(vec!["_id".to_string()]))),
            (true, true) => Ok(None),
        }
    }

    /// Field paths the projection names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        let fields = match self {
            Projection::Include { fields, .. } => fields,
            Projection::Exclude(fields) => fields,
        };
        fields.iter().map(String::as_str)
    }

    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        match self {
            Projection::Include { fields, exclude_id } => {
                for f in fields {
                    map.insert(f.clone(), json!(1));
                }
                if *exclude_id {
                    map.insert("_id".into(), json!(0));
                }
            }
            Projection::Exclude(fields) => {
                for f in fields {
                    map.insert(f.clone(), json!(0));
                }
            }
        }
        Value::Object(map)
    }
}
