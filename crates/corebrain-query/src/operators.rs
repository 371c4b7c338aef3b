// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Operator vocabulary shared by the filter and stage grammars.

use serde_json::Value;

use crate::error::RejectionReason;

/// Operators and stages that execute code or touch other collections.
/// Named explicitly so rejections carry a precise reason; anything else
/// outside the allow-lists is refused as unsupported.
pub const UNSAFE_OPERATORS: &[&str] = &[
    "$where",
    "$function",
    "$accumulator",
    "$expr",
    "$jsonSchema",
    "$lookup",
    "$graphLookup",
    "$unionWith",
    "$out",
    "$merge",
];

pub fn is_unsafe(op: &str) -> bool {
    UNSAFE_OPERATORS.contains(&op)
}

/// Rejects `op`, naming it as unsafe when it is on the explicit list.
pub(crate) fn reject_operator(op: &str) -> RejectionReason {
    if is_unsafe(op) {
        RejectionReason::UnsafeOperator(format!("operator `{op}` can execute code or reach other collections"))
    } else {
        RejectionReason::unsupported(op)
    }
}

/// Finds the first unsafe operator key anywhere inside `value`.
pub fn find_unsafe(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => map.iter().find_map(|(k, v)| {
            if is_unsafe(k) {
                Some(k.clone())
            } else {
                find_unsafe(v)
            }
        }),
        Value::Array(items) => items.iter().find_map(find_unsafe),
        _ => None,
    }
}

/// Validates a dotted field path: non-empty segments, no operator sigil, no NUL.
pub(crate) fn check_path(path: &str) -> Result<(), RejectionReason> {
    if path.is_empty() || path.len() > 256 {
        return Err(RejectionReason::malformed("field path must be 1-256 characters"));
    }
    if path.contains('$') || path.contains('\0') {
        return Err(RejectionReason::malformed(format!(
            "field path `{path}` contains a reserved character"
        )));
    }
    if path.split('.').any(str::is_empty) {
        return Err(RejectionReason::malformed(format!(
            "field path `{path}` has an empty segment"
        )));
    }
    Ok(())
}

/// Top-level segment of a dotted path.
pub fn root_field(path: &str) -> &str {
    path.split('.').next().unwrap_or(path)
}

/// Strips the `$` of a field reference such as `"$price"`.
pub(crate) fn field_ref(value: &Value) -> Option<&str> {
    value
        .as_str()
        .and_then(|s| s.strip_prefix('$'))
        .filter(|s| !s.is_empty() && !s.starts_with('$'))
}

/// Reads a non-negative integer, accepting integral floats.
pub(crate) fn as_count(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|f| *f >= 0.0 && f.fract() == 0.0 && *f <= u64::MAX as f64)
            .map(|f| f as u64)
    })
}
