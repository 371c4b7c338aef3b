// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evaluates a [`FilterExpr`] against one document.

use corebrain_core::Document;
use corebrain_query::{Condition, FilterExpr};
use serde_json::Value;

use crate::value::{compare, lookup, loosely_equal, type_rank};

pub fn matches(filter: &FilterExpr, doc: &Document) -> bool {
    match filter {
        FilterExpr::And(parts) => parts.iter().all(|p| matches(p, doc)),
        FilterExpr::Or(parts) => parts.iter().any(|p| matches(p, doc)),
        FilterExpr::Nor(parts) => !parts.iter().any(|p| matches(p, doc)),
        FilterExpr::Field { path, conditions } => {
            let resolved = lookup(doc, path);
            conditions.iter().all(|c| holds(c, &resolved))
        }
    }
}

/// Resolved values plus the elements of any resolved array.
fn candidates<'a>(resolved: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::with_capacity(resolved.len());
    for value in resolved {
        out.push(*value);
        if let Value::Array(items) = value {
            out.extend(items.iter());
        }
    }
    out
}

fn equals(expected: &Value, resolved: &[&Value]) -> bool {
    if expected.is_null() && resolved.is_empty() {
        return true;
    }
    candidates(resolved)
        .into_iter()
        .any(|c| loosely_equal(c, expected))
}

fn ordered(resolved: &[&Value], bound: &Value, accept: fn(std::cmp::Ordering) -> bool) -> bool {
    candidates(resolved)
        .into_iter()
        .filter(|c| type_rank(c) == type_rank(bound))
        .any(|c| accept(compare(c, bound)))
}

fn holds(condition: &Condition, resolved: &[&Value]) -> bool {
    match condition {
        Condition::Eq(v) => equals(v, resolved),
        Condition::Ne(v) => !equals(v, resolved),
        Condition::Gt(v) => ordered(resolved, v, |o| o.is_gt()),
        Condition::Gte(v) => ordered(resolved, v, |o| o.is_ge()),
        Condition::Lt(v) => ordered(resolved, v, |o| o.is_lt()),
        Condition::Lte(v) => ordered(resolved, v, |o| o.is_le()),
        Condition::In(values) => values.iter().any(|v| equals(v, resolved)),
        Condition::Nin(values) => !values.iter().any(|v| equals(v, resolved)),
        Condition::Exists(expected) => resolved.is_empty() != *expected,
        Condition::Regex(regex) => candidates(resolved)
            .into_iter()
            .filter_map(Value::as_str)
            .any(|s| regex.is_match(s)),
        Condition::Size(n) => resolved.iter().any(|v| {
            v.as_array()
                .is_some_and(|items| items.len() as u64 == *n)
        }),
        Condition::All(values) => !values.is_empty() && values.iter().all(|v| equals(v, resolved)),
        Condition::Not(inner) => !inner.iter().all(|c| holds(c, resolved)),
    }
}
