// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dotted-path access and the total ordering used for filters and sorts.
//!
//! Values of different kinds order by type rank first:
//! null < number < string < object < array < bool.

use std::cmp::Ordering;

use corebrain_core::Document;
use serde_json::{Map, Value};

/// Every value reachable at `path`. Arrays on the way fan out over their
/// elements unless the next segment is a numeric index.
pub fn lookup<'a>(doc: &'a Document, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let mut out = Vec::new();
    let Some(head) = segments.next() else {
        return out;
    };
    if let Some(value) = doc.get(head) {
        let rest: Vec<&str> = segments.collect();
        descend(value, &rest, &mut out);
    }
    out
}

fn descend<'a>(value: &'a Value, segments: &[&str], out: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };
    match value {
        Value::Object(map) => {
            if let Some(next) = map.get(*segment) {
                descend(next, rest, out);
            }
        }
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(index) => {
                if let Some(next) = items.get(index) {
                    descend(next, rest, out);
                }
            }
            Err(_) => {
                for item in items.iter().filter(|i| i.is_object()) {
                    descend(item, segments, out);
                }
            }
        },
        _ => {}
    }
}

/// The first value at `path`, if any.
pub fn first<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    lookup(doc, path).into_iter().next()
}

/// The value at `path` following object keys only.
pub fn get_exact<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = doc.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Set `path`, creating intermediate objects. A non-object in the way is
/// replaced.
pub fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let slot = doc
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            if let Value::Object(inner) = slot {
                set_path(inner, rest, value);
            }
        }
    }
}

/// Remove `path` if present. Returns whether anything was removed.
pub fn remove_path(doc: &mut Document, path: &str) -> bool {
    match path.split_once('.') {
        None => doc.remove(path).is_some(),
        Some((head, rest)) => match doc.get_mut(head) {
            Some(Value::Object(inner)) => remove_path(inner, rest),
            Some(Value::Array(items)) => {
                let mut removed = false;
                for item in items.iter_mut() {
                    if let Value::Object(inner) = item {
                        removed |= remove_path(inner, rest);
                    }
                }
                removed
            }
            _ => false,
        },
    }
}

pub fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

pub fn as_f64(value: &Value) -> Option<f64> {
    value.as_f64()
}

/// Total order across all JSON values.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i.cmp(&j),
            _ => {
                let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(l, r)| compare(l, r))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => x
            .iter()
            .zip(y)
            .map(|((lk, lv), (rk, rv))| lk.cmp(rk).then_with(|| compare(lv, rv)))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Null, Value::Null) => Ordering::Equal,
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

/// Equality where `1` and `1.0` are the same number.
pub fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare(a, b).is_eq(),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(l, r)| loosely_equal(l, r))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(k, v)| y.get(k).is_some_and(|other| loosely_equal(v, other)))
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn lookup_fans_out_over_arrays() {
        let d = doc(json!({
            "items": [{"sku": "a", "qty": 1}, {"sku": "b"}, 7],
            "address": {"city": "Lyon"}
        }));
        let skus: Vec<_> = lookup(&d, "items.sku").into_iter().cloned().collect();
        assert_eq!(skus, vec![json!("a"), json!("b")]);
        assert_eq!(lookup(&d, "items.1.sku"), vec![&json!("b")]);
        assert_eq!(first(&d, "address.city"), Some(&json!("Lyon")));
        assert!(lookup(&d, "address.zip").is_empty());
        assert!(get_exact(&d, "items.sku").is_none());
    }

    #[test]
    fn set_and_remove_nested_paths() {
        let mut d = doc(json!({"a": 1}));
        set_path(&mut d, "b.c.d", json!(true));
        assert_eq!(Value::Object(d.clone()), json!({"a": 1, "b": {"c": {"d": true}}}));
        set_path(&mut d, "a.x", json!(2));
        assert_eq!(d["a"], json!({"x": 2}));
        assert!(remove_path(&mut d, "b.c.d"));
        assert!(!remove_path(&mut d, "b.c.d"));
        assert_eq!(d["b"], json!({"c": {}}));
    }

    #[test]
    fn ordering_is_type_ranked() {
        let mut values = vec![json!(true), json!("b"), json!([1]), json!(2.5), json!(null), json!({"k": 1}), json!(1)];
        values.sort_by(compare);
        assert_eq!(
            values,
            vec![json!(null), json!(1), json!(2.5), json!("b"), json!({"k": 1}), json!([1]), json!(true)]
        );
    }

    #[test]
    fn integers_and_floats_compare_numerically() {
        assert!(loosely_equal(&json!(3), &json!(3.0)));
        assert!(!loosely_equal(&json!(3), &json!("3")));
        assert_eq!(compare(&json!(10), &json!(9.5)), Ordering::Greater);
        assert!(loosely_equal(&json!({"a": [1, 2]}), &json!({"a": [1.0, 2]})));
    }
}
