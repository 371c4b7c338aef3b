// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed filter documents.
//!
//! A filter is parsed from untrusted JSON into [`FilterExpr`]; any operator
//! outside the closed set below fails construction.

use regex::{Regex, RegexBuilder};
use serde_json::{Map, Value, json};

use crate::error::RejectionReason;
use crate::operators::{as_count, check_path, reject_operator};

/// Compiled regex size ceiling, bounding evaluation cost of model-written patterns.
const REGEX_SIZE_LIMIT: usize = 1 << 20;
const MAX_DEPTH: usize = 16;

/// A boolean expression over document fields.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpr {
    /// All sub-expressions hold. An empty `And` matches every document.
    And(Vec<FilterExpr>),
    Or(Vec<FilterExpr>),
    Nor(Vec<FilterExpr>),
    /// Every condition holds for the value at `path`.
    Field {
        path: String,
        conditions: Vec<Condition>,
    },
}

/// A predicate on a single field value.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Exists(bool),
    Regex(RegexCondition),
    Size(u64),
    All(Vec<Value>),
    Not(Vec<Condition>),
}

/// A compiled `$regex` with its `$options`.
#[derive(Debug, Clone)]
pub struct RegexCondition {
    pub pattern: String,
    pub options: String,
    regex: Regex,
}

impl PartialEq for RegexCondition {
    fn eq(&self, other: &Self) -> bool {
        self.pattern == other.pattern && self.options == other.options
    }
}

impl RegexCondition {
    pub fn new(pattern: &str, options: &str) -> Result<Self, RejectionReason> {
        let mut builder = RegexBuilder::new(pattern);
        builder.size_limit(REGEX_SIZE_LIMIT);
        for flag in options.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                other => {
                    return Err(RejectionReason::malformed(format!(
                        "unsupported regex option `{other}`"
                    )));
                }
            };
        }
        let regex = builder
            .build()
            .map_err(|e| RejectionReason::malformed(format!("invalid regex: {e}")))?;
        let mut sorted: Vec<char> = options.chars().collect();
        sorted.sort_unstable();
        sorted.dedup();
        Ok(Self {
            pattern: pattern.to_string(),
            options: sorted.into_iter().collect(),
            regex,
        })
    }

    pub fn is_match(&self, haystack: &str) -> bool {
        self.regex.is_match(haystack)
    }
}

impl FilterExpr {
    /// The filter matching every document.
    pub fn match_all() -> Self {
        FilterExpr::And(Vec::new())
    }

    pub fn is_match_all(&self) -> bool {
        matches!(self, FilterExpr::And(clauses) if clauses.is_empty())
    }

    /// Parses an untrusted filter document. `null` is the empty filter.
    pub fn parse(value: &Value) -> Result<Self, RejectionReason> {
        match value {
            Value::Null => Ok(Self::match_all()),
            Value::Object(map) => parse_document(map, 0),
            _ => Err(RejectionReason::malformed("filter must be an object")),
        }
    }

    /// Every field path referenced by this expression.
    pub fn field_paths(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_paths(&mut out);
        out
    }

    fn collect_paths<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FilterExpr::And(c) | FilterExpr::Or(c) | FilterExpr::Nor(c) => {
                for expr in c {
                    expr.collect_paths(out);
                }
            }
            FilterExpr::Field { path, .. } => out.push(path),
        }
    }

    /// Canonical JSON form, used for display and fingerprinting.
    pub fn to_value(&self) -> Value {
        match self {
            FilterExpr::And(clauses) => {
                // A conjunction of distinct fields renders as a flat document.
                let mut flat = Map::new();
                let mut nested = Vec::new();
                for clause in clauses {
                    match clause {
                        FilterExpr::Field { path, conditions } if !flat.contains_key(path) => {
                            flat.insert(path.clone(), conditions_to_value(conditions));
                        }
                        other => nested.push(other.to_value()),
                    }
                }
                if nested.is_empty() {
                    Value::Object(flat)
                } else {
                    if !flat.is_empty() {
                        nested.insert(0, Value::Object(flat));
                    }
                    json!({ "$and": nested })
                }
            }
            FilterExpr::Or(c) => json!({ "$or": c.iter().map(Self::to_value).collect::<Vec<_>>() }),
            FilterExpr::Nor(c) => {
                json!({ "$nor": c.iter().map(Self::to_value).collect::<Vec<_>>() })
            }
            FilterExpr::Field { path, conditions } => {
                let mut map = Map::new();
                map.insert(path.clone(), conditions_to_value(conditions));
                Value::Object(map)
            }
        }
    }
}

fn conditions_to_value(conditions: &[Condition]) -> Value {
    if let [Condition::Eq(v)] = conditions {
        if !is_operator_object(v) {
            return v.clone();
        }
    }
    let mut map = Map::new();
    for condition in conditions {
        match condition {
            Condition::Eq(v) => insert(&mut map, "$eq", v.clone()),
            Condition::Ne(v) => insert(&mut map, "$ne", v.clone()),
            Condition::Gt(v) => insert(&mut map, "$gt", v.clone()),
            Condition::Gte(v) => insert(&mut map, "$gte", v.clone()),
            Condition::Lt(v) => insert(&mut map, "$lt", v.clone()),
            Condition::Lte(v) => insert(&mut map, "$lte", v.clone()),
            Condition::In(v) => insert(&mut map, "$in", Value::Array(v.clone())),
            Condition::Nin(v) => insert(&mut map, "$nin", Value::Array(v.clone())),
            Condition::Exists(b) => insert(&mut map, "$exists", Value::Bool(*b)),
            Condition::Regex(r) => {
                insert(&mut map, "$regex", Value::String(r.pattern.clone()));
                if !r.options.is_empty() {
                    insert(&mut map, "$options", Value::String(r.options.clone()));
                }
            }
            Condition::Size(n) => insert(&mut map, "$size", json!(n)),
            Condition::All(v) => insert(&mut map, "$all", Value::Array(v.clone())),
            Condition::Not(inner) => insert(&mut map, "$not", conditions_to_value(inner)),
        }
    }
    Value::Object(map)
}

fn insert(map: &mut Map<String, Value>, key: &str, value: Value) {
    map.insert(key.to_string(), value);
}

fn is_operator_object(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|m| m.keys().any(|k| k.starts_with('$')))
}

fn parse_document(map: &Map<String, Value>, depth: usize) -> Result<FilterExpr, RejectionReason> {
    if depth > MAX_DEPTH {
        return Err(RejectionReason::malformed("filter nesting too deep"));
    }
    let mut clauses = Vec::with_capacity(map.len());
    for (key, value) in map {
        if let Some(op) = key.strip_prefix('$') {
            let children = match op {
                "and" | "or" | "nor" => parse_clause_list(key, value, depth)?,
                _ => return Err(reject_operator(key)),
            };
            clauses.push(match op {
                "and" => FilterExpr::And(children),
                "or" => FilterExpr::Or(children),
                _ => FilterExpr::Nor(children),
            });
        } else {
            check_path(key)?;
            clauses.push(FilterExpr::Field {
                path: key.clone(),
                conditions: parse_conditions(value, depth)?,
            });
        }
    }
    Ok(match clauses.len() {
        1 => clauses.remove(0),
        _ => FilterExpr::And(clauses),
    })
}

fn parse_clause_list(
    key: &str,
    value: &Value,
    depth: usize,
) -> Result<Vec<FilterExpr>, RejectionReason> {
    let items = value
        .as_array()
        .filter(|items| !items.is_empty())
        .ok_or_else(|| RejectionReason::malformed(format!("{key} expects a non-empty array")))?;
    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => parse_document(map, depth + 1),
            _ => Err(RejectionReason::malformed(format!(
                "{key} entries must be objects"
            ))),
        })
        .collect()
}

fn parse_conditions(value: &Value, depth: usize) -> Result<Vec<Condition>, RejectionReason> {
    let map = match value {
        Value::Object(map) if map.keys().any(|k| k.starts_with('$')) => map,
        // A literal (including a plain sub-document) means equality.
        literal => {
            if let Some(op) = crate::operators::find_unsafe(literal) {
                return Err(reject_operator(&op));
            }
            return Ok(vec![Condition::Eq(literal.clone())]);
        }
    };
    if map.keys().any(|k| !k.starts_with('$')) {
        return Err(RejectionReason::malformed(
            "operator document mixes operators and field names",
        ));
    }
    if map.contains_key("$options") && !map.contains_key("$regex") {
        return Err(RejectionReason::malformed("$options requires $regex"));
    }

    let mut conditions = Vec::with_capacity(map.len());
    for (op, arg) in map {
        let condition = match op.as_str() {
            "$eq" => Condition::Eq(literal(op, arg)?),
            "$ne" => Condition::Ne(literal(op, arg)?),
            "$gt" => Condition::Gt(literal(op, arg)?),
            "$gte" => Condition::Gte(literal(op, arg)?),
            "$lt" => Condition::Lt(literal(op, arg)?),
            "$lte" => Condition::Lte(literal(op, arg)?),
            "$in" => Condition::In(literal_list(op, arg)?),
            "$nin" => Condition::Nin(literal_list(op, arg)?),
            "$all" => Condition::All(literal_list(op, arg)?),
            "$exists" => Condition::Exists(match arg {
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
                _ => return Err(RejectionReason::malformed("$exists expects a boolean")),
            }),
            "$size" => Condition::Size(
                as_count(arg)
                    .ok_or_else(|| RejectionReason::malformed("$size expects a count"))?,
            ),
            "$regex" => {
                let pattern = arg
                    .as_str()
                    .ok_or_else(|| RejectionReason::malformed("$regex expects a string"))?;
                let options = match map.get("$options") {
                    None => "",
                    Some(Value::String(s)) => s.as_str(),
                    Some(_) => return Err(RejectionReason::malformed("$options expects a string")),
                };
                Condition::Regex(RegexCondition::new(pattern, options)?)
            }
            "$options" => continue,
            "$not" => {
                if depth >= MAX_DEPTH {
                    return Err(RejectionReason::malformed("filter nesting too deep"));
                }
                match arg {
                    Value::Object(inner) if inner.keys().all(|k| k.starts_with('$')) => {
                        Condition::Not(parse_conditions(arg, depth + 1)?)
                    }
                    _ => return Err(RejectionReason::malformed("$not expects an operator document")),
                }
            }
            other => return Err(reject_operator(other)),
        };
        conditions.push(condition);
    }
    Ok(conditions)
}

fn literal(op: &str, value: &Value) -> Result<Value, RejectionReason> {
    if let Some(unsafe_op) = crate::operators::find_unsafe(value) {
        return Err(reject_operator(&unsafe_op));
    }
    if is_operator_object(value) {
        return Err(RejectionReason::malformed(format!(
            "{op} expects a literal value"
        )));
    }
    Ok(value.clone())
}

fn literal_list(op: &str, value: &Value) -> Result<Vec<Value>, RejectionReason> {
    value
        .as_array()
        .ok_or_else(|| RejectionReason::malformed(format!("{op} expects an array")))?
        .iter()
        .map(|v| literal(op, v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(v: Value) -> Result<FilterExpr, RejectionReason> {
        FilterExpr::parse(&v)
    }

    #[test]
    fn implicit_equality_and_operators() {
        let expr = parse(json!({"category": "books", "price": {"$gte": 10, "$lt": 20}})).unwrap();
        let FilterExpr::And(clauses) = &expr else {
            panic!("expected conjunction, got {expr:?}");
        };
        assert_eq!(clauses.len(), 2);
        assert_eq!(
            clauses[1],
            FilterExpr::Field {
                path: "price".into(),
                conditions: vec![Condition::Gte(json!(10)), Condition::Lt(json!(20))],
            }
        );
    }

    #[test]
    fn null_is_match_all() {
        assert!(parse(Value::Null).unwrap().is_match_all());
        assert!(parse(json!({})).unwrap().is_match_all());
    }

    #[test]
    fn code_execution_operators_are_unsafe() {
        for doc in [
            json!({"$where": "this.price > 1"}),
            json!({"$expr": {"$gt": ["$a", "$b"]}}),
            json!({"name": {"$function": {"body": "x"}}}),
            json!({"$or": [{"a": 1}, {"$where": "1"}]}),
            json!({"meta": {"nested": {"$where": "1"}}}),
        ] {
            let err = parse(doc.clone()).unwrap_err();
            assert!(
                matches!(err, RejectionReason::UnsafeOperator(_)),
                "{doc} -> {err:?}"
            );
        }
    }

    #[test]
    fn unknown_operators_fail_closed() {
        let err = parse(json!({"price": {"$near": [0, 0]}})).unwrap_err();
        assert!(matches!(err, RejectionReason::UnsafeOperator(m) if m.contains("$near")));
        let err = parse(json!({"$text": {"$search": "x"}})).unwrap_err();
        assert!(matches!(err, RejectionReason::UnsafeOperator(_)));
    }

    #[test]
    fn regex_with_options() {
        let expr = parse(json!({"name": {"$regex": "^lap", "$options": "i"}})).unwrap();
        let FilterExpr::Field { conditions, .. } = expr else {
            panic!("expected field clause");
        };
        let Condition::Regex(re) = &conditions[0] else {
            panic!("expected regex");
        };
        assert!(re.is_match("Laptop Pro"));
        assert_eq!(conditions.len(), 1);
    }

    #[test]
    fn invalid_regex_is_malformed() {
        let err = parse(json!({"name": {"$regex": "(unclosed"}})).unwrap_err();
        assert!(matches!(err, RejectionReason::Malformed(_)));
    }

    #[test]
    fn mixed_operator_document_is_malformed() {
        let err = parse(json!({"price": {"$gt": 1, "currency": "usd"}})).unwrap_err();
        assert!(matches!(err, RejectionReason::Malformed(_)));
    }

    #[test]
    fn field_paths_include_nested_clauses() {
        let expr = parse(json!({"$or": [{"a": 1}, {"b.c": {"$exists": true}}], "d": 2})).unwrap();
        let mut paths = expr.field_paths();
        paths.sort();
        assert_eq!(paths, vec!["a", "b.c", "d"]);
    }

    #[test]
    fn canonical_form_is_stable() {
        let a = parse(json!({"price": {"$lt": 20, "$gte": 10}, "category": "books"})).unwrap();
        assert_eq!(
            a.to_value(),
            json!({"price": {"$lt": 20, "$gte": 10}, "category": "books"})
        );
    }
}
