// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process evaluation of validated aggregation pipelines.

use std::collections::HashMap;

use corebrain_core::Document;
use corebrain_query::{Accumulator, AccumulatorOp, GroupKey, GroupStage, Operand, ProjectField, Stage};
use serde_json::{Number, Value};

use crate::matcher::matches;
use crate::transform::sort_documents;
use crate::value::{as_f64, compare, first, get_exact, loosely_equal, remove_path, set_path};

/// Run `stages` over `docs` in order.
pub fn run_pipeline(mut docs: Vec<Document>, stages: &[Stage]) -> Vec<Document> {
    for stage in stages {
        docs = apply(docs, stage);
    }
    docs
}

fn apply(docs: Vec<Document>, stage: &Stage) -> Vec<Document> {
    match stage {
        Stage::Match(filter) => docs.into_iter().filter(|d| matches(filter, d)).collect(),
        Stage::Sort(keys) => {
            let mut docs = docs;
            sort_documents(&mut docs, keys);
            docs
        }
        Stage::Skip(n) => docs.into_iter().skip(clamp(*n)).collect(),
        Stage::Limit(n) => docs.into_iter().take(clamp(*n)).collect(),
        Stage::Project(fields) => docs.iter().map(|d| project_stage(d, fields)).collect(),
        Stage::Group(group) => group_stage(&docs, group),
        Stage::Count(name) => {
            if docs.is_empty() {
                return Vec::new();
            }
            let mut out = Document::new();
            out.insert(name.clone(), Value::from(docs.len() as u64));
            vec![out]
        }
        Stage::Unwind {
            path,
            preserve_null_and_empty,
        } => unwind(docs, path, *preserve_null_and_empty),
    }
}

fn clamp(n: u64) -> usize {
    usize::try_from(n).unwrap_or(usize::MAX)
}

fn project_stage(doc: &Document, fields: &[(String, ProjectField)]) -> Document {
    let exclusive = fields.iter().all(|(_, f)| *f == ProjectField::Exclude);
    if exclusive {
        let mut out = doc.clone();
        for (name, _) in fields {
            remove_path(&mut out, name);
        }
        return out;
    }

    let mut out = Document::new();
    let drop_id = fields
        .iter()
        .any(|(name, f)| name == "_id" && *f == ProjectField::Exclude);
    if !drop_id {
        if let Some(id) = doc.get("_id") {
            out.insert("_id".into(), id.clone());
        }
    }
    for (name, field) in fields {
        match field {
            ProjectField::Include => {
                if let Some(value) = get_exact(doc, name) {
                    set_path(&mut out, name, value.clone());
                }
            }
            ProjectField::Rename(source) => {
                if let Some(value) = first(doc, source) {
                    set_path(&mut out, name, value.clone());
                }
            }
            ProjectField::Exclude => {}
        }
    }
    out
}

fn unwind(docs: Vec<Document>, path: &str, preserve: bool) -> Vec<Document> {
    let mut out = Vec::with_capacity(docs.len());
    for doc in docs {
        match get_exact(&doc, path).cloned() {
            Some(Value::Array(items)) if !items.is_empty() => {
                for item in items {
                    let mut copy = doc.clone();
                    set_path(&mut copy, path, item);
                    out.push(copy);
                }
            }
            Some(Value::Array(_)) | Some(Value::Null) | None => {
                if preserve {
                    out.push(doc);
                }
            }
            Some(_) => out.push(doc),
        }
    }
    out
}

fn group_key(doc: &Document, key: &GroupKey) -> Value {
    match key {
        GroupKey::Null => Value::Null,
        GroupKey::Field(path) => first(doc, path).cloned().unwrap_or(Value::Null),
        GroupKey::Compound(parts) => {
            let mut map = serde_json::Map::new();
            for (name, path) in parts {
                map.insert(
                    name.clone(),
                    first(doc, path).cloned().unwrap_or(Value::Null),
                );
            }
            Value::Object(map)
        }
    }
}

fn group_stage(docs: &[Document], group: &GroupStage) -> Vec<Document> {
    let mut order: Vec<(Value, Vec<State>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for doc in docs {
        let key = group_key(doc, &group.key);
        let slot = *index.entry(key.to_string()).or_insert_with(|| {
            let states = group
                .accumulators
                .iter()
                .map(|(_, acc)| State::new(acc.op))
                .collect();
            order.push((key.clone(), states));
            order.len() - 1
        });
        let states = &mut order[slot].1;
        for (state, (_, acc)) in states.iter_mut().zip(&group.accumulators) {
            state.feed(acc, doc);
        }
    }

    order
        .into_iter()
        .map(|(key, states)| {
            let mut out = Document::new();
            out.insert("_id".into(), key);
            for (state, (name, _)) in states.into_iter().zip(&group.accumulators) {
                out.insert(name.clone(), state.finish());
            }
            out
        })
        .collect()
}

fn operand(doc: &Document, operand: &Operand) -> Option<Value> {
    match operand {
        Operand::Field(path) => first(doc, path).cloned(),
        Operand::Literal(value) => Some(value.clone()),
    }
}

fn float(value: f64) -> Value {
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

enum State {
    Sum { int: i64, float: f64, exact: bool },
    Avg { total: f64, n: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    First(Option<Value>),
    Last(Value),
    Push(Vec<Value>),
    AddToSet(Vec<Value>),
    Count(u64),
}

impl State {
    fn new(op: AccumulatorOp) -> Self {
        match op {
            AccumulatorOp::Sum => State::Sum {
                int: 0,
                float: 0.0,
                exact: true,
            },
            AccumulatorOp::Avg => State::Avg { total: 0.0, n: 0 },
            AccumulatorOp::Min => State::Min(None),
            AccumulatorOp::Max => State::Max(None),
            AccumulatorOp::First => State::First(None),
            AccumulatorOp::Last => State::Last(Value::Null),
            AccumulatorOp::Push => State::Push(Vec::new()),
            AccumulatorOp::AddToSet => State::AddToSet(Vec::new()),
            AccumulatorOp::Count => State::Count(0),
        }
    }

    fn feed(&mut self, acc: &Accumulator, doc: &Document) {
        let value = operand(doc, &acc.operand);
        match self {
            State::Sum { int, float, exact } => {
                let Some(Value::Number(n)) = value else {
                    return;
                };
                match n.as_i64() {
                    Some(i) if *exact => match int.checked_add(i) {
                        Some(sum) => *int = sum,
                        None => {
                            *exact = false;
                            *float += *int as f64 + i as f64;
                            *int = 0;
                        }
                    },
                    _ => {
                        *exact = false;
                        *float += n.as_f64().unwrap_or(0.0);
                    }
                }
            }
            State::Avg { total, n } => {
                if let Some(f) = value.as_ref().and_then(as_f64) {
                    *total += f;
                    *n += 1;
                }
            }
            State::Min(current) => keep_extreme(current, value, |o| o.is_lt()),
            State::Max(current) => keep_extreme(current, value, |o| o.is_gt()),
            State::First(current) => {
                if current.is_none() {
                    *current = Some(value.unwrap_or(Value::Null));
                }
            }
            State::Last(current) => *current = value.unwrap_or(Value::Null),
            State::Push(items) => items.extend(value),
            State::AddToSet(items) => {
                if let Some(v) = value {
                    if !items.iter().any(|existing| loosely_equal(existing, &v)) {
                        items.push(v);
                    }
                }
            }
            State::Count(n) => *n += 1,
        }
    }

    fn finish(self) -> Value {
        match self {
            State::Sum { int, float: f, exact } => {
                if exact {
                    Value::from(int)
                } else {
                    float(f + int as f64)
                }
            }
            State::Avg { total, n } => {
                if n == 0 {
                    Value::Null
                } else {
                    float(total / n as f64)
                }
            }
            State::Min(v) | State::Max(v) | State::First(v) => v.unwrap_or(Value::Null),
            State::Last(v) => v,
            State::Push(items) | State::AddToSet(items) => Value::Array(items),
            State::Count(n) => Value::from(n),
        }
    }
}

fn keep_extreme(
    current: &mut Option<Value>,
    candidate: Option<Value>,
    better: fn(std::cmp::Ordering) -> bool,
) {
    let Some(candidate) = candidate.filter(|v| !v.is_null()) else {
        return;
    };
    let replace = current
        .as_ref()
        .is_none_or(|existing| better(compare(&candidate, existing)));
    if replace {
        *current = Some(candidate);
    }
}
