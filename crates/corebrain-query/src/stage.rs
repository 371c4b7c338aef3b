// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only aggregation stages.

use serde_json::{Map, Value, json};
use strum::{Display, EnumString};

use crate::error::RejectionReason;
use crate::filter::FilterExpr;
use crate::operators::{as_count, check_path, field_ref, reject_operator};
use crate::sort::{SortKey, parse_sort, sort_to_value};

/// Stage names accepted in an aggregation pipeline.
pub const ALLOWED_STAGES: &[&str] = &[
    "$match", "$sort", "$skip", "$limit", "$project", "$group", "$count", "$unwind",
];

const MAX_STAGES: usize = 20;

/// One aggregation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(FilterExpr),
    Sort(Vec<SortKey>),
    Skip(u64),
    Limit(u64),
    Project(Vec<(String, ProjectField)>),
    Group(GroupStage),
    /// Replaces the stream with one `{<name>: n}` document.
    Count(String),
    Unwind {
        path: String,
        preserve_null_and_empty: bool,
    },
}

/// What a `$project` entry does with its field.
#[derive(Debug, Clone, PartialEq)]
pub enum ProjectField {
    Include,
    Exclude,
    /// Output the value found at another path.
    Rename(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroupStage {
    pub key: GroupKey,
    pub accumulators: Vec<(String, Accumulator)>,
}

/// The `_id` of a `$group` stage.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// A single group over every document.
    Null,
    Field(String),
    /// `{name: "$path", ...}`
    Compound(Vec<(String, String)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "camelCase")]
pub enum AccumulatorOp {
    Sum,
    Avg,
    Min,
    Max,
    First,
    Last,
    Push,
    AddToSet,
    Count,
}

/// Argument of an accumulator: a field reference or a constant.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Field(String),
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Accumulator {
    pub op: AccumulatorOp,
    pub operand: Operand,
}

/// Parses only the stage names, without looking inside stage bodies.
pub fn stage_names(pipeline: &Value) -> Result<Vec<String>, RejectionReason> {
    let stages = pipeline
        .as_array()
        .ok_or_else(|| RejectionReason::malformed("pipeline must be an array"))?;
    if stages.len() > MAX_STAGES {
        return Err(RejectionReason::malformed(format!(
            "pipeline exceeds {MAX_STAGES} stages"
        )));
    }
    stages
        .iter()
        .map(|stage| match stage.as_object() {
            Some(map) if map.len() == 1 => Ok(map.keys().next().cloned().unwrap_or_default()),
            _ => Err(RejectionReason::malformed(
                "each pipeline stage must be an object with exactly one key",
            )),
        })
        .collect()
}

/// Parses a full pipeline. Stage names must already be allow-listed.
pub fn parse_pipeline(pipeline: &Value) -> Result<Vec<Stage>, RejectionReason> {
    let names = stage_names(pipeline)?;
    let bodies = pipeline.as_array().map(Vec::as_slice).unwrap_or_default();
    names
        .iter()
        .zip(bodies)
        .map(|(name, stage)| {
            let body = &stage[name.as_str()];
            parse_stage(name, body)
        })
        .collect()
}

fn parse_stage(name: &str, body: &Value) -> Result<Stage, RejectionReason> {
    match name {
        "$match" => Ok(Stage::Match(FilterExpr::parse(body)?)),
        "$sort" => {
            let keys = parse_sort(body)?;
            if keys.is_empty() {
                return Err(RejectionReason::malformed("$sort needs at least one key"));
            }
            Ok(Stage::Sort(keys))
        }
        "$skip" => as_count(body)
            .map(Stage::Skip)
            .ok_or_else(|| RejectionReason::malformed("$skip expects a non-negative integer")),
        "$limit" => as_count(body)
            .filter(|n| *n > 0)
            .map(Stage::Limit)
            .ok_or_else(|| RejectionReason::malformed("$limit expects a positive integer")),
        "$project" => parse_project(body).map(Stage::Project),
        "$group" => parse_group(body).map(Stage::Group),
        "$count" => {
            let field = body
                .as_str()
                .ok_or_else(|| RejectionReason::malformed("$count expects a field name"))?;
            check_path(field)?;
            if field.contains('.') {
                return Err(RejectionReason::malformed("$count name must not be dotted"));
            }
            Ok(Stage::Count(field.to_string()))
        }
        "$unwind" => parse_unwind(body),
        other => Err(reject_operator(other)),
    }
}

fn parse_project(body: &Value) -> Result<Vec<(String, ProjectField)>, RejectionReason> {
    let map = body
        .as_object()
        .filter(|m| !m.is_empty())
        .ok_or_else(|| RejectionReason::malformed("$project expects a non-empty object"))?;
    let mut fields = Vec::with_capacity(map.len());
    for (name, spec) in map {
        check_path(name)?;
        let field = match spec {
            Value::Bool(true) => ProjectField::Include,
            Value::Bool(false) => ProjectField::Exclude,
            Value::Number(n) => match n.as_f64() {
                Some(f) if f == 0.0 => ProjectField::Exclude,
                Some(_) => ProjectField::Include,
                None => return Err(RejectionReason::malformed("invalid $project flag")),
            },
            Value::String(_) => match field_ref(spec) {
                Some(path) => {
                    check_path(path)?;
                    ProjectField::Rename(path.to_string())
                }
                None => {
                    return Err(RejectionReason::malformed(
                        "$project values must be 0, 1, or a \"$field\" reference",
                    ));
                }
            },
            Value::Object(inner) => {
                let op = inner.keys().next().cloned().unwrap_or_default();
                return Err(reject_operator(&op));
            }
            _ => return Err(RejectionReason::malformed("invalid $project value")),
        };
        fields.push((name.clone(), field));
    }
    let excludes = fields
        .iter()
        .filter(|(name, f)| *f == ProjectField::Exclude && name != "_id")
        .count();
    if excludes > 0 && excludes + usize::from(fields.iter().any(|(n, _)| n == "_id")) != fields.len()
    {
        return Err(RejectionReason::malformed(
            "$project cannot mix inclusion and exclusion",
        ));
    }
    Ok(fields)
}

fn parse_group(body: &Value) -> Result<GroupStage, RejectionReason> {
    let map = body
        .as_object()
        .ok_or_else(|| RejectionReason::malformed("$group expects an object"))?;
    let id = map
        .get("_id")
        .ok_or_else(|| RejectionReason::malformed("$group requires an _id"))?;
    let key = match id {
        Value::Null => GroupKey::Null,
        Value::String(_) => {
            let path = field_ref(id).ok_or_else(|| {
                RejectionReason::malformed("$group _id must be null or a \"$field\" reference")
            })?;
            check_path(path)?;
            GroupKey::Field(path.to_string())
        }
        Value::Object(parts) => {
            let mut compound = Vec::with_capacity(parts.len());
            for (name, part) in parts {
                if name.starts_with('$') {
                    return Err(reject_operator(name));
                }
                let path = field_ref(part).ok_or_else(|| {
                    RejectionReason::malformed("compound _id values must be \"$field\" references")
                })?;
                check_path(path)?;
                compound.push((name.clone(), path.to_string()));
            }
            GroupKey::Compound(compound)
        }
        _ => return Err(RejectionReason::malformed("invalid $group _id")),
    };

    let mut accumulators = Vec::new();
    for (name, spec) in map.iter().filter(|(k, _)| k.as_str() != "_id") {
        check_path(name)?;
        if name.contains('.') {
            return Err(RejectionReason::malformed("$group output names must not be dotted"));
        }
        let inner = spec
            .as_object()
            .filter(|m| m.len() == 1)
            .ok_or_else(|| RejectionReason::malformed("accumulators must be {\"$op\": arg}"))?;
        let (op_name, arg) = inner.iter().next().ok_or_else(|| {
            RejectionReason::malformed("accumulators must be {\"$op\": arg}")
        })?;
        let op = op_name
            .strip_prefix('$')
            .and_then(|o| o.parse::<AccumulatorOp>().ok())
            .ok_or_else(|| reject_operator(op_name))?;
        let operand = match (op, arg) {
            (AccumulatorOp::Count, Value::Object(m)) if m.is_empty() => Operand::Literal(json!(1)),
            (AccumulatorOp::Count, _) => {
                return Err(RejectionReason::malformed("$count accumulator expects {}"));
            }
            (_, Value::String(_)) => {
                let path = field_ref(arg).ok_or_else(|| {
                    RejectionReason::malformed("accumulator strings must be \"$field\" references")
                })?;
                check_path(path)?;
                Operand::Field(path.to_string())
            }
            (_, Value::Number(_)) | (_, Value::Bool(_)) | (_, Value::Null) => {
                Operand::Literal(arg.clone())
            }
            (_, Value::Object(m)) => {
                let nested = m.keys().next().cloned().unwrap_or_default();
                return Err(reject_operator(&nested));
            }
            (_, Value::Array(_)) => {
                return Err(RejectionReason::malformed("accumulator arguments must be scalar"));
            }
        };
        accumulators.push((name.clone(), Accumulator { op, operand }));
    }
    Ok(GroupStage { key, accumulators })
}

fn parse_unwind(body: &Value) -> Result<Stage, RejectionReason> {
    let (path_value, preserve) = match body {
        Value::String(_) => (body, false),
        Value::Object(map) => {
            if let Some(extra) = map
                .keys()
                .find(|k| k.as_str() != "path" && k.as_str() != "preserveNullAndEmptyArrays")
            {
                return Err(RejectionReason::malformed(format!(
                    "unsupported $unwind option `{extra}`"
                )));
            }
            let path = map
                .get("path")
                .ok_or_else(|| RejectionReason::malformed("$unwind requires a path"))?;
            let preserve = map
                .get("preserveNullAndEmptyArrays")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            (path, preserve)
        }
        _ => return Err(RejectionReason::malformed("invalid $unwind")),
    };
    let path = field_ref(path_value)
        .ok_or_else(|| RejectionReason::malformed("$unwind path must be a \"$field\" reference"))?;
    check_path(path)?;
    Ok(Stage::Unwind {
        path: path.to_string(),
        preserve_null_and_empty: preserve,
    })
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Match(_) => "$match",
            Stage::Sort(_) => "$sort",
            Stage::Skip(_) => "$skip",
            Stage::Limit(_) => "$limit",
            Stage::Project(_) => "$project",
            Stage::Group(_) => "$group",
            Stage::Count(_) => "$count",
            Stage::Unwind { .. } => "$unwind",
        }
    }

    /// Canonical JSON form.
    pub fn to_value(&self) -> Value {
        let body = match self {
            Stage::Match(f) => f.to_value(),
            Stage::Sort(keys) => sort_to_value(keys),
            Stage::Skip(n) | Stage::Limit(n) => json!(n),
            Stage::Project(fields) => {
                let mut map = Map::new();
                for (name, field) in fields {
                    let v = match field {
                        ProjectField::Include => json!(1),
                        ProjectField::Exclude => json!(0),
                        ProjectField::Rename(path) => json!(format!("${path}")),
                    };
                    map.insert(name.clone(), v);
                }
                Value::Object(map)
            }
            Stage::Group(group) => {
                let mut map = Map::new();
                let id = match &group.key {
                    GroupKey::Null => Value::Null,
                    GroupKey::Field(path) => json!(format!("${path}")),
                    GroupKey::Compound(parts) => Value::Object(
                        parts
                            .iter()
                            .map(|(n, p)| (n.clone(), json!(format!("${p}"))))
                            .collect(),
                    ),
                };
                map.insert("_id".into(), id);
                for (name, acc) in &group.accumulators {
                    let arg = match (&acc.op, &acc.operand) {
                        (AccumulatorOp::Count, _) => json!({}),
                        (_, Operand::Field(path)) => json!(format!("${path}")),
                        (_, Operand::Literal(v)) => v.clone(),
                    };
                    let mut inner = Map::new();
                    inner.insert(format!("${}", acc.op), arg);
                    map.insert(name.clone(), Value::Object(inner));
                }
                Value::Object(map)
            }
            Stage::Count(name) => json!(name),
            Stage::Unwind {
                path,
                preserve_null_and_empty,
            } => json!({
                "path": format!("${path}"),
                "preserveNullAndEmptyArrays": preserve_null_and_empty,
            }),
        };
        let mut stage = Map::new();
        stage.insert(self.name().to_string(), body);
        Value::Object(stage)
    }
}
