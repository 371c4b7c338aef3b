// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The query sanitizer.
//!
//! Rules run in a fixed order and the first failure wins:
//! 1. operation and aggregation stage names are allow-listed
//! 2. every operator in the filter, sort, projection and stages is allow-listed
//! 3. the target collection is in the caller's allow-list
//! 4. every referenced field exists in the schema and is visible to the caller
//! 5. `limit` and `skip` are clamped, never rejected

use std::collections::HashSet;

use corebrain_core::PermissionContext;
use serde_json::Value;
use tracing::debug;

use crate::candidate::Candidate;
use crate::error::RejectionReason;
use crate::filter::FilterExpr;
use crate::operators::{find_unsafe, reject_operator, root_field};
use crate::projection::Projection;
use crate::query::{Operation, QuerySpec};
use crate::schema::SchemaDescriptor;
use crate::sort::parse_sort;
use crate::stage::{ALLOWED_STAGES, GroupKey, Operand, ProjectField, Stage, parse_pipeline, stage_names};

/// Upper bound on any query limit, whatever the configuration says.
pub const HARD_MAX_LIMIT: u32 = 100;

/// Identifier fields every collection carries.
const INTERNAL_FIELDS: &[&str] = &["_id"];

/// Caller-supplied overrides that take precedence over the model's suggestion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryHints {
    /// Target collection used when the model names none.
    pub collection: Option<String>,
    /// Requested page size; clamped like any other limit.
    pub limit: Option<i64>,
}

/// Allow-list validator turning untrusted candidates into [`QuerySpec`]s.
#[derive(Debug, Clone, Copy)]
pub struct Validator {
    default_limit: u32,
    max_limit: u32,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(10, HARD_MAX_LIMIT)
    }
}

impl Validator {
    /// `max_limit` is capped at [`HARD_MAX_LIMIT`]; `default_limit` is kept inside `[1, max_limit]`.
    pub fn new(default_limit: u32, max_limit: u32) -> Self {
        let max_limit = max_limit.clamp(1, HARD_MAX_LIMIT);
        Self {
            default_limit: default_limit.clamp(1, max_limit),
            max_limit,
        }
    }

    pub fn max_limit(&self) -> u32 {
        self.max_limit
    }

    pub fn validate(
        &self,
        candidate: &Candidate,
        hints: &QueryHints,
        ctx: &PermissionContext,
        schema: &SchemaDescriptor,
    ) -> Result<QuerySpec, RejectionReason> {
        // Rule 1: operation and stage names.
        let op_name = candidate.operation_name();
        let operation: Operation = op_name.parse().map_err(|_| {
            RejectionReason::UnsafeOperator(format!("operation `{op_name}` is not permitted"))
        })?;
        if operation == Operation::Aggregate {
            let pipeline = candidate
                .pipeline
                .as_ref()
                .ok_or_else(|| RejectionReason::malformed("aggregate requires a pipeline"))?;
            for name in stage_names(pipeline)? {
                if !ALLOWED_STAGES.contains(&name.as_str()) {
                    return Err(reject_operator(&name));
                }
            }
        } else if candidate.pipeline.is_some() {
            return Err(RejectionReason::malformed(format!(
                "pipeline is only valid for aggregate, not {operation}"
            )));
        }

        // Rule 2: operators inside every clause.
        let filter = FilterExpr::parse(candidate.query.as_ref().unwrap_or(&Value::Null))?;
        for raw in [&candidate.sort, &candidate.projection].into_iter().flatten() {
            if let Some(op) = find_unsafe(raw) {
                return Err(reject_operator(&op));
            }
        }
        let (sort, projection, pipeline) = match operation {
            Operation::Find => (
                parse_sort(candidate.sort.as_ref().unwrap_or(&Value::Null))?,
                Projection::parse(candidate.projection.as_ref().unwrap_or(&Value::Null))?,
                Vec::new(),
            ),
            Operation::Count => (Vec::new(), None, Vec::new()),
            Operation::Aggregate => {
                if candidate.sort.is_some() || candidate.projection.is_some() {
                    return Err(RejectionReason::malformed(
                        "aggregate takes sort and projection as pipeline stages",
                    ));
                }
                let mut stages = parse_pipeline(candidate.pipeline.as_ref().unwrap_or(&Value::Null))?;
                if !filter.is_match_all() {
                    stages.insert(0, Stage::Match(filter.clone()));
                }
                (Vec::new(), None, stages)
            }
        };

        // Rule 3: collection access.
        let collection = candidate
            .collection
            .as_deref()
            .or(hints.collection.as_deref())
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| RejectionReason::malformed("no target collection"))?;
        if collection.contains('$') || collection.contains('\0') || collection.len() > 120 {
            return Err(RejectionReason::malformed("invalid collection name"));
        }
        if !ctx.can_access(collection) {
            return Err(RejectionReason::PermissionDenied(format!(
                "collection '{collection}' is not accessible at level {}",
                ctx.level
            )));
        }

        // Rule 4: field references.
        let mut scope = FieldScope::for_collection(collection, schema, ctx);
        if operation == Operation::Aggregate {
            for stage in &pipeline {
                scope.apply(stage)?;
            }
        } else {
            for path in filter.field_paths() {
                scope.check(path)?;
            }
            for key in &sort {
                scope.check(&key.field)?;
            }
            if let Some(projection) = &projection {
                for field in projection.fields() {
                    scope.check(field)?;
                }
            }
        }

        // Rule 5: silent normalization.
        let requested = hints.limit.or_else(|| candidate.limit.as_ref().and_then(as_int));
        let limit = match requested {
            Some(n) => n.clamp(1, i64::from(self.max_limit)) as u32,
            None => self.default_limit,
        };
        let skip = candidate
            .skip
            .as_ref()
            .and_then(as_int)
            .map(|n| n.max(0) as u64)
            .unwrap_or(0);

        let filter = if operation == Operation::Aggregate {
            FilterExpr::match_all()
        } else {
            filter
        };
        debug!(
            collection,
            operation = %operation,
            limit,
            skip,
            "candidate query approved"
        );
        Ok(QuerySpec {
            collection: collection.to_string(),
            operation,
            filter,
            sort,
            projection,
            pipeline,
            limit,
            skip,
        })
    }
}

fn as_int(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
}

/// Field names reachable at a point in the query.
struct FieldScope<'a> {
    collection: &'a str,
    ctx: &'a PermissionContext,
    available: HashSet<String>,
    /// Whether `available` still names collection fields (subject to
    /// visibility) rather than computed ones.
    from_source: bool,
}

impl<'a> FieldScope<'a> {
    fn for_collection(
        collection: &'a str,
        schema: &SchemaDescriptor,
        ctx: &'a PermissionContext,
    ) -> Self {
        let mut available: HashSet<String> =
            INTERNAL_FIELDS.iter().map(|f| f.to_string()).collect();
        if let Some(coll) = schema.collection(collection) {
            available.extend(coll.schema.keys().cloned());
        }
        Self {
            collection,
            ctx,
            available,
            from_source: true,
        }
    }

    fn check(&self, path: &str) -> Result<(), RejectionReason> {
        let known = self.available.contains(root_field(path));
        let visible = !self.from_source || self.ctx.field_visible(self.collection, path);
        if known && visible {
            Ok(())
        } else {
            Err(RejectionReason::UnknownField {
                collection: self.collection.to_string(),
                field: path.to_string(),
            })
        }
    }

    fn apply(&mut self, stage: &Stage) -> Result<(), RejectionReason> {
        match stage {
            Stage::Match(filter) => {
                for path in filter.field_paths() {
                    self.check(path)?;
                }
            }
            Stage::Sort(keys) => {
                for key in keys {
                    self.check(&key.field)?;
                }
            }
            Stage::Skip(_) | Stage::Limit(_) => {}
            Stage::Unwind { path, .. } => self.check(path)?,
            Stage::Project(fields) => {
                for (name, field) in fields {
                    match field {
                        ProjectField::Include | ProjectField::Exclude => self.check(name)?,
                        ProjectField::Rename(source) => self.check(source)?,
                    }
                }
                let inclusive = fields.iter().any(|(n, f)| n != "_id" && *f != ProjectField::Exclude);
                if inclusive {
                    let id_excluded = fields
                        .iter()
                        .any(|(n, f)| n == "_id" && *f == ProjectField::Exclude);
                    let mut next: HashSet<String> = fields
                        .iter()
                        .filter(|(_, f)| *f != ProjectField::Exclude)
                        .map(|(n, _)| root_field(n).to_string())
                        .collect();
                    if !id_excluded {
                        next.insert("_id".to_string());
                    }
                    self.available = next;
                } else {
                    for (name, _) in fields {
                        if !name.contains('.') {
                            self.available.remove(name.as_str());
                        }
                    }
                }
            }
            Stage::Group(group) => {
                match &group.key {
                    GroupKey::Null => {}
                    GroupKey::Field(path) => self.check(path)?,
                    GroupKey::Compound(parts) => {
                        for (_, path) in parts {
                            self.check(path)?;
                        }
                    }
                }
                for (_, acc) in &group.accumulators {
                    if let Operand::Field(path) = &acc.operand {
                        self.check(path)?;
                    }
                }
                self.available = std::iter::once("_id".to_string())
                    .chain(group.accumulators.iter().map(|(n, _)| n.clone()))
                    .collect();
                self.from_source = false;
            }
            Stage::Count(name) => {
                self.available = HashSet::from([name.clone()]);
                self.from_source = false;
            }
        }
        Ok(())
    }
}
