// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The validated query representation.

use serde_json::{Value, json};
use strum::{Display, EnumString};

use crate::filter::FilterExpr;
use crate::projection::Projection;
use crate::sort::{SortKey, sort_to_value};
use crate::stage::Stage;

/// Closed set of read-only operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Operation {
    Find,
    Count,
    Aggregate,
}

/// An approved query. Only [`crate::Validator`] constructs one, and it
/// exposes no mutators; clones are deep copies.
#[derive(Debug, Clone, PartialEq)]
pub struct QuerySpec {
    pub(crate) collection: String,
    pub(crate) operation: Operation,
    pub(crate) filter: FilterExpr,
    pub(crate) sort: Vec<SortKey>,
    pub(crate) projection: Option<Projection>,
    pub(crate) pipeline: Vec<Stage>,
    pub(crate) limit: u32,
    pub(crate) skip: u64,
}

impl QuerySpec {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn filter(&self) -> &FilterExpr {
        &self.filter
    }

    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.projection.as_ref()
    }

    /// Aggregation stages; empty unless the operation is `aggregate`.
    pub fn pipeline(&self) -> &[Stage] {
        &self.pipeline
    }

    /// Always within `[1, 100]`.
    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn skip(&self) -> u64 {
        self.skip
    }

    /// The outbound `mongo_query` shape.
    pub fn to_value(&self) -> Value {
        let mut value = json!({
            "collection": self.collection,
            "operation": self.operation.to_string(),
            "query": self.filter.to_value(),
            "sort": sort_to_value(&self.sort),
            "limit": self.limit,
        });
        if self.skip > 0 {
            value["skip"] = json!(self.skip);
        }
        if let Some(projection) = &self.projection {
            value["projection"] = projection.to_value();
        }
        if self.operation == Operation::Aggregate {
            value["pipeline"] = Value::Array(self.pipeline.iter().map(Stage::to_value).collect());
        }
        value
    }
}
