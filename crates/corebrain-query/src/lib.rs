// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Closed query grammar and sanitizer for CoreBrain.
//!
//! Model output is untrusted text. This crate extracts a [`Candidate`] from
//! it, and [`Validator`] turns the candidate into an immutable [`QuerySpec`]
//! only when every operation, operator, collection, and field is allow-listed.
//! Anything else is a [`RejectionReason`].

pub mod candidate;
pub mod error;
pub mod filter;
pub mod fingerprint;
pub mod operators;
pub mod projection;
pub mod query;
pub mod schema;
pub mod sort;
pub mod stage;
pub mod validator;

pub use candidate::{Candidate, parse_candidate};
pub use error::RejectionReason;
pub use filter::{Condition, FilterExpr};
pub use fingerprint::Fingerprint;
pub use projection::Projection;
pub use query::{Operation, QuerySpec};
pub use schema::{CollectionSchema, FieldInfo, SchemaDescriptor};
pub use sort::SortKey;
pub use stage::{Accumulator, AccumulatorOp, GroupKey, GroupStage, Operand, ProjectField, Stage};
pub use validator::{HARD_MAX_LIMIT, QueryHints, Validator};
