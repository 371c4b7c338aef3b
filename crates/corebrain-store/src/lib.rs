// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Document store adapters, query execution, and schema inference.
//!
//! [`DocumentStore`] is the backend seam. [`QueryExecutor`] runs approved
//! [`corebrain_query::QuerySpec`]s against it, and [`SchemaCatalog`] samples
//! it to describe collections to the model.

pub mod aggregate;
pub mod catalog;
pub mod executor;
pub mod matcher;
pub mod memory;
pub mod sqlite;
pub mod traits;
pub mod transform;
pub mod value;

pub use catalog::{SchemaCatalog, infer_schema};
pub use executor::{ExecutionResult, QueryExecutor, stringify_id};
pub use memory::MemoryDocumentStore;
pub use sqlite::SqliteDocumentStore;
pub use traits::{DocumentStore, FindRequest};
