// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runs approved queries against the document store.
//!
//! Every call holds a store permit and is bounded by the execution
//! timeout. The total-count side query has its own, shorter budget; when it
//! misses, `has_more` falls back to probing for one extra document.

use std::sync::Arc;
use std::time::{Duration, Instant};

use corebrain_core::{CoreBrainError, Document};
use corebrain_query::{Operation, QuerySpec};
use corebrain_resilience::ConcurrencyLimiter;
use serde_json::Value;
use tracing::{info, warn};

use crate::traits::{DocumentStore, FindRequest};

/// Documents plus the paging facts callers need.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    pub collection: String,
    pub operation: Operation,
    pub documents: Vec<Document>,
    /// Exact when `total_exact`, otherwise a lower bound.
    pub total_count: u64,
    pub total_exact: bool,
    pub has_more: bool,
    pub skip: u64,
    pub limit: u32,
    pub pipeline_stages: Option<usize>,
    pub elapsed: Duration,
}

pub struct QueryExecutor {
    store: Arc<dyn DocumentStore>,
    limiter: ConcurrencyLimiter,
    timeout: Duration,
    count_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        limiter: ConcurrencyLimiter,
        timeout: Duration,
        count_timeout: Duration,
    ) -> Self {
        Self {
            store,
            limiter,
            timeout,
            count_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub async fn execute(&self, spec: &QuerySpec) -> Result<ExecutionResult, CoreBrainError> {
        let started = Instant::now();
        let bounded = tokio::time::timeout(self.timeout, async {
            let _permit = self.limiter.acquire().await?;
            self.run(spec).await
        })
        .await;

        let mut result = match bounded {
            Ok(Ok(result)) => result,
            Ok(Err(e @ CoreBrainError::Execution { .. })) => return Err(e),
            Ok(Err(e)) => {
                warn!(collection = spec.collection(), error = %e, "query execution failed");
                return Err(CoreBrainError::Execution {
                    message: format!("query on `{}` failed: {e}", spec.collection()),
                    source: Some(Box::new(e)),
                });
            }
            Err(_) => {
                warn!(
                    collection = spec.collection(),
                    timeout_ms = self.timeout.as_millis() as u64,
                    "query execution timed out"
                );
                return Err(CoreBrainError::Execution {
                    message: format!(
                        "query on `{}` timed out after {}ms",
                        spec.collection(),
                        self.timeout.as_millis()
                    ),
                    source: None,
                });
            }
        };

        for doc in &mut result.documents {
            stringify_id(doc);
        }
        result.elapsed = started.elapsed();
        info!(
            collection = %result.collection,
            operation = %result.operation,
            returned = result.documents.len(),
            total_count = result.total_count,
            elapsed_ms = result.elapsed.as_millis() as u64,
            "query executed"
        );
        Ok(result)
    }

    async fn run(&self, spec: &QuerySpec) -> Result<ExecutionResult, CoreBrainError> {
        let base = ExecutionResult {
            collection: spec.collection().to_string(),
            operation: spec.operation(),
            documents: Vec::new(),
            total_count: 0,
            total_exact: true,
            has_more: false,
            skip: spec.skip(),
            limit: spec.limit(),
            pipeline_stages: None,
            elapsed: Duration::ZERO,
        };
        match spec.operation() {
            Operation::Find => self.run_find(spec, base).await,
            Operation::Count => {
                let n = self.store.count(spec.collection(), spec.filter()).await?;
                let mut row = Document::new();
                row.insert("count".into(), Value::from(n));
                Ok(ExecutionResult {
                    documents: vec![row],
                    total_count: n,
                    ..base
                })
            }
            Operation::Aggregate => {
                let rows = self
                    .store
                    .aggregate(spec.collection(), spec.pipeline())
                    .await?;
                let total = rows.len() as u64;
                let skip = usize::try_from(spec.skip()).unwrap_or(usize::MAX);
                let documents: Vec<Document> = rows
                    .into_iter()
                    .skip(skip)
                    .take(spec.limit() as usize)
                    .collect();
                Ok(ExecutionResult {
                    has_more: total > spec.skip().saturating_add(u64::from(spec.limit())),
                    documents,
                    total_count: total,
                    pipeline_stages: Some(spec.pipeline().len()),
                    ..base
                })
            }
        }
    }

    async fn run_find(
        &self,
        spec: &QuerySpec,
        base: ExecutionResult,
    ) -> Result<ExecutionResult, CoreBrainError> {
        let limit = u64::from(spec.limit());
        let request = FindRequest {
            collection: spec.collection(),
            filter: spec.filter(),
            sort: spec.sort(),
            projection: spec.projection(),
            skip: spec.skip(),
            limit: Some(limit + 1),
        };
        let count = tokio::time::timeout(
            self.count_timeout,
            self.store.count(spec.collection(), spec.filter()),
        );
        let (found, counted) = tokio::join!(self.store.find(request), count);

        let mut documents = found?;
        let looked_ahead = documents.len() as u64 > limit;
        documents.truncate(limit as usize);
        let returned = documents.len() as u64;

        let (total_count, total_exact, has_more) = match counted {
            Ok(Ok(n)) => (n, true, n > spec.skip().saturating_add(limit)),
            Ok(Err(e)) => {
                warn!(collection = spec.collection(), error = %e, "total count failed; estimating");
                (spec.skip() + returned + u64::from(looked_ahead), false, looked_ahead)
            }
            Err(_) => {
                warn!(collection = spec.collection(), "total count timed out; estimating");
                (spec.skip() + returned + u64::from(looked_ahead), false, looked_ahead)
            }
        };

        Ok(ExecutionResult {
            documents,
            total_count,
            total_exact,
            has_more,
            ..base
        })
    }
}

/// Render `_id` as a string. `{"$oid": "..."}` wrappers are unwrapped.
pub fn stringify_id(doc: &mut Document) {
    let Some(id) = doc.get_mut("_id") else {
        return;
    };
    let rendered = match &*id {
        Value::String(_) => return,
        Value::Object(map) => match map.get("$oid").and_then(Value::as_str) {
            Some(oid) => oid.to_string(),
            None => id.to_string(),
        },
        other => other.to_string(),
    };
    *id = Value::String(rendered);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use corebrain_core::{AdapterType, HealthStatus, PermissionContext, PermissionLevel, PluginAdapter};
    use corebrain_query::{Candidate, CollectionSchema, FieldInfo, QueryHints, SchemaDescriptor, Validator};
    use serde_json::json;

    use crate::memory::MemoryDocumentStore;

    fn products(n: usize) -> MemoryDocumentStore {
        let docs: Vec<Value> = (0..n)
            .map(|i| json!({"_id": i, "name": format!("p{i}"), "price": i * 10}))
            .collect();
        MemoryDocumentStore::from_value(&json!({ "products": docs })).unwrap()
    }

    fn schema() -> SchemaDescriptor {
        let mut coll = CollectionSchema::default();
        for (field, ty) in [("_id", "int"), ("name", "string"), ("price", "int")] {
            coll.schema.insert(
                field.into(),
                FieldInfo {
                    field_type: ty.into(),
                    example: String::new(),
                },
            );
        }
        let mut descriptor = SchemaDescriptor::default();
        descriptor.collections.insert("products".into(), coll);
        descriptor
    }

    fn spec(query: Value) -> QuerySpec {
        let candidate = Candidate::from_value(query).unwrap();
        let ctx = PermissionContext::new("t", PermissionLevel::Admin, vec!["*".into()]);
        Validator::default()
            .validate(&candidate, &QueryHints::default(), &ctx, &schema())
            .unwrap()
    }

    fn executor(store: Arc<dyn DocumentStore>, count_timeout: Duration) -> QueryExecutor {
        QueryExecutor::new(
            store,
            ConcurrencyLimiter::new("store", 4),
            Duration::from_secs(5),
            count_timeout,
        )
    }

    #[tokio::test]
    async fn find_reports_has_more_from_count() {
        let exec = executor(Arc::new(products(120)), Duration::from_secs(1));
        let result = exec
            .execute(&spec(json!({
                "collection": "products", "operation": "find",
                "query": {}, "sort": {"price": -1}, "limit": 5
            })))
            .await
            .unwrap();
        assert_eq!(result.documents.len(), 5);
        assert_eq!(result.total_count, 120);
        assert!(result.total_exact);
        assert!(result.has_more);
        assert_eq!(result.documents[0]["price"], 1190);
        assert_eq!(result.documents[0]["_id"], "119");
    }

    #[tokio::test]
    async fn last_page_has_no_more() {
        let exec = executor(Arc::new(products(12)), Duration::from_secs(1));
        let result = exec
            .execute(&spec(json!({
                "collection": "products", "operation": "find", "skip": 10, "limit": 5
            })))
            .await
            .unwrap();
        assert_eq!(result.documents.len(), 2);
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn count_returns_single_row() {
        let exec = executor(Arc::new(products(30)), Duration::from_secs(1));
        let result = exec
            .execute(&spec(json!({
                "collection": "products", "operation": "count",
                "query": {"price": {"$gte": 100}}
            })))
            .await
            .unwrap();
        assert_eq!(result.documents, vec![json!({"count": 20}).as_object().cloned().unwrap()]);
        assert!(!result.has_more);
    }

    #[tokio::test]
    async fn aggregate_pages_results_and_reports_stages() {
        let exec = executor(Arc::new(products(10)), Duration::from_secs(1));
        let result = exec
            .execute(&spec(json!({
                "collection": "products", "operation": "aggregate",
                "pipeline": [{"$sort": {"price": 1}}, {"$project": {"name": 1}}],
                "limit": 3
            })))
            .await
            .unwrap();
        assert_eq!(result.documents.len(), 3);
        assert_eq!(result.total_count, 10);
        assert!(result.has_more);
        assert_eq!(result.pipeline_stages, Some(2));
    }

    /// Store whose count never finishes in time.
    struct SlowCount(MemoryDocumentStore);

    #[async_trait]
    impl PluginAdapter for SlowCount {
        fn name(&self) -> &str {
            "slow-count"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 1, 0)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::DocumentStore
        }
        async fn health_check(&self) -> Result<HealthStatus, CoreBrainError> {
            Ok(HealthStatus::Healthy)
        }
        async fn shutdown(&self) -> Result<(), CoreBrainError> {
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentStore for SlowCount {
        async fn list_collections(&self) -> Result<Vec<String>, CoreBrainError> {
            self.0.list_collections().await
        }
        async fn scan(&self, collection: &str) -> Result<Vec<Document>, CoreBrainError> {
            self.0.scan(collection).await
        }
        async fn count(
            &self,
            _collection: &str,
            _filter: &corebrain_query::FilterExpr,
        ) -> Result<u64, CoreBrainError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_count_degrades_to_lookahead() {
        let exec = executor(Arc::new(SlowCount(products(8))), Duration::from_millis(50));
        let result = exec
            .execute(&spec(json!({"collection": "products", "operation": "find", "limit": 5})))
            .await
            .unwrap();
        assert!(result.has_more);
        assert!(!result.total_exact);
        assert_eq!(result.total_count, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn execution_timeout_is_an_execution_error() {
        let exec = QueryExecutor::new(
            Arc::new(SlowCount(products(3))),
            ConcurrencyLimiter::new("store", 1),
            Duration::from_millis(100),
            Duration::from_secs(600),
        );
        let err = exec
            .execute(&spec(json!({"collection": "products", "operation": "count"})))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreBrainError::Execution { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn ids_render_as_strings() {
        let mut a = json!({"_id": {"$oid": "65f0"}}).as_object().cloned().unwrap();
        stringify_id(&mut a);
        assert_eq!(a["_id"], "65f0");
        let mut b = json!({"_id": 7}).as_object().cloned().unwrap();
        stringify_id(&mut b);
        assert_eq!(b["_id"], "7");
        let mut c = json!({"_id": {"k": 1}}).as_object().cloned().unwrap();
        stringify_id(&mut c);
        assert_eq!(c["_id"], r#"{"k":1}"#);
        let mut d = json!({"_id": "already"}).as_object().cloned().unwrap();
        stringify_id(&mut d);
        assert_eq!(d["_id"], "already");
    }
}
