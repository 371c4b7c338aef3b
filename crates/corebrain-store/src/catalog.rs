// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema catalog: infers per-collection field types from sampled documents
//! and caches the result for a configurable TTL.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::{Duration, Instant};

use corebrain_core::{CoreBrainError, Document, PermissionContext};
use corebrain_query::{CollectionSchema, FieldInfo, SchemaDescriptor};
use corebrain_resilience::ConcurrencyLimiter;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::traits::DocumentStore;

/// Name used for a JSON value's kind in schema descriptors.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "double",
        Value::Number(_) => "int",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn example(value: &Value, max_chars: usize) -> String {
    let rendered = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    if rendered.chars().count() > max_chars {
        let truncated: String = rendered.chars().take(max_chars).collect();
        format!("{truncated}...")
    } else {
        rendered
    }
}

/// Infer a collection schema from sampled documents. `_id` is omitted.
///
/// A field seen with several non-null kinds is typed `mixed(a, b)`; null is
/// only reported when no other kind was seen.
pub fn infer_schema(docs: &[Document], document_count: u64, max_chars: usize) -> CollectionSchema {
    let mut kinds: BTreeMap<String, BTreeSet<&'static str>> = BTreeMap::new();
    let mut examples: BTreeMap<String, String> = BTreeMap::new();

    for doc in docs {
        for (field, value) in doc.iter().filter(|(k, _)| k.as_str() != "_id") {
            kinds.entry(field.clone()).or_default().insert(type_name(value));
            let needs_example = examples.get(field).is_none_or(|e| e == "null");
            if needs_example {
                examples.insert(field.clone(), example(value, max_chars));
            }
        }
    }

    let schema = kinds
        .into_iter()
        .map(|(field, mut seen)| {
            if seen.len() > 1 {
                seen.remove("null");
            }
            let field_type = if seen.len() == 1 {
                seen.iter().next().copied().unwrap_or("null").to_string()
            } else {
                format!("mixed({})", seen.into_iter().collect::<Vec<_>>().join(", "))
            };
            let example = examples.remove(&field).unwrap_or_default();
            (field, FieldInfo { field_type, example })
        })
        .collect();

    CollectionSchema {
        document_count,
        schema,
    }
}

struct Snapshot {
    built_at: Instant,
    descriptor: Arc<SchemaDescriptor>,
}

pub struct SchemaCatalog {
    store: Arc<dyn DocumentStore>,
    limiter: ConcurrencyLimiter,
    ttl: Duration,
    sample_size: usize,
    example_max_chars: usize,
    snapshot: RwLock<Option<Snapshot>>,
}

impl SchemaCatalog {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        limiter: ConcurrencyLimiter,
        ttl: Duration,
        sample_size: usize,
        example_max_chars: usize,
    ) -> Self {
        Self {
            store,
            limiter,
            ttl,
            sample_size: sample_size.max(1),
            example_max_chars,
            snapshot: RwLock::new(None),
        }
    }

    /// The full catalog, rebuilt when older than the TTL. A failed rebuild
    /// keeps serving the previous snapshot.
    pub async fn snapshot(&self) -> Result<Arc<SchemaDescriptor>, CoreBrainError> {
        {
            let guard = self.snapshot.read().await;
            if let Some(snap) = guard.as_ref() {
                if snap.built_at.elapsed() < self.ttl {
                    return Ok(snap.descriptor.clone());
                }
            }
        }

        let mut guard = self.snapshot.write().await;
        if let Some(snap) = guard.as_ref() {
            if snap.built_at.elapsed() < self.ttl {
                return Ok(snap.descriptor.clone());
            }
        }
        match self.build().await {
            Ok(descriptor) => {
                let descriptor = Arc::new(descriptor);
                *guard = Some(Snapshot {
                    built_at: Instant::now(),
                    descriptor: descriptor.clone(),
                });
                Ok(descriptor)
            }
            Err(e) => match guard.as_ref() {
                Some(stale) => {
                    warn!(error = %e, "schema refresh failed; serving stale catalog");
                    Ok(stale.descriptor.clone())
                }
                None => Err(e),
            },
        }
    }

    /// The part of the catalog visible to `ctx`.
    pub async fn describe(&self, ctx: &PermissionContext) -> Result<SchemaDescriptor, CoreBrainError> {
        Ok(self.snapshot().await?.visible_to(ctx))
    }

    /// Drop the cached snapshot and rebuild immediately.
    pub async fn refresh(&self) -> Result<Arc<SchemaDescriptor>, CoreBrainError> {
        let descriptor = Arc::new(self.build().await?);
        *self.snapshot.write().await = Some(Snapshot {
            built_at: Instant::now(),
            descriptor: descriptor.clone(),
        });
        info!(collections = descriptor.collections.len(), "schema catalog refreshed");
        Ok(descriptor)
    }

    /// Invalidate without rebuilding.
    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }

    async fn build(&self) -> Result<SchemaDescriptor, CoreBrainError> {
        let _permit = self.limiter.acquire().await?;
        let started = Instant::now();
        let mut collections = BTreeMap::new();
        for name in self.store.list_collections().await? {
            let count = self.store.document_count(&name).await?;
            let sample = self.store.sample(&name, self.sample_size).await?;
            collections.insert(
                name,
                infer_schema(&sample, count, self.example_max_chars),
            );
        }
        debug!(
            collections = collections.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "schema inferred"
        );
        Ok(SchemaDescriptor { collections })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use corebrain_core::{AdapterType, HealthStatus, PermissionLevel, PluginAdapter};
    use serde_json::json;

    use crate::memory::MemoryDocumentStore;

    fn docs(values: Vec<Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn infers_types_examples_and_conflicts() {
        let sample = docs(vec![
            json!({"_id": 1, "name": "Desk", "price": 10, "rating": null, "sku": "A1"}),
            json!({"_id": 2, "name": "Chair", "price": 9.5, "rating": 4, "tags": ["x"]}),
        ]);
        let schema = infer_schema(&sample, 40, 50);
        assert_eq!(schema.document_count, 40);
        assert!(!schema.has_field("_id"));
        assert_eq!(schema.schema["name"].field_type, "string");
        assert_eq!(schema.schema["name"].example, "Desk");
        assert_eq!(schema.schema["price"].field_type, "mixed(double, int)");
        assert_eq!(schema.schema["rating"].field_type, "int");
        assert_eq!(schema.schema["rating"].example, "4");
        assert_eq!(schema.schema["tags"].field_type, "array");
        assert_eq!(schema.schema["tags"].example, "[\"x\"]");
    }

    #[test]
    fn long_examples_are_truncated() {
        let long = "x".repeat(80);
        let schema = infer_schema(&docs(vec![json!({"bio": long})]), 1, 50);
        let example = &schema.schema["bio"].example;
        assert_eq!(example.len(), 53);
        assert!(example.ends_with("..."));
    }

    struct CountingStore {
        inner: MemoryDocumentStore,
        lists: AtomicUsize,
    }

    #[async_trait]
    impl PluginAdapter for CountingStore {
        fn name(&self) -> &str {
            "counting"
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
    impl DocumentStore for CountingStore {
        async fn list_collections(&self) -> Result<Vec<String>, CoreBrainError> {
            self.lists.fetch_add(1, Ordering::SeqCst);
            self.inner.list_collections().await
        }
        async fn scan(&self, collection: &str) -> Result<Vec<Document>, CoreBrainError> {
            self.inner.scan(collection).await
        }
    }

    fn catalog(ttl: Duration) -> (Arc<CountingStore>, SchemaCatalog) {
        let store = Arc::new(CountingStore {
            inner: MemoryDocumentStore::from_value(&json!({
                "products": [{"_id": 1, "name": "Desk", "cost": 5}],
                "users": [{"_id": 1, "email": "a@b.c", "password": "x"}]
            }))
            .unwrap(),
            lists: AtomicUsize::new(0),
        });
        let catalog = SchemaCatalog::new(
            store.clone(),
            ConcurrencyLimiter::new("store", 2),
            ttl,
            5,
            50,
        );
        (store, catalog)
    }

    #[tokio::test]
    async fn snapshot_is_cached_within_ttl() {
        let (store, catalog) = catalog(Duration::from_secs(600));
        catalog.snapshot().await.unwrap();
        catalog.snapshot().await.unwrap();
        assert_eq!(store.lists.load(Ordering::SeqCst), 1);

        catalog.refresh().await.unwrap();
        assert_eq!(store.lists.load(Ordering::SeqCst), 2);

        catalog.invalidate().await;
        catalog.snapshot().await.unwrap();
        assert_eq!(store.lists.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn expired_snapshot_is_rebuilt() {
        let (store, catalog) = catalog(Duration::ZERO);
        catalog.snapshot().await.unwrap();
        catalog.snapshot().await.unwrap();
        assert_eq!(store.lists.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn describe_applies_permissions() {
        let (_store, catalog) = catalog(Duration::from_secs(600));
        let ctx = PermissionContext::new("r", PermissionLevel::Read, vec!["users".into()])
            .with_hidden_fields(vec!["password".into()]);
        let visible = catalog.describe(&ctx).await.unwrap();
        assert_eq!(visible.collection_names().collect::<Vec<_>>(), vec!["users"]);
        let users = visible.collection("users").unwrap();
        assert!(users.has_field("email"));
        assert!(!users.has_field("password"));
    }
}
