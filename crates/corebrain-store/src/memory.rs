// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory document store, optionally seeded from a JSON file.
//!
//! The seed file is an object mapping collection names to arrays of
//! documents: `{"products": [{...}, ...], "categories": [...]}`.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use corebrain_core::{AdapterType, CoreBrainError, Document, HealthStatus, PluginAdapter};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

use crate::traits::DocumentStore;

#[derive(Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<BTreeMap<String, Vec<Document>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a `{collection: [documents]}` value.
    pub fn from_value(seed: &Value) -> Result<Self, CoreBrainError> {
        let collections = parse_seed(seed)?;
        Ok(Self {
            collections: RwLock::new(collections),
        })
    }

    /// Load a seed file from disk.
    pub fn from_seed_file(path: &Path) -> Result<Self, CoreBrainError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            CoreBrainError::Config(format!("cannot read seed file {}: {e}", path.display()))
        })?;
        let seed: Value = serde_json::from_str(&raw).map_err(|e| {
            CoreBrainError::Config(format!("invalid seed file {}: {e}", path.display()))
        })?;
        let store = Self::from_value(&seed)?;
        info!(path = %path.display(), "document store seeded");
        Ok(store)
    }

    /// Append documents to a collection, creating it if needed.
    pub async fn insert_many(&self, collection: &str, docs: Vec<Document>) {
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .extend(docs);
    }
}

/// Split a seed value into per-collection document lists.
pub fn parse_seed(seed: &Value) -> Result<BTreeMap<String, Vec<Document>>, CoreBrainError> {
    let map = seed.as_object().ok_or_else(|| {
        CoreBrainError::Config("seed must be an object of collection arrays".into())
    })?;
    let mut collections = BTreeMap::new();
    for (name, docs) in map {
        let items = docs.as_array().ok_or_else(|| {
            CoreBrainError::Config(format!("seed collection `{name}` must be an array"))
        })?;
        let docs = items
            .iter()
            .map(|item| {
                item.as_object().cloned().ok_or_else(|| {
                    CoreBrainError::Config(format!(
                        "seed collection `{name}` contains a non-object document"
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        collections.insert(name.clone(), docs);
    }
    Ok(collections)
}

#[async_trait]
impl PluginAdapter for MemoryDocumentStore {
    fn name(&self) -> &str {
        "memory"
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
impl DocumentStore for MemoryDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>, CoreBrainError> {
        Ok(self.collections.read().await.keys().cloned().collect())
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Document>, CoreBrainError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn document_count(&self, collection: &str) -> Result<u64, CoreBrainError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map_or(0, |docs| docs.len() as u64))
    }

    async fn sample(&self, collection: &str, n: usize) -> Result<Vec<Document>, CoreBrainError> {
        Ok(self
            .collections
            .read()
            .await
            .get(collection)
            .map(|docs| docs.iter().take(n).cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebrain_query::{FilterExpr, SortKey};
    use serde_json::json;

    use crate::traits::FindRequest;

    fn seeded() -> MemoryDocumentStore {
        MemoryDocumentStore::from_value(&json!({
            "products": [
                {"_id": "p1", "name": "Desk", "price": 300},
                {"_id": "p2", "name": "Chair", "price": 90},
                {"_id": "p3", "name": "Lamp", "price": 25}
            ],
            "categories": []
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn find_filters_sorts_and_pages() {
        let store = seeded();
        let filter = FilterExpr::parse(&json!({"price": {"$gt": 20}})).unwrap();
        let sort = [SortKey::desc("price")];
        let docs = store
            .find(FindRequest {
                collection: "products",
                filter: &filter,
                sort: &sort,
                projection: None,
                skip: 1,
                limit: Some(1),
            })
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["name"], "Chair");
    }

    #[tokio::test]
    async fn counts_and_collections() {
        let store = seeded();
        assert_eq!(
            store.list_collections().await.unwrap(),
            vec!["categories", "products"]
        );
        assert_eq!(store.document_count("products").await.unwrap(), 3);
        let cheap = FilterExpr::parse(&json!({"price": {"$lt": 100}})).unwrap();
        assert_eq!(store.count("products", &cheap).await.unwrap(), 2);
        assert_eq!(store.document_count("missing").await.unwrap(), 0);
        assert_eq!(store.sample("products", 2).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn insert_many_appends() {
        let store = MemoryDocumentStore::new();
        let doc = json!({"_id": 1}).as_object().cloned().unwrap();
        store.insert_many("logs", vec![doc.clone(), doc]).await;
        assert_eq!(store.document_count("logs").await.unwrap(), 2);
    }

    #[test]
    fn seed_must_be_arrays_of_objects() {
        assert!(MemoryDocumentStore::from_value(&json!([1, 2])).is_err());
        assert!(MemoryDocumentStore::from_value(&json!({"a": {"b": 1}})).is_err());
        assert!(MemoryDocumentStore::from_value(&json!({"a": [1]})).is_err());
    }
}
