// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed document store.
//!
//! Documents are stored as JSON text in the `documents` table and evaluated
//! in process by the default [`DocumentStore`] query methods.

use async_trait::async_trait;
use corebrain_core::{AdapterType, CoreBrainError, Document, HealthStatus, PluginAdapter};
use corebrain_storage::{Database, queries};
use serde_json::Value;
use tracing::{debug, info};

use crate::traits::DocumentStore;

pub struct SqliteDocumentStore {
    db: Database,
}

impl SqliteDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn open(path: &str) -> Result<Self, CoreBrainError> {
        Ok(Self::new(Database::open(path).await?))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Upsert documents into `collection`, keyed by their `_id`. Documents
    /// without one get a fresh UUID. Returns the number written.
    pub async fn import_collection(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<usize, CoreBrainError> {
        let rows = docs
            .into_iter()
            .map(|mut doc| {
                let id = match doc.get("_id") {
                    Some(Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => {
                        let id = uuid::Uuid::new_v4().to_string();
                        doc.insert("_id".into(), Value::String(id.clone()));
                        id
                    }
                };
                let body = serde_json::to_string(&doc).map_err(|e| CoreBrainError::Storage {
                    source: Box::new(e),
                })?;
                Ok((id, body))
            })
            .collect::<Result<Vec<_>, CoreBrainError>>()?;
        let written = queries::documents::upsert_documents(&self.db, collection, rows).await?;
        info!(collection, written, "documents imported");
        Ok(written)
    }

    pub async fn drop_collection(&self, collection: &str) -> Result<usize, CoreBrainError> {
        queries::documents::drop_collection(&self.db, collection).await
    }

    fn decode(bodies: Vec<String>) -> Result<Vec<Document>, CoreBrainError> {
        bodies
            .iter()
            .map(|body| {
                serde_json::from_str::<Document>(body).map_err(|e| CoreBrainError::Storage {
                    source: Box::new(e),
                })
            })
            .collect()
    }
}

#[async_trait]
impl PluginAdapter for SqliteDocumentStore {
    fn name(&self) -> &str {
        "sqlite-documents"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::DocumentStore
    }

    async fn health_check(&self) -> Result<HealthStatus, CoreBrainError> {
        queries::documents::list_collections(&self.db).await?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CoreBrainError> {
        self.db.checkpoint().await?;
        debug!("document store closed");
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn list_collections(&self) -> Result<Vec<String>, CoreBrainError> {
        queries::documents::list_collections(&self.db).await
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Document>, CoreBrainError> {
        Self::decode(queries::documents::scan_bodies(&self.db, collection, None).await?)
    }

    async fn document_count(&self, collection: &str) -> Result<u64, CoreBrainError> {
        queries::documents::count_documents(&self.db, collection).await
    }

    async fn sample(&self, collection: &str, n: usize) -> Result<Vec<Document>, CoreBrainError> {
        Self::decode(queries::documents::scan_bodies(&self.db, collection, Some(n)).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebrain_query::FilterExpr;
    use serde_json::json;

    async fn open() -> (tempfile::TempDir, SqliteDocumentStore) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.db");
        let store = SqliteDocumentStore::open(path.to_str().unwrap()).await.unwrap();
        (dir, store)
    }

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn import_then_query() {
        let (_dir, store) = open().await;
        let written = store
            .import_collection(
                "products",
                vec![
                    doc(json!({"_id": "p1", "name": "Desk", "price": 300})),
                    doc(json!({"_id": 2, "name": "Chair", "price": 90})),
                    doc(json!({"name": "Lamp", "price": 25})),
                ],
            )
            .await
            .unwrap();
        assert_eq!(written, 3);
        assert_eq!(store.list_collections().await.unwrap(), vec!["products"]);
        assert_eq!(store.document_count("products").await.unwrap(), 3);

        let all = store.scan("products").await.unwrap();
        assert_eq!(all[0]["name"], "Desk");
        assert!(all[2]["_id"].is_string());

        let cheap = FilterExpr::parse(&json!({"price": {"$lt": 100}})).unwrap();
        assert_eq!(store.count("products", &cheap).await.unwrap(), 2);
        assert_eq!(store.sample("products", 1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reimport_replaces_by_id() {
        let (_dir, store) = open().await;
        store
            .import_collection("products", vec![doc(json!({"_id": "p1", "price": 1}))])
            .await
            .unwrap();
        store
            .import_collection("products", vec![doc(json!({"_id": "p1", "price": 2}))])
            .await
            .unwrap();
        let all = store.scan("products").await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0]["price"], 2);

        assert_eq!(store.drop_collection("products").await.unwrap(), 1);
        assert!(store.scan("products").await.unwrap().is_empty());
    }
}
