// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Seeded fixtures and a store wrapper that counts executions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};

use corebrain_core::{AdapterType, CoreBrainError, Document, HealthStatus, PluginAdapter};
use corebrain_query::{FilterExpr, Stage};
use corebrain_store::{DocumentStore, FindRequest, MemoryDocumentStore};

pub const PRODUCT_COUNT: usize = 120;

const CATEGORIES: [&str; 4] = ["electronics", "home", "garden", "toys"];

/// Sales figure of product `i`. Distinct for every product in the fixture.
pub fn product_sales(i: usize) -> u64 {
    (i as u64 * 919) % 1000
}

/// The fixture's products: `name`, `sales`, `price`, `category`.
pub fn products() -> Vec<Value> {
    (1..=PRODUCT_COUNT)
        .map(|i| {
            json!({
                "_id": format!("p{i:03}"),
                "name": format!("Product {i:03}"),
                "sales": product_sales(i),
                "price": 5.0 + (i % 40) as f64 * 2.5,
                "category": CATEGORIES[i % CATEGORIES.len()],
            })
        })
        .collect()
}

/// Names of the `n` best-selling products, best first.
pub fn top_sellers(n: usize) -> Vec<String> {
    let mut ranked: Vec<usize> = (1..=PRODUCT_COUNT).collect();
    ranked.sort_by_key(|&i| std::cmp::Reverse(product_sales(i)));
    ranked
        .into_iter()
        .take(n)
        .map(|i| format!("Product {i:03}"))
        .collect()
}

/// Products plus small `categories` and `users` collections. Users carry
/// a `password` field that read callers must never see.
pub fn seed() -> Value {
    let categories: Vec<Value> = CATEGORIES
        .iter()
        .map(|c| json!({"_id": c, "name": c, "active": true}))
        .collect();
    json!({
        "products": products(),
        "categories": categories,
        "users": [
            {"_id": "u1", "email": "ada@example.com", "password": "hunter2", "plan": "pro"},
            {"_id": "u2", "email": "bob@example.com", "password": "swordfish", "plan": "free"}
        ],
        "orders": [
            {"_id": "o1", "product": "Product 001", "quantity": 2, "status": "shipped"}
        ]
    })
}

/// An in-memory store holding [`seed`].
pub fn seeded_store() -> Result<MemoryDocumentStore, CoreBrainError> {
    MemoryDocumentStore::from_value(&seed())
}

/// Wraps a document store and counts the queries run against it.
pub struct CountingStore {
    inner: Arc<dyn DocumentStore>,
    executions: AtomicUsize,
    counts: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner,
            executions: AtomicUsize::new(0),
            counts: AtomicUsize::new(0),
        }
    }

    /// `find` and `aggregate` calls so far.
    pub fn executions(&self) -> usize {
        self.executions.load(Ordering::SeqCst)
    }

    /// `count` calls so far, including the executor's total-count side queries.
    pub fn counts(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }
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
        self.inner.health_check().await
    }

    async fn shutdown(&self) -> Result<(), CoreBrainError> {
        self.inner.shutdown().await
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    async fn list_collections(&self) -> Result<Vec<String>, CoreBrainError> {
        self.inner.list_collections().await
    }

    async fn scan(&self, collection: &str) -> Result<Vec<Document>, CoreBrainError> {
        self.inner.scan(collection).await
    }

    async fn document_count(&self, collection: &str) -> Result<u64, CoreBrainError> {
        self.inner.document_count(collection).await
    }

    async fn sample(&self, collection: &str, n: usize) -> Result<Vec<Document>, CoreBrainError> {
        self.inner.sample(collection, n).await
    }

    async fn find(&self, request: FindRequest<'_>) -> Result<Vec<Document>, CoreBrainError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.inner.find(request).await
    }

    async fn count(&self, collection: &str, filter: &FilterExpr) -> Result<u64, CoreBrainError> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        self.inner.count(collection, filter).await
    }

    async fn aggregate(
        &self,
        collection: &str,
        stages: &[Stage],
    ) -> Result<Vec<Document>, CoreBrainError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        self.inner.aggregate(collection, stages).await
    }
}
