// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The document store seam.

use async_trait::async_trait;
use corebrain_core::{CoreBrainError, Document, PluginAdapter};
use corebrain_query::{FilterExpr, Projection, SortKey, Stage};

use crate::aggregate::run_pipeline;
use crate::matcher::matches;
use crate::transform::{project, sort_documents};

/// Parameters of a `find`.
#[derive(Debug, Clone, Copy)]
pub struct FindRequest<'a> {
    pub collection: &'a str,
    pub filter: &'a FilterExpr,
    pub sort: &'a [SortKey],
    pub projection: Option<&'a Projection>,
    pub skip: u64,
    pub limit: Option<u64>,
}

/// A read-only document database.
///
/// Backends only have to enumerate collections and scan documents; the
/// query methods default to in-process evaluation and may be overridden
/// by backends that can push work down.
#[async_trait]
pub trait DocumentStore: PluginAdapter {
    async fn list_collections(&self) -> Result<Vec<String>, CoreBrainError>;

    /// Every document of `collection` in natural order. Unknown collections
    /// are empty.
    async fn scan(&self, collection: &str) -> Result<Vec<Document>, CoreBrainError>;

    async fn document_count(&self, collection: &str) -> Result<u64, CoreBrainError> {
        Ok(self.scan(collection).await?.len() as u64)
    }

    /// Up to `n` documents used for schema inference.
    async fn sample(&self, collection: &str, n: usize) -> Result<Vec<Document>, CoreBrainError> {
        let mut docs = self.scan(collection).await?;
        docs.truncate(n);
        Ok(docs)
    }

    async fn find(&self, request: FindRequest<'_>) -> Result<Vec<Document>, CoreBrainError> {
        let mut docs: Vec<Document> = self
            .scan(request.collection)
            .await?
            .into_iter()
            .filter(|d| matches(request.filter, d))
            .collect();
        sort_documents(&mut docs, request.sort);
        let skip = usize::try_from(request.skip).unwrap_or(usize::MAX);
        let limit = request
            .limit
            .map_or(usize::MAX, |n| usize::try_from(n).unwrap_or(usize::MAX));
        Ok(docs
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|d| match request.projection {
                Some(p) => project(&d, p),
                None => d,
            })
            .collect())
    }

    async fn count(&self, collection: &str, filter: &FilterExpr) -> Result<u64, CoreBrainError> {
        if filter.is_match_all() {
            return self.document_count(collection).await;
        }
        let docs = self.scan(collection).await?;
        Ok(docs.iter().filter(|d| matches(filter, d)).count() as u64)
    }

    async fn aggregate(
        &self,
        collection: &str,
        stages: &[Stage],
    ) -> Result<Vec<Document>, CoreBrainError> {
        let docs = self.scan(collection).await?;
        Ok(run_pipeline(docs, stages))
    }
}
