// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot CLI commands: `query`, `schema`, and `import`.

use std::path::Path;
use std::time::Duration;

use corebrain_config::CoreBrainConfig;
use corebrain_config::model::StoreBackend;
use corebrain_core::{CoreBrainError, Document, PermissionContext, PermissionLevel, PluginAdapter};
use corebrain_pipeline::{QueryRequest, open_document_store};
use corebrain_resilience::ConcurrencyLimiter;
use corebrain_store::{SchemaCatalog, SqliteDocumentStore};
use serde_json::Value;
use tracing::{info, warn};

use crate::serve::build_services;
use crate::shutdown;

const CLI_CALLER: &str = "cli";

fn cli_context(config: &CoreBrainConfig, level: PermissionLevel) -> PermissionContext {
    config.access.context_for(CLI_CALLER, level, None)
}

/// Run one question through the pipeline and print the response JSON.
pub async fn run_query(
    config: &CoreBrainConfig,
    text: String,
    collection: Option<String>,
    limit: Option<i64>,
    level: PermissionLevel,
) -> Result<(), CoreBrainError> {
    let services = build_services(config).await?;

    let mut request = QueryRequest::direct(text);
    if let Some(collection) = collection {
        request = request.with_collection(collection);
    }
    if let Some(limit) = limit {
        request = request.with_limit(limit);
    }

    let result = services
        .orchestrator
        .run(request, cli_context(config, level))
        .await;
    shutdown::close_within(services.shutdown(), shutdown::CLOSE_GRACE).await;
    let outcome = result?;

    info!(
        cost_usd = outcome.cost_usd,
        tokens = outcome.usage.total(),
        "query answered"
    );
    print_json(&outcome.response)
}

/// Print the schema visible at `level`.
pub async fn run_schema(config: &CoreBrainConfig, level: PermissionLevel) -> Result<(), CoreBrainError> {
    let documents = open_document_store(config).await?;
    let catalog = SchemaCatalog::new(
        documents.clone(),
        ConcurrencyLimiter::new("store", config.concurrency.store_permits),
        Duration::from_secs(config.schema.ttl_secs),
        config.schema.sample_size,
        config.schema.example_max_chars,
    );
    let schema = catalog.describe(&cli_context(config, level)).await?;
    documents.shutdown().await?;
    print_json(&schema)
}

/// Load a JSON array of documents into the SQLite document store.
pub async fn run_import(config: &CoreBrainConfig, collection: &str, file: &Path) -> Result<(), CoreBrainError> {
    if collection.trim().is_empty() {
        return Err(CoreBrainError::BadRequest("collection name is empty".into()));
    }
    if config.store.backend != StoreBackend::Sqlite {
        warn!(
            path = %config.store.database_path,
            "store backend is not sqlite, importing into the sqlite database anyway"
        );
    }

    let content = std::fs::read_to_string(file).map_err(|e| {
        CoreBrainError::BadRequest(format!("cannot read {}: {e}", file.display()))
    })?;
    let docs = parse_documents(&content)?;

    let store = SqliteDocumentStore::open(&config.store.database_path).await?;
    let written = store.import_collection(collection, docs).await?;
    info!(collection, written, "import finished");
    println!("imported {written} documents into {collection}");
    Ok(())
}

/// A JSON array of objects, or a single object.
pub fn parse_documents(content: &str) -> Result<Vec<Document>, CoreBrainError> {
    let value: Value = serde_json::from_str(content)
        .map_err(|e| CoreBrainError::BadRequest(format!("invalid JSON: {e}")))?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => return Ok(vec![map]),
        _ => {
            return Err(CoreBrainError::BadRequest(
                "expected a JSON array of documents".into(),
            ));
        }
    };
    items
        .into_iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(map),
            _ => Err(CoreBrainError::BadRequest(format!(
                "element {i} is not a JSON object"
            ))),
        })
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), CoreBrainError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| CoreBrainError::Internal(format!("failed to render JSON: {e}")))?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arrays_of_objects_parse() {
        let docs = parse_documents(r#"[{"_id": "a", "n": 1}, {"n": 2}]"#).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0]["_id"], "a");
    }

    #[test]
    fn a_single_object_is_one_document() {
        let docs = parse_documents(r#"{"name": "solo"}"#).unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[test]
    fn non_objects_are_rejected() {
        let err = parse_documents(r#"[{"a": 1}, 2]"#).unwrap_err();
        assert!(err.to_string().contains("element 1"));
        assert!(parse_documents("42").is_err());
        assert!(parse_documents("not json").is_err());
    }

    #[tokio::test]
    async fn import_writes_into_the_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("products.json");
        std::fs::write(&file, r#"[{"_id": "p1", "name": "Lamp"}, {"_id": "p2", "name": "Desk"}]"#)
            .unwrap();

        let mut config = CoreBrainConfig::default();
        config.store.backend = StoreBackend::Sqlite;
        config.store.database_path = dir.path().join("docs.db").to_string_lossy().to_string();

        run_import(&config, "products", &file).await.unwrap();
        run_import(&config, "products", &file).await.unwrap();

        let store = SqliteDocumentStore::open(&config.store.database_path).await.unwrap();
        let count = corebrain_store::DocumentStore::document_count(&store, "products")
            .await
            .unwrap();
        assert_eq!(count, 2);
    }
}
