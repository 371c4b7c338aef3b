// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide service construction.
//!
//! Everything is built once at startup and shared through `Arc`s; nothing
//! here is a global.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use corebrain_cache::ResponseCache;
use corebrain_config::model::{CoreBrainConfig, StoreBackend};
use corebrain_context::PromptAssembler;
use corebrain_core::{AdapterHealth, ConversationStore, CoreBrainError, ProviderAdapter, check_adapter};
use corebrain_cost::{CostAccountant, CostLedger, RateTable};
use corebrain_query::Validator;
use corebrain_resilience::LimiterPools;
use corebrain_storage::{Database, SqliteConversationStore};
use corebrain_store::{
    DocumentStore, MemoryDocumentStore, QueryExecutor, SchemaCatalog, SqliteDocumentStore,
};
use tracing::info;

use crate::chat::ChatService;
use crate::formatter::ResultFormatter;
use crate::gateway::AiGateway;
use crate::orchestrator::Orchestrator;

pub struct Services {
    pub orchestrator: Arc<Orchestrator>,
    pub chat: Arc<ChatService>,
    pub documents: Arc<dyn DocumentStore>,
    pub limiters: LimiterPools,
}

impl Services {
    /// Open the configured stores and wire the pipeline around `provider`.
    pub async fn from_config(
        config: &CoreBrainConfig,
        provider: Arc<dyn ProviderAdapter>,
    ) -> Result<Self, CoreBrainError> {
        let documents = open_document_store(config).await?;

        let db = Database::open_with(&config.storage.database_path, config.storage.wal_mode).await?;
        let conversations: Arc<dyn ConversationStore> = Arc::new(
            SqliteConversationStore::with_database(config.storage.clone(), db.clone()),
        );
        let ledger = Arc::new(CostLedger::new(db));

        info!(
            store = ?config.store.backend,
            storage = %config.storage.database_path,
            "services opened"
        );
        Ok(Self::assemble(config, provider, documents, conversations, Some(ledger)))
    }

    /// Wire the pipeline from already-open stores.
    pub fn assemble(
        config: &CoreBrainConfig,
        provider: Arc<dyn ProviderAdapter>,
        documents: Arc<dyn DocumentStore>,
        conversations: Arc<dyn ConversationStore>,
        ledger: Option<Arc<CostLedger>>,
    ) -> Self {
        let limiters = LimiterPools::new(
            config.concurrency.model_permits,
            config.concurrency.store_permits,
        );

        let catalog = Arc::new(SchemaCatalog::new(
            documents.clone(),
            limiters.store.clone(),
            Duration::from_secs(config.schema.ttl_secs),
            config.schema.sample_size,
            config.schema.example_max_chars,
        ));
        let executor = Arc::new(QueryExecutor::new(
            documents.clone(),
            limiters.store.clone(),
            Duration::from_millis(config.store.timeout_ms),
            Duration::from_millis(config.store.count_timeout_ms),
        ));
        let gateway = Arc::new(AiGateway::from_config(
            provider,
            limiters.model.clone(),
            &config.anthropic,
        ));
        let mut accountant = CostAccountant::new(RateTable::from_config(&config.pricing));
        if let Some(ledger) = ledger {
            accountant = accountant.with_ledger(ledger);
        }

        let orchestrator = Arc::new(
            Orchestrator::new(
                catalog,
                executor,
                PromptAssembler::new(&config.anthropic, &config.pipeline),
                gateway,
                Arc::new(ResponseCache::from_config(&config.cache)),
                Arc::new(accountant),
            )
            .with_validator(Validator::new(
                config.pipeline.default_limit,
                config.pipeline.max_limit,
            ))
            .with_formatter(ResultFormatter::new(config.pipeline.result_byte_budget))
            .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs)),
        );
        let chat = Arc::new(ChatService::new(
            conversations,
            orchestrator.clone(),
            config.pipeline.history_window,
        ));

        Self {
            orchestrator,
            chat,
            documents,
            limiters,
        }
    }

    /// Health of the provider and both stores.
    pub async fn adapter_health(&self) -> Vec<AdapterHealth> {
        vec![
            check_adapter(self.orchestrator.provider().as_ref()).await,
            check_adapter(self.documents.as_ref()).await,
            check_adapter(self.chat.store().as_ref()).await,
        ]
    }

    /// Flush the provider and stores, then close the limiter pools.
    pub async fn shutdown(&self) -> Result<(), CoreBrainError> {
        self.orchestrator.shutdown().await?;
        self.chat.store().shutdown().await?;
        self.limiters.model.close();
        self.limiters.store.close();
        Ok(())
    }
}

pub async fn open_document_store(
    config: &CoreBrainConfig,
) -> Result<Arc<dyn DocumentStore>, CoreBrainError> {
    Ok(match config.store.backend {
        StoreBackend::Memory => match &config.store.seed_file {
            Some(path) => Arc::new(MemoryDocumentStore::from_seed_file(Path::new(path))?),
            None => Arc::new(MemoryDocumentStore::new()),
        },
        StoreBackend::Sqlite => Arc::new(SqliteDocumentStore::open(&config.store.database_path).await?),
    })
}
