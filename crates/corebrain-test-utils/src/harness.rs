// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end integration testing.
//!
//! `TestHarness` assembles the complete pipeline with a mock provider, the
//! seeded in-memory document store wrapped in a [`CountingStore`], and a
//! temp SQLite database for conversations and the cost ledger.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use corebrain_config::model::{CoreBrainConfig, StorageConfig};
use corebrain_core::{ConversationStore, CoreBrainError, PermissionContext, PermissionLevel};
use corebrain_cost::CostLedger;
use corebrain_pipeline::{Outcome, QueryRequest, Services};
use corebrain_storage::{Database, SqliteConversationStore};
use corebrain_store::MemoryDocumentStore;

use crate::fixtures::{self, CountingStore};
use crate::mock_provider::MockProvider;

/// Builder for creating test environments with configurable options.
pub struct TestHarnessBuilder {
    script: Vec<Result<String, CoreBrainError>>,
    delays: Vec<Duration>,
    seed: Option<Value>,
    config: CoreBrainConfig,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            script: Vec::new(),
            delays: Vec::new(),
            seed: None,
            config: CoreBrainConfig::default(),
        }
    }

    /// Set mock provider replies.
    pub fn with_mock_responses(mut self, responses: Vec<String>) -> Self {
        self.script = responses.into_iter().map(Ok).collect();
        self
    }

    /// Set mock provider replies and failures.
    pub fn with_script(mut self, script: Vec<Result<String, CoreBrainError>>) -> Self {
        self.script = script;
        self
    }

    /// Delay the n-th provider call by the n-th duration.
    pub fn with_provider_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = delays;
        self
    }

    /// Replace the seeded documents.
    pub fn with_seed(mut self, seed: Value) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Adjust the configuration before the services are built.
    pub fn with_config(mut self, edit: impl FnOnce(&mut CoreBrainConfig)) -> Self {
        edit(&mut self.config);
        self
    }

    /// Build the test harness, creating all required subsystems.
    pub async fn build(self) -> Result<TestHarness, CoreBrainError> {
        let temp_dir =
            tempfile::TempDir::new().map_err(|e| CoreBrainError::Storage { source: e.into() })?;
        let db_path = temp_dir.path().join("test.db").to_string_lossy().to_string();

        let mut config = self.config;
        config.storage = StorageConfig {
            database_path: db_path.clone(),
            wal_mode: true,
        };

        let db = Database::open(&db_path).await?;
        let conversations: Arc<dyn ConversationStore> = Arc::new(
            SqliteConversationStore::with_database(config.storage.clone(), db.clone()),
        );
        let ledger = Arc::new(CostLedger::new(db));

        let documents = match &self.seed {
            Some(seed) => MemoryDocumentStore::from_value(seed)?,
            None => fixtures::seeded_store()?,
        };
        let store = Arc::new(CountingStore::new(Arc::new(documents)));
        let provider = Arc::new(MockProvider::scripted(self.script).with_delays(self.delays));

        let services = Arc::new(Services::assemble(
            &config,
            provider.clone(),
            store.clone(),
            conversations,
            Some(ledger),
        ));

        Ok(TestHarness {
            services,
            provider,
            store,
            config,
            _temp_dir: temp_dir,
        })
    }
}

/// A fully wired pipeline for tests.
pub struct TestHarness {
    pub services: Arc<Services>,
    pub provider: Arc<MockProvider>,
    pub store: Arc<CountingStore>,
    pub config: CoreBrainConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// The permission context of a caller at `level` with default access.
    pub fn context(&self, level: PermissionLevel) -> PermissionContext {
        self.config
            .access
            .context_for(format!("test-{level}"), level, None)
    }

    /// Run one request through the orchestrator.
    pub async fn query(
        &self,
        request: QueryRequest,
        level: PermissionLevel,
    ) -> Result<Outcome, CoreBrainError> {
        self.services
            .orchestrator
            .run(request, self.context(level))
            .await
    }
}
