// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the ConversationStore trait.

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use corebrain_config::model::StorageConfig;
use corebrain_core::{
    AdapterType, Conversation, ConversationStore, CoreBrainError, HealthStatus, Message,
    PluginAdapter,
};

use crate::database::{Database, map_tr_err};
use crate::queries;

/// SQLite-backed conversation store.
///
/// The database is opened lazily by [`SqliteConversationStore::initialize`],
/// or supplied up front with [`SqliteConversationStore::with_database`].
pub struct SqliteConversationStore {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteConversationStore {
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Wrap an already-open database.
    pub fn with_database(config: StorageConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(db)),
        }
    }

    pub async fn initialize(&self) -> Result<(), CoreBrainError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| CoreBrainError::Storage {
            source: "conversation store already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite conversation store initialized");
        Ok(())
    }

    /// The underlying database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, CoreBrainError> {
        self.db.get().ok_or_else(|| CoreBrainError::Storage {
            source: "conversation store not initialized -- call initialize() first".into(),
        })
    }
}

#[async_trait]
impl PluginAdapter for SqliteConversationStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConversationStore
    }

    async fn health_check(&self) -> Result<HealthStatus, CoreBrainError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CoreBrainError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), CoreBrainError> {
        queries::conversations::create_conversation(self.database()?, conversation).await
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, CoreBrainError> {
        queries::conversations::get_conversation(self.database()?, id).await
    }

    async fn list_conversations(
        &self,
        owner_id: &str,
    ) -> Result<Vec<Conversation>, CoreBrainError> {
        queries::conversations::list_conversations(self.database()?, owner_id).await
    }

    async fn update_conversation_metadata(
        &self,
        id: &str,
        metadata: &serde_json::Value,
        updated_at: &str,
    ) -> Result<(), CoreBrainError> {
        queries::conversations::update_metadata(self.database()?, id, metadata, updated_at).await
    }

    async fn append_message(&self, message: &Message) -> Result<(), CoreBrainError> {
        queries::messages::insert_message(self.database()?, message).await
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, CoreBrainError> {
        queries::messages::get_recent_messages(self.database()?, conversation_id, limit).await
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, CoreBrainError> {
        queries::messages::get_messages(self.database()?, conversation_id).await
    }
}
