// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation persistence trait.

use async_trait::async_trait;

use crate::error::CoreBrainError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{Conversation, Message};

/// Durable store for conversations and their append-only message history.
///
/// Messages are returned in creation order and are never reordered or
/// modified once appended.
#[async_trait]
pub trait ConversationStore: PluginAdapter {
    async fn create_conversation(&self, conversation: &Conversation)
    -> Result<(), CoreBrainError>;

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, CoreBrainError>;

    /// Conversations owned by `owner_id`, most recently updated first.
    async fn list_conversations(&self, owner_id: &str)
    -> Result<Vec<Conversation>, CoreBrainError>;

    /// Replaces the conversation metadata and bumps `updated_at`.
    async fn update_conversation_metadata(
        &self,
        id: &str,
        metadata: &serde_json::Value,
        updated_at: &str,
    ) -> Result<(), CoreBrainError>;

    async fn append_message(&self, message: &Message) -> Result<(), CoreBrainError>;

    /// The trailing `limit` messages of a conversation, oldest first.
    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, CoreBrainError>;

    /// Every message of a conversation, oldest first.
    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, CoreBrainError>;
}
