// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process conversation store for tests and ephemeral deployments.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use corebrain_core::{
    AdapterType, Conversation, ConversationStore, CoreBrainError, HealthStatus, Message,
    PluginAdapter,
};

#[derive(Default)]
struct State {
    conversations: HashMap<String, Conversation>,
    messages: HashMap<String, Vec<Message>>,
}

/// Conversation store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryConversationStore {
    state: RwLock<State>,
}

impl MemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PluginAdapter for MemoryConversationStore {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::ConversationStore
    }

    async fn health_check(&self) -> Result<HealthStatus, CoreBrainError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CoreBrainError> {
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for MemoryConversationStore {
    async fn create_conversation(
        &self,
        conversation: &Conversation,
    ) -> Result<(), CoreBrainError> {
        let mut state = self.state.write().await;
        if state.conversations.contains_key(&conversation.id) {
            return Err(CoreBrainError::BadRequest(format!(
                "conversation {} already exists",
                conversation.id
            )));
        }
        state
            .conversations
            .insert(conversation.id.clone(), conversation.clone());
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> Result<Option<Conversation>, CoreBrainError> {
        Ok(self.state.read().await.conversations.get(id).cloned())
    }

    async fn list_conversations(
        &self,
        owner_id: &str,
    ) -> Result<Vec<Conversation>, CoreBrainError> {
        let state = self.state.read().await;
        let mut owned: Vec<Conversation> = state
            .conversations
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
        Ok(owned)
    }

    async fn update_conversation_metadata(
        &self,
        id: &str,
        metadata: &serde_json::Value,
        updated_at: &str,
    ) -> Result<(), CoreBrainError> {
        let mut state = self.state.write().await;
        let conversation = state
            .conversations
            .get_mut(id)
            .ok_or_else(|| CoreBrainError::NotFound(format!("conversation {id}")))?;
        conversation.metadata = metadata.clone();
        conversation.updated_at = updated_at.to_string();
        Ok(())
    }

    async fn append_message(&self, message: &Message) -> Result<(), CoreBrainError> {
        let mut state = self.state.write().await;
        if !state.conversations.contains_key(&message.conversation_id) {
            return Err(CoreBrainError::NotFound(format!(
                "conversation {}",
                message.conversation_id
            )));
        }
        state
            .messages
            .entry(message.conversation_id.clone())
            .or_default()
            .push(message.clone());
        Ok(())
    }

    async fn recent_messages(
        &self,
        conversation_id: &str,
        limit: usize,
    ) -> Result<Vec<Message>, CoreBrainError> {
        let state = self.state.read().await;
        let all = state
            .messages
            .get(conversation_id)
            .map(Vec::as_slice)
            .unwrap_or_default();
        Ok(all[all.len().saturating_sub(limit)..].to_vec())
    }

    async fn messages(&self, conversation_id: &str) -> Result<Vec<Message>, CoreBrainError> {
        Ok(self
            .state
            .read()
            .await
            .messages
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corebrain_core::MessageRole;

    fn conversation(id: &str) -> Conversation {
        Conversation {
            id: id.into(),
            owner_id: "alice".into(),
            title: "t".into(),
            metadata: serde_json::json!({}),
            created_at: "2026-01-01T00:00:00.000Z".into(),
            updated_at: "2026-01-01T00:00:00.000Z".into(),
        }
    }

    #[tokio::test]
    async fn recent_messages_are_the_tail() {
        let store = MemoryConversationStore::new();
        store.create_conversation(&conversation("c1")).await.unwrap();
        for i in 0..4 {
            store
                .append_message(&Message {
                    id: format!("m{i}"),
                    conversation_id: "c1".into(),
                    role: MessageRole::User,
                    content: format!("{i}"),
                    metadata: None,
                    created_at: "2026-01-01T00:00:00.000Z".into(),
                })
                .await
                .unwrap();
        }
        let tail: Vec<_> = store
            .recent_messages("c1", 3)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(tail, vec!["m1", "m2", "m3"]);
        assert_eq!(store.recent_messages("c1", 10).await.unwrap().len(), 4);
        assert!(store.recent_messages("none", 3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicate_and_orphan_writes_fail() {
        let store = MemoryConversationStore::new();
        store.create_conversation(&conversation("c1")).await.unwrap();
        assert!(store.create_conversation(&conversation("c1")).await.is_err());

        let orphan = Message {
            id: "m".into(),
            conversation_id: "ghost".into(),
            role: MessageRole::User,
            content: "hi".into(),
            metadata: None,
            created_at: "2026-01-01T00:00:00.000Z".into(),
        };
        assert!(matches!(
            store.append_message(&orphan).await,
            Err(CoreBrainError::NotFound(_))
        ));
    }
}
