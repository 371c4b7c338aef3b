// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversations on top of the orchestrator.
//!
//! Work on one conversation is serialized by a per-conversation lock:
//! loading history, appending the user message, running the pipeline,
//! appending the answer, and updating the running totals all happen under
//! it. Different conversations never contend.

use std::sync::Arc;

use corebrain_core::{
    Conversation, ConversationStore, CoreBrainError, Message, MessageRole, PermissionContext,
    PermissionLevel, now_timestamp,
};
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use crate::orchestrator::{Orchestrator, Outcome, QueryRequest, Spend};

const DEFAULT_TITLE: &str = "New conversation";

/// One mutex per conversation with work in progress.
///
/// An entry lives only while some task holds or waits on it.
#[derive(Default)]
pub struct ConversationLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ConversationLocks {
    pub async fn lock(&self, conversation_id: &str) -> ConversationGuard<'_> {
        let lock = self
            .locks
            .entry(conversation_id.to_string())
            .or_default()
            .clone();
        let guard = lock.lock_owned().await;
        ConversationGuard {
            locks: self,
            conversation_id: conversation_id.to_string(),
            guard: Some(guard),
        }
    }

    /// Conversations currently holding an entry.
    pub fn tracked(&self) -> usize {
        self.locks.len()
    }
}

/// Held for the duration of one conversation's critical section.
pub struct ConversationGuard<'a> {
    locks: &'a ConversationLocks,
    conversation_id: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ConversationGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        // Only the map's own handle left: nobody holds or waits on the lock.
        self.locks
            .locks
            .remove_if(&self.conversation_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

/// A conversation with its messages, oldest first.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationThread {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

pub struct ChatService {
    conversations: Arc<dyn ConversationStore>,
    orchestrator: Arc<Orchestrator>,
    locks: ConversationLocks,
    history_window: usize,
}

impl ChatService {
    pub fn new(
        conversations: Arc<dyn ConversationStore>,
        orchestrator: Arc<Orchestrator>,
        history_window: usize,
    ) -> Self {
        Self {
            conversations,
            orchestrator,
            locks: ConversationLocks::default(),
            history_window,
        }
    }

    pub fn store(&self) -> &Arc<dyn ConversationStore> {
        &self.conversations
    }

    pub fn locks(&self) -> &ConversationLocks {
        &self.locks
    }

    pub async fn create_conversation(
        &self,
        ctx: &PermissionContext,
        title: Option<String>,
        metadata: Option<Value>,
    ) -> Result<Conversation, CoreBrainError> {
        let mut meta = match metadata {
            Some(Value::Object(map)) => map,
            Some(Value::Null) | None => Map::new(),
            Some(_) => {
                return Err(CoreBrainError::BadRequest(
                    "conversation metadata must be an object".into(),
                ));
            }
        };
        apply_totals(&mut meta, &Totals::default());

        let now = now_timestamp();
        let conversation = Conversation {
            id: uuid::Uuid::new_v4().to_string(),
            owner_id: ctx.caller_id.clone(),
            title: title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TITLE.to_string()),
            metadata: Value::Object(meta),
            created_at: now.clone(),
            updated_at: now,
        };
        self.conversations.create_conversation(&conversation).await?;
        info!(conversation_id = %conversation.id, owner = %conversation.owner_id, "conversation created");
        Ok(conversation)
    }

    pub async fn list_conversations(
        &self,
        ctx: &PermissionContext,
    ) -> Result<Vec<Conversation>, CoreBrainError> {
        self.conversations.list_conversations(&ctx.caller_id).await
    }

    pub async fn get_conversation(
        &self,
        ctx: &PermissionContext,
        id: &str,
    ) -> Result<ConversationThread, CoreBrainError> {
        let conversation = self.owned(ctx, id).await?;
        let messages = self.conversations.messages(id).await?;
        Ok(ConversationThread {
            conversation,
            messages,
        })
    }

    /// Append a user message, answer it, and return the assistant message.
    pub async fn send_message(
        &self,
        ctx: &PermissionContext,
        conversation_id: &str,
        content: String,
        metadata: Option<Value>,
    ) -> Result<Message, CoreBrainError> {
        if content.trim().is_empty() {
            return Err(CoreBrainError::BadRequest("message content is empty".into()));
        }
        let _guard = self.locks.lock(conversation_id).await;
        let conversation = self.owned(ctx, conversation_id).await?;

        let history = self
            .conversations
            .recent_messages(conversation_id, self.history_window)
            .await?;
        let user = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: MessageRole::User,
            content: content.clone(),
            metadata,
            created_at: now_timestamp(),
        };
        self.conversations.append_message(&user).await?;

        let request = QueryRequest::new(content).in_conversation(conversation_id, history);
        let outcome = match self.orchestrator.run_with_spend(request, ctx.clone()).await {
            Ok(outcome) => outcome,
            Err((error, spend)) => {
                if spend.calls > 0 {
                    let now = now_timestamp();
                    self.add_to_totals(conversation.metadata, conversation_id, &spend, &now)
                        .await?;
                }
                return Err(error);
            }
        };

        let assistant = Message {
            id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.to_string(),
            role: MessageRole::Assistant,
            content: outcome.response.explanation.clone(),
            metadata: Some(message_metadata(&outcome)),
            created_at: now_timestamp(),
        };
        self.conversations.append_message(&assistant).await?;

        self.add_to_totals(
            conversation.metadata,
            conversation_id,
            &outcome.spend(),
            &assistant.created_at,
        )
        .await?;

        debug!(
            conversation_id,
            query_executed = outcome.query_executed,
            cost_usd = outcome.cost_usd,
            "message answered"
        );
        Ok(assistant)
    }

    async fn add_to_totals(
        &self,
        metadata: Value,
        conversation_id: &str,
        spend: &Spend,
        updated_at: &str,
    ) -> Result<(), CoreBrainError> {
        let mut meta = match metadata {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        let mut totals = Totals::read(&meta);
        totals.add(spend);
        apply_totals(&mut meta, &totals);
        self.conversations
            .update_conversation_metadata(conversation_id, &Value::Object(meta), updated_at)
            .await
    }

    /// The conversation, if it exists and `ctx` may see it. Admins see all.
    async fn owned(&self, ctx: &PermissionContext, id: &str) -> Result<Conversation, CoreBrainError> {
        match self.conversations.get_conversation(id).await? {
            Some(c) if c.owner_id == ctx.caller_id || ctx.level == PermissionLevel::Admin => Ok(c),
            _ => Err(CoreBrainError::NotFound(format!("conversation {id}"))),
        }
    }
}

fn message_metadata(outcome: &Outcome) -> Value {
    let mut meta = json!({
        "tokens": {
            "input": outcome.usage.input_tokens,
            "output": outcome.usage.output_tokens,
            "total": outcome.usage.total(),
        },
        "cost_usd": outcome.cost_usd,
        "query_executed": outcome.query_executed,
        "cache_hit": outcome.cache_hit,
        "model": outcome.response.metadata.model,
    });
    if let Some(collection) = &outcome.collection {
        meta["collection"] = json!(collection);
    }
    meta
}

/// Running totals kept in the conversation metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Totals {
    input: u64,
    output: u64,
    cost: f64,
    api_calls: u64,
}

impl Totals {
    fn read(meta: &Map<String, Value>) -> Self {
        let tokens = meta.get("tokens");
        let field = |name: &str| {
            tokens
                .and_then(|t| t.get(name))
                .and_then(Value::as_u64)
                .unwrap_or(0)
        };
        Self {
            input: field("input"),
            output: field("output"),
            cost: meta.get("cost").and_then(Value::as_f64).unwrap_or(0.0),
            api_calls: meta.get("api_calls").and_then(Value::as_u64).unwrap_or(0),
        }
    }

    fn add(&mut self, spend: &Spend) {
        self.input += u64::from(spend.usage.input_tokens);
        self.output += u64::from(spend.usage.output_tokens);
        self.cost += spend.cost_usd;
        self.api_calls += u64::from(spend.calls);
    }
}

fn apply_totals(meta: &mut Map<String, Value>, totals: &Totals) {
    meta.insert(
        "tokens".into(),
        json!({
            "input": totals.input,
            "output": totals.output,
            "total": totals.input + totals.output,
        }),
    );
    meta.insert("cost".into(), json!(totals.cost));
    meta.insert("api_calls".into(), json!(totals.api_calls));
}
