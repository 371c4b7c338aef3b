// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the adapter traits and pipeline stages.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};

/// A schema-less document as stored in a collection.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Allow-list entry granting access to every collection.
pub const ALL_COLLECTIONS: &str = "*";

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// Adapter is fully operational.
    Healthy,
    /// Adapter is operational but experiencing issues.
    Degraded(String),
    /// Adapter is not operational.
    Unhealthy(String),
}

/// Identifies the kind of adapter behind a trait object.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Provider,
    DocumentStore,
    ConversationStore,
}

/// Caller permission level. Levels are cumulative: `read < write < admin`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    Read,
    Write,
    Admin,
}

/// Resolved access scope of a caller, supplied by the authentication layer.
///
/// Built once per request and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionContext {
    /// Stable caller identity (API key name or user id).
    pub caller_id: String,
    pub level: PermissionLevel,
    /// Collections the caller may query. `"*"` grants all of them.
    pub allowed_collections: Vec<String>,
    /// Origin hosts the caller may call from. Empty means unrestricted.
    #[serde(default)]
    pub allowed_domains: Vec<String>,
    /// Field names (`field` or `collection.field`) invisible to this caller.
    #[serde(default)]
    pub hidden_fields: Vec<String>,
}

impl PermissionContext {
    pub fn new(
        caller_id: impl Into<String>,
        level: PermissionLevel,
        allowed_collections: Vec<String>,
    ) -> Self {
        Self {
            caller_id: caller_id.into(),
            level,
            allowed_collections,
            allowed_domains: Vec::new(),
            hidden_fields: Vec::new(),
        }
    }

    pub fn with_domains(mut self, domains: Vec<String>) -> Self {
        self.allowed_domains = domains;
        self
    }

    pub fn with_hidden_fields(mut self, fields: Vec<String>) -> Self {
        self.hidden_fields = fields;
        self
    }

    pub fn allows_all_collections(&self) -> bool {
        self.allowed_collections.iter().any(|c| c == ALL_COLLECTIONS)
    }

    pub fn can_access(&self, collection: &str) -> bool {
        self.allows_all_collections() || self.allowed_collections.iter().any(|c| c == collection)
    }

    /// Whether `path` (possibly dotted) in `collection` is visible to the caller.
    ///
    /// Hidden entries are `field` (any collection) or `collection:field`.
    /// A hidden field hides every path nested below it.
    pub fn field_visible(&self, collection: &str, path: &str) -> bool {
        !self.hidden_fields.iter().any(|hidden| {
            let field = match hidden.split_once(':') {
                Some((coll, field)) if coll == collection => field,
                Some(_) => return false,
                None => hidden.as_str(),
            };
            path == field
                || path
                    .strip_prefix(field)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    /// Whether a request from `host` is allowed. Entries starting with `.`
    /// match the bare domain and any subdomain.
    pub fn domain_allowed(&self, host: &str) -> bool {
        if self.allowed_domains.is_empty() {
            return true;
        }
        let host = host.to_ascii_lowercase();
        self.allowed_domains.iter().any(|entry| {
            let entry = entry.to_ascii_lowercase();
            match entry.strip_prefix('.') {
                Some(base) => host == base || host.ends_with(&entry),
                None => host == entry,
            }
        })
    }

    /// Deterministic identifier of the access scope, independent of caller identity.
    ///
    /// Two callers with the same level, collections, domains and hidden fields
    /// share cached answers.
    pub fn scope_id(&self) -> String {
        let mut collections = self.allowed_collections.clone();
        collections.sort();
        collections.dedup();
        let mut domains = self.allowed_domains.clone();
        domains.sort();
        let mut hidden = self.hidden_fields.clone();
        hidden.sort();

        let mut hasher = Sha256::new();
        hasher.update(self.level.to_string().as_bytes());
        hasher.update(b"\x1f");
        hasher.update(collections.join(",").as_bytes());
        hasher.update(b"\x1f");
        hasher.update(domains.join(",").as_bytes());
        hasher.update(b"\x1f");
        hasher.update(hidden.join(",").as_bytes());
        hex::encode(&hasher.finalize()[..16])
    }
}

/// Token counts reported by the model provider for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }

    pub fn add(&mut self, other: &TokenUsage) {
        self.input_tokens = self.input_tokens.saturating_add(other.input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(other.output_tokens);
    }
}

/// Author of a conversation message.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// A conversation record owned by the conversation store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    /// Free-form metadata; the chat service keeps running token/cost totals here.
    pub metadata: serde_json::Value,
    pub created_at: String,
    pub updated_at: String,
}

/// A single message. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub conversation_id: String,
    pub role: MessageRole,
    pub content: String,
    pub metadata: Option<serde_json::Value>,
    pub created_at: String,
}

/// One turn in a provider request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMessage {
    pub role: String,
    pub content: String,
}

impl ProviderMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".into(),
            content: content.into(),
        }
    }
}

/// Provider-agnostic completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderRequest {
    pub model: String,
    pub system: Option<String>,
    pub messages: Vec<ProviderMessage>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

/// Provider-agnostic completion response.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderResponse {
    pub id: String,
    pub content: String,
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: TokenUsage,
}

/// Current UTC time in the ISO 8601 millisecond format used by every record.
pub fn now_timestamp() -> String {
    chrono::Utc::now()
        .format("%Y-%m-%dT%H:%M:%S%.3fZ")
        .to_string()
}
