// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for CoreBrain.
//!
//! Foundational trait definitions, the error taxonomy, and common types used
//! throughout the workspace. Every adapter implements traits defined here.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{BoxError, CoreBrainError, StatusClass};
pub use types::{
    AdapterType, Conversation, ConversationId, Document, HealthStatus, Message, MessageRole,
    PermissionContext, PermissionLevel, ProviderMessage, ProviderRequest, ProviderResponse,
    TokenUsage, now_timestamp,
};

pub use traits::{AdapterHealth, ConversationStore, PluginAdapter, ProviderAdapter, check_adapter};
