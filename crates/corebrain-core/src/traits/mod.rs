// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Backend seams. Each is object-safe through `#[async_trait]` so the
//! pipeline holds them as `Arc<dyn ...>`.

pub mod adapter;
pub mod conversation;
pub mod provider;

pub use adapter::{AdapterHealth, PluginAdapter, check_adapter};
pub use conversation::ConversationStore;
pub use provider::ProviderAdapter;
