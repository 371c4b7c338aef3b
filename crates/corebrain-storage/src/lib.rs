// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for CoreBrain.
//!
//! One database file holds conversations, messages, the cost ledger, and
//! the optional SQLite document backend. Every write goes through the
//! single tokio-rusqlite background thread owned by [`Database`].

pub mod adapter;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteConversationStore;
pub use database::{Database, map_tr_err};
pub use memory::MemoryConversationStore;
