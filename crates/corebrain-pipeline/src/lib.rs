// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The CoreBrain query pipeline.
//!
//! [`Orchestrator`] turns one natural-language question into an answer by
//! way of the AI gateway, the sanitizer, the executor, and the result
//! formatter. [`ChatService`] layers conversations on top, and
//! [`Services`] builds the whole graph from configuration.

pub mod chat;
pub mod formatter;
pub mod gateway;
pub mod orchestrator;
pub mod response;
pub mod services;

pub use chat::{ChatService, ConversationLocks, ConversationThread};
pub use formatter::{FormattedResult, ResultFormatter, redact_documents};
pub use gateway::AiGateway;
pub use orchestrator::{FailureKind, Orchestrator, Outcome, QueryRequest, Spend, State};
pub use response::{QueryResponse, QueryResult, ResponseMetadata, ResultMetadata};
pub use services::{Services, open_document_store};
