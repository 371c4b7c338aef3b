// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intent routing for the CoreBrain pipeline.
//!
//! This crate provides:
//! - [`Vocabulary`]: collection and field terms taken from the schema catalog
//! - [`IntentClassifier`]: the pluggable policy deciding whether a message
//!   needs data access
//! - [`KeywordIntentClassifier`]: the default zero-latency heuristic

pub mod classifier;
pub mod vocabulary;

pub use classifier::{Intent, IntentClassifier, IntentDecision, KeywordIntentClassifier};
pub use vocabulary::Vocabulary;
