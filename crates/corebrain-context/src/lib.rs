// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prompt and context assembly for the CoreBrain pipeline.
//!
//! Builds the two provider requests of a data-grounded answer:
//! - **Elicitation**: schema excerpt, trimmed history, and the question
//! - **Synthesis**: trimmed history plus formatted results or a fallback note
//!
//! History trimming and token estimation are pluggable policies.

pub mod assembler;
pub mod estimate;
pub mod history;
pub mod schema_context;

pub use assembler::{DataContext, ElicitationInput, Grounding, PromptAssembler, SynthesisInput};
pub use estimate::{CharRatioEstimator, TokenEstimator};
pub use history::{HistoryTrimmer, NewestFirstTrimmer};
pub use schema_context::{SchemaExcerpt, render_schema};
