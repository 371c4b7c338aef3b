// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The two prompts issued per request.
//!
//! - **Elicitation** asks the model for one JSON query grounded in the schema.
//! - **Synthesis** asks for the final answer, grounded in formatted query
//!   results, in a note that no query could run, or in the conversation alone.

use std::sync::Arc;

use corebrain_config::model::{AnthropicConfig, PipelineConfig};
use corebrain_core::{Message, ProviderRequest};
use corebrain_query::SchemaDescriptor;
use serde_json::{Value, json};
use tracing::debug;

use crate::estimate::{CharRatioEstimator, TokenEstimator};
use crate::history::{HistoryTrimmer, NewestFirstTrimmer, push_user_turn};
use crate::schema_context::render_schema;

const ELICITATION_PROMPT: &str = "You translate natural-language questions into read-only document database queries.

DATABASE STRUCTURE:
{schema}

Your task:
1. Analyse the user's question.
2. Decide which collection must be queried.{hint}
3. Build the query: `find`, `count`, or `aggregate`.
4. Reply with the query as a single JSON object in this shape:

For lookups:
{\"collection\": \"name\", \"operation\": \"find\", \"query\": {}, \"projection\": {}, \"sort\": {}, \"limit\": 10}

For counts:
{\"collection\": \"name\", \"operation\": \"count\", \"query\": {}}

For aggregations:
{\"collection\": \"name\", \"operation\": \"aggregate\", \"pipeline\": [{\"$match\": {}}, {\"$group\": {}}]}

Only use fields listed in the structure above. Never write, update, or delete data.
If the question cannot be answered with a query, reply with `ERROR:` and a short reason.
Reply ONLY with the JSON object, no other text.";

const DATA_PROMPT: &str = "You explain the results of database queries.
Explain the results clearly and concisely, highlighting what matters most.

Guidelines:
1. Say how many results were found.
2. Summarise the main findings, naming the items shown.
3. If there are few or no results, suggest possible reasons.
4. Avoid unnecessary jargon and be brief.
5. Point out interesting statistics or patterns.
6. If an aggregation ran, explain what the result means.
Only use the data provided. Never invent records or values.";

const NO_QUERY_PROMPT: &str = "You are a data assistant. A database query could not be run for the user's latest message.
Tell the user plainly that the question could not be turned into a data query, and suggest how to rephrase it.
Do not present any records, counts, or values as if they came from the database.";

const CONVERSATION_PROMPT: &str = "You are a helpful data assistant with access to a document database.
The latest message does not need data access. Answer from the conversation so far, concisely.";

/// Inputs for the elicitation prompt.
#[derive(Debug, Clone, Copy)]
pub struct ElicitationInput<'a> {
    pub message: &'a str,
    pub history: &'a [Message],
    pub schema: &'a SchemaDescriptor,
    pub collection_hint: Option<&'a str>,
}

/// Query results prepared for re-injection into the synthesis prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct DataContext {
    /// The approved query in its outbound shape.
    pub mongo_query: Value,
    /// Rows already stripped of hidden fields and bounded in size.
    pub rows: Vec<Value>,
    pub returned: usize,
    pub total_count: u64,
    pub has_more: bool,
    pub query_time_ms: u64,
    /// Whether `rows` was cut to fit the byte budget.
    pub truncated: bool,
}

/// What the final answer is grounded in.
#[derive(Debug, Clone, Copy)]
pub enum Grounding<'a> {
    /// Intent-negative: conversation only.
    Conversation,
    /// No query could be determined or it was rejected.
    NoQuery { note: &'a str },
    Data(&'a DataContext),
}

impl Grounding<'_> {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Conversation => "conversation",
            Self::NoQuery { .. } => "no_query",
            Self::Data(_) => "data",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SynthesisInput<'a> {
    pub message: &'a str,
    pub history: &'a [Message],
    pub grounding: Grounding<'a>,
}

/// Builds provider requests for both model round-trips.
#[derive(Clone)]
pub struct PromptAssembler {
    model: String,
    max_tokens: u32,
    temperature: f32,
    query_temperature: f32,
    history_token_budget: usize,
    schema_char_budget: usize,
    schema_max_collections: usize,
    sample_rows: usize,
    trimmer: Arc<dyn HistoryTrimmer>,
    estimator: Arc<dyn TokenEstimator>,
}

impl PromptAssembler {
    pub fn new(anthropic: &AnthropicConfig, pipeline: &PipelineConfig) -> Self {
        Self {
            model: anthropic.model.clone(),
            max_tokens: anthropic.max_tokens,
            temperature: anthropic.temperature,
            query_temperature: anthropic.query_temperature,
            history_token_budget: pipeline.history_token_budget,
            schema_char_budget: pipeline.schema_char_budget,
            schema_max_collections: pipeline.schema_max_collections,
            sample_rows: pipeline.result_sample_rows,
            trimmer: Arc::new(NewestFirstTrimmer),
            estimator: Arc::new(CharRatioEstimator::default()),
        }
    }

    pub fn with_trimmer(mut self, trimmer: Arc<dyn HistoryTrimmer>) -> Self {
        self.trimmer = trimmer;
        self
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn estimator(&self) -> &dyn TokenEstimator {
        self.estimator.as_ref()
    }

    /// Phase 1: ask for a query.
    pub fn elicitation(&self, input: &ElicitationInput<'_>) -> ProviderRequest {
        let excerpt = render_schema(
            input.schema,
            input.collection_hint,
            self.schema_char_budget,
            self.schema_max_collections,
        );
        let hint = input
            .collection_hint
            .map(|c| format!(" You must use the collection '{c}'."))
            .unwrap_or_default();
        let system = ELICITATION_PROMPT
            .replace("{hint}", &hint)
            .replace("{schema}", &excerpt.text);

        let mut messages = self.trimmed(input.history);
        push_user_turn(&mut messages, input.message.to_string());

        debug!(
            schema_chars = excerpt.text.len(),
            omitted_collections = excerpt.omitted,
            turns = messages.len(),
            "elicitation prompt assembled"
        );
        ProviderRequest {
            model: self.model.clone(),
            system: Some(system),
            messages,
            max_tokens: self.max_tokens,
            temperature: Some(self.query_temperature),
        }
    }

    /// Phase 2: ask for the final answer.
    pub fn synthesis(&self, input: &SynthesisInput<'_>) -> ProviderRequest {
        let mut messages = self.trimmed(input.history);
        let (system, content) = match input.grounding {
            Grounding::Conversation => (CONVERSATION_PROMPT.to_string(), input.message.to_string()),
            Grounding::NoQuery { note } => (
                NO_QUERY_PROMPT.to_string(),
                format!("{}\n\n[Note: {note}]", input.message),
            ),
            Grounding::Data(data) => {
                let sample: Vec<&Value> = data.rows.iter().take(self.sample_rows).collect();
                let context = json!({
                    "original_query": input.message,
                    "mongodb_query": data.mongo_query,
                    "result_count": data.returned,
                    "total_count": data.total_count,
                    "has_more": data.has_more,
                    "result_sample": sample,
                    "result_truncated": data.truncated,
                    "query_time_ms": data.query_time_ms,
                });
                let context = serde_json::to_string_pretty(&context).unwrap_or_default();
                (
                    DATA_PROMPT.to_string(),
                    format!("Explain the following query results:\n{context}"),
                )
            }
        };
        push_user_turn(&mut messages, content);

        debug!(
            grounding = input.grounding.label(),
            turns = messages.len(),
            "synthesis prompt assembled"
        );
        ProviderRequest {
            model: self.model.clone(),
            system: Some(system),
            messages,
            max_tokens: self.max_tokens,
            temperature: Some(self.temperature),
        }
    }

    fn trimmed(&self, history: &[Message]) -> Vec<corebrain_core::ProviderMessage> {
        self.trimmer
            .trim(history, self.history_token_budget, self.estimator.as_ref())
    }
}
