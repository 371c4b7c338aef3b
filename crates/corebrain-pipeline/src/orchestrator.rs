// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The query orchestrator.
//!
//! One request is one run of an explicit state machine:
//!
//! ```text
//! Intent ──conversational──────────────────────────────► Synthesize ─► Done
//!   │ data                                                   ▲
//!   ▼                                                        │
//! Elicit ──no candidate──────────────────────────────────────┤
//!   │                                                        │
//!   ▼                                                        │
//! Validate ──rejected (not permission)───────────────────────┤
//!   │  │ cache hit ─► Done                                   │
//!   │  └ permission denied ─► Failed                         │
//!   ▼                                                        │
//! Execute ──────────────────────────────────────────────────-┘
//!   └ store failure ─► Failed
//! ```
//!
//! Each run executes inside its own task. The request timeout bounds the
//! wait for that task, not the task itself, so calls already in flight run
//! to completion and their cost is still recorded.

use std::sync::Arc;
use std::time::Duration;

use corebrain_cache::{CachedAnswer, ResponseCache};
use corebrain_context::{
    DataContext, ElicitationInput, Grounding, PromptAssembler, SynthesisInput,
};
use corebrain_core::{
    CoreBrainError, Message, MessageRole, PermissionContext, ProviderAdapter, TokenUsage,
    now_timestamp,
};
use corebrain_cost::CostAccountant;
use corebrain_query::{
    Candidate, Fingerprint, QueryHints, QuerySpec, RejectionReason, SchemaDescriptor, Validator,
};
use corebrain_router::{Intent, IntentClassifier, KeywordIntentClassifier, Vocabulary};
use corebrain_store::{ExecutionResult, QueryExecutor, SchemaCatalog};
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::formatter::{ResultFormatter, redact_documents};
use crate::gateway::AiGateway;
use crate::response::{QueryResponse, QueryResult, ResponseMetadata, ResultMetadata};

const NO_CANDIDATE_NOTE: &str = "could not determine a data query for this question";

/// User turns the intent classifier sees besides the current message.
const INTENT_LOOKBACK: usize = 3;

/// Why a run ended in [`State::Failed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    PermissionDenied,
    Execution,
    Gateway,
    Schema,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::PermissionDenied => write!(f, "permission_denied"),
            FailureKind::Execution => write!(f, "execution"),
            FailureKind::Gateway => write!(f, "gateway"),
            FailureKind::Schema => write!(f, "schema"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Intent,
    Elicit,
    Validate,
    Execute,
    Synthesize,
    Done,
    Failed(FailureKind),
}

impl State {
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Done | State::Failed(_))
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            State::Intent => write!(f, "intent"),
            State::Elicit => write!(f, "elicit"),
            State::Validate => write!(f, "validate"),
            State::Execute => write!(f, "execute"),
            State::Synthesize => write!(f, "synthesize"),
            State::Done => write!(f, "done"),
            State::Failed(kind) => write!(f, "failed({kind})"),
        }
    }
}

/// One inbound question.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub text: String,
    pub collection_hint: Option<String>,
    pub limit: Option<i64>,
    pub conversation_id: Option<String>,
    /// Trailing conversation messages, oldest first.
    pub history: Vec<Message>,
    pub metadata: Option<Value>,
    /// Start at `Elicit`: the caller has already decided data is needed.
    pub skip_intent: bool,
}

impl QueryRequest {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// A direct data query: the intent step is skipped.
    pub fn direct(text: impl Into<String>) -> Self {
        Self {
            skip_intent: true,
            ..Self::new(text)
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection_hint = Some(collection.into());
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn in_conversation(mut self, conversation_id: impl Into<String>, history: Vec<Message>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self.history = history;
        self
    }
}

/// A finished run.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub response: QueryResponse,
    pub usage: TokenUsage,
    pub cost_usd: f64,
    pub query_executed: bool,
    pub cache_hit: bool,
    pub collection: Option<String>,
    pub model_calls: u32,
    /// Every state visited, in order.
    pub trace: Vec<State>,
}

impl Outcome {
    pub fn spend(&self) -> Spend {
        Spend {
            usage: self.usage,
            cost_usd: self.cost_usd,
            calls: self.model_calls,
        }
    }
}

/// Model usage a run paid for, whether or not it succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Spend {
    pub usage: TokenUsage,
    pub cost_usd: f64,
    pub calls: u32,
}

/// Per-request working state threaded through the steps.
struct Run {
    req: QueryRequest,
    ctx: PermissionContext,
    started: Instant,
    visible: Option<SchemaDescriptor>,
    candidate: Option<Candidate>,
    spec: Option<QuerySpec>,
    fingerprint: Option<Fingerprint>,
    note: Option<String>,
    executed: Option<(ExecutionResult, DataContext, Vec<Value>)>,
    cached: Option<(CachedAnswer, QueryResult)>,
    answer: Option<String>,
    usage: TokenUsage,
    model: Option<String>,
    calls: u32,
    error: Option<CoreBrainError>,
    trace: Vec<State>,
}

impl Run {
    fn new(req: QueryRequest, ctx: PermissionContext) -> Self {
        Self {
            req,
            ctx,
            started: Instant::now(),
            visible: None,
            candidate: None,
            spec: None,
            fingerprint: None,
            note: None,
            executed: None,
            cached: None,
            answer: None,
            usage: TokenUsage::default(),
            model: None,
            calls: 0,
            error: None,
            trace: Vec::new(),
        }
    }

    fn fail(&mut self, kind: FailureKind, error: CoreBrainError) -> State {
        self.error = Some(error);
        State::Failed(kind)
    }

    fn charge(&mut self, usage: &TokenUsage, model: &str) {
        self.usage.add(usage);
        self.calls += 1;
        if self.model.is_none() {
            self.model = Some(model.to_string());
        }
    }

    fn recent_user_turns(&self) -> Vec<&str> {
        let mut recent: Vec<&str> = self
            .req
            .history
            .iter()
            .rev()
            .filter(|m| m.role == MessageRole::User)
            .take(INTENT_LOOKBACK)
            .map(|m| m.content.as_str())
            .collect();
        recent.reverse();
        recent
    }
}

pub struct Orchestrator {
    catalog: Arc<SchemaCatalog>,
    validator: Validator,
    executor: Arc<QueryExecutor>,
    formatter: ResultFormatter,
    assembler: PromptAssembler,
    gateway: Arc<AiGateway>,
    classifier: Arc<dyn IntentClassifier>,
    cache: Arc<ResponseCache>,
    accountant: Arc<CostAccountant>,
    request_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        catalog: Arc<SchemaCatalog>,
        executor: Arc<QueryExecutor>,
        assembler: PromptAssembler,
        gateway: Arc<AiGateway>,
        cache: Arc<ResponseCache>,
        accountant: Arc<CostAccountant>,
    ) -> Self {
        Self {
            catalog,
            validator: Validator::default(),
            executor,
            formatter: ResultFormatter::new(8000),
            assembler,
            gateway,
            classifier: Arc::new(KeywordIntentClassifier::new()),
            cache,
            accountant,
            request_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_formatter(mut self, formatter: ResultFormatter) -> Self {
        self.formatter = formatter;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn IntentClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn accountant(&self) -> &Arc<CostAccountant> {
        &self.accountant
    }

    pub fn model(&self) -> &str {
        self.assembler.model()
    }

    /// Run one request under the request timeout.
    pub async fn run(
        self: &Arc<Self>,
        req: QueryRequest,
        ctx: PermissionContext,
    ) -> Result<Outcome, CoreBrainError> {
        self.run_with_spend(req, ctx).await.map_err(|(error, _)| error)
    }

    /// [`Self::run`], with what a failed run spent returned beside its error.
    ///
    /// A timed-out run reports no spend here; its calls are still committed
    /// to the accountant when they finish.
    pub async fn run_with_spend(
        self: &Arc<Self>,
        req: QueryRequest,
        ctx: PermissionContext,
    ) -> Result<Outcome, (CoreBrainError, Spend)> {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.drive(req, ctx).await });
        match tokio::time::timeout(self.request_timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err((
                CoreBrainError::Internal(format!("pipeline task failed: {e}")),
                Spend::default(),
            )),
            Err(_) => {
                warn!(
                    timeout_ms = self.request_timeout.as_millis() as u64,
                    "request timed out; in-flight calls left to finish"
                );
                Err((
                    CoreBrainError::Timeout {
                        duration: self.request_timeout,
                    },
                    Spend::default(),
                ))
            }
        }
    }

    async fn drive(
        &self,
        req: QueryRequest,
        ctx: PermissionContext,
    ) -> Result<Outcome, (CoreBrainError, Spend)> {
        let mut state = if req.skip_intent {
            State::Elicit
        } else {
            State::Intent
        };
        let mut run = Run::new(req, ctx);
        run.trace.push(state);

        while !state.is_terminal() {
            let next = self.step(state, &mut run).await;
            debug!(from = %state, to = %next, "state transition");
            run.trace.push(next);
            state = next;
        }

        match state {
            State::Done => Ok(self.finish(run).await),
            _ => Err(self.abort(run, state).await),
        }
    }

    async fn step(&self, state: State, run: &mut Run) -> State {
        match state {
            State::Intent => self.intent(run).await,
            State::Elicit => self.elicit(run).await,
            State::Validate => self.validate(run).await,
            State::Execute => self.execute(run).await,
            State::Synthesize => self.synthesize(run).await,
            State::Done | State::Failed(_) => state,
        }
    }

    async fn visible_schema(&self, run: &mut Run) -> Result<(), CoreBrainError> {
        if run.visible.is_none() {
            run.visible = Some(self.catalog.describe(&run.ctx).await?);
        }
        Ok(())
    }

    async fn intent(&self, run: &mut Run) -> State {
        if let Err(e) = self.visible_schema(run).await {
            return run.fail(FailureKind::Schema, e);
        }
        let vocabulary = run
            .visible
            .as_ref()
            .map(Vocabulary::from_schema)
            .unwrap_or_default();
        let recent = run.recent_user_turns();
        let decision = self
            .classifier
            .classify(&run.req.text, &recent, &vocabulary)
            .await;
        debug!(
            intent = %decision.intent,
            confidence = decision.confidence,
            reason = decision.reason,
            "intent classified"
        );
        match decision.intent {
            Intent::DataAccess => State::Elicit,
            Intent::Conversational => State::Synthesize,
        }
    }

    async fn elicit(&self, run: &mut Run) -> State {
        if let Err(e) = self.visible_schema(run).await {
            return run.fail(FailureKind::Schema, e);
        }
        let request = match run.visible.as_ref() {
            Some(schema) => self.assembler.elicitation(&ElicitationInput {
                message: &run.req.text,
                history: &run.req.history,
                schema,
                collection_hint: run.req.collection_hint.as_deref(),
            }),
            None => return run.fail(FailureKind::Schema, CoreBrainError::Internal("schema missing".into())),
        };

        match self.gateway.elicit(request).await {
            Ok((candidate, response)) => {
                run.charge(&response.usage, &response.model);
                match candidate {
                    Some(candidate) => {
                        run.candidate = Some(candidate);
                        State::Validate
                    }
                    None => {
                        run.note = Some(NO_CANDIDATE_NOTE.to_string());
                        State::Synthesize
                    }
                }
            }
            Err(e) => run.fail(FailureKind::Gateway, e),
        }
    }

    async fn validate(&self, run: &mut Run) -> State {
        let Some(candidate) = run.candidate.take() else {
            run.note = Some(NO_CANDIDATE_NOTE.to_string());
            return State::Synthesize;
        };
        let schema = match self.catalog.snapshot().await {
            Ok(schema) => schema,
            Err(e) => return run.fail(FailureKind::Schema, e),
        };
        let hints = QueryHints {
            collection: run.req.collection_hint.clone(),
            limit: run.req.limit,
        };

        let spec = match self.validator.validate(&candidate, &hints, &run.ctx, &schema) {
            Ok(spec) => spec,
            Err(reason @ RejectionReason::PermissionDenied(_)) => {
                warn!(caller = %run.ctx.caller_id, reason = %reason, "query rejected");
                return run.fail(FailureKind::PermissionDenied, reason.into());
            }
            Err(reason) => {
                warn!(kind = reason.kind(), reason = %reason, "query rejected; answering without data");
                run.note = Some(format!("the generated query was rejected and not run ({reason})"));
                return State::Synthesize;
            }
        };

        let fingerprint = Fingerprint::compute(&spec, &run.req.text, &run.ctx.scope_id());
        if let Some(cached) = self.cache.get(&fingerprint) {
            match serde_json::from_value::<QueryResult>(cached.result.clone()) {
                Ok(result) => {
                    debug!(fingerprint = %fingerprint, "response cache hit");
                    run.spec = Some(spec);
                    run.fingerprint = Some(fingerprint);
                    run.cached = Some((cached, result));
                    return State::Done;
                }
                Err(e) => warn!(error = %e, "unreadable cache entry; treating as miss"),
            }
        }
        run.spec = Some(spec);
        run.fingerprint = Some(fingerprint);
        State::Execute
    }

    async fn execute(&self, run: &mut Run) -> State {
        let Some(spec) = run.spec.clone() else {
            return run.fail(
                FailureKind::Execution,
                CoreBrainError::Internal("no approved query to execute".into()),
            );
        };
        let result = match self.executor.execute(&spec).await {
            Ok(result) => result,
            Err(e) => return run.fail(FailureKind::Execution, e),
        };

        let formatted = self.formatter.format(&result, &run.ctx);
        let (outbound, _) = redact_documents(&result.documents, &result.collection, &run.ctx);
        let data = DataContext {
            mongo_query: spec.to_value(),
            returned: result.documents.len(),
            rows: formatted.rows,
            total_count: result.total_count,
            has_more: result.has_more,
            query_time_ms: result.elapsed.as_millis() as u64,
            truncated: formatted.truncated,
        };
        run.executed = Some((result, data, outbound));
        State::Synthesize
    }

    async fn synthesize(&self, run: &mut Run) -> State {
        let grounding = match (&run.executed, &run.note) {
            (Some((_, data, _)), _) => Grounding::Data(data),
            (None, Some(note)) => Grounding::NoQuery { note },
            (None, None) => Grounding::Conversation,
        };
        let request = self.assembler.synthesis(&SynthesisInput {
            message: &run.req.text,
            history: &run.req.history,
            grounding,
        });

        match self.gateway.complete(request).await {
            Ok(response) => {
                run.charge(&response.usage, &response.model);
                run.answer = Some(response.content);
                State::Done
            }
            Err(e) => run.fail(FailureKind::Gateway, e),
        }
    }

    /// Build the response, record cost, and cache executed answers.
    async fn finish(&self, mut run: Run) -> Outcome {
        let model = run
            .model
            .clone()
            .unwrap_or_else(|| self.assembler.model().to_string());
        let cache_hit = run.cached.is_some();
        let collection = run.spec.as_ref().map(|s| s.collection().to_string());
        let mongo_query = run.spec.as_ref().map(QuerySpec::to_value);

        let (result, explanation) = match (run.cached.take(), run.executed.take()) {
            (Some((cached, result)), _) => (result, cached.answer),
            (None, Some((executed, _, rows))) => {
                let result = QueryResult {
                    count: rows.len(),
                    data: rows,
                    query_time_ms: executed.elapsed.as_secs_f64() * 1000.0,
                    has_more: executed.has_more,
                    metadata: ResultMetadata {
                        total_count: executed.total_count,
                        skip: executed.skip,
                        limit: executed.limit,
                        collection: Some(executed.collection),
                        pipeline_stages: executed.pipeline_stages,
                    },
                };
                let answer = run.answer.take().unwrap_or_default();
                if let Some(fingerprint) = run.fingerprint.as_ref() {
                    match serde_json::to_value(&result) {
                        Ok(value) => self.cache.put(
                            fingerprint,
                            CachedAnswer {
                                answer: answer.clone(),
                                result: value,
                                model: model.clone(),
                                created_at: now_timestamp(),
                            },
                        ),
                        Err(e) => warn!(error = %e, "result not cacheable"),
                    }
                }
                (result, answer)
            }
            (None, None) => (
                QueryResult::empty(run.req.collection_hint.as_deref()),
                run.answer.take().unwrap_or_default(),
            ),
        };
        let query_executed = mongo_query.is_some() && !cache_hit;

        let cost_usd = self.record_cost(&run, &model, cache_hit).await;
        let processing_time = run.started.elapsed().as_secs_f64();
        info!(
            conversation_id = run.req.conversation_id.as_deref().unwrap_or("-"),
            collection = collection.as_deref().unwrap_or("-"),
            query_executed,
            cache_hit,
            model_calls = run.calls,
            processing_ms = (processing_time * 1000.0) as u64,
            "request completed"
        );

        Outcome {
            response: QueryResponse {
                natural_query: run.req.text.clone(),
                mongo_query,
                result,
                explanation,
                metadata: ResponseMetadata {
                    processing_time,
                    model,
                },
            },
            usage: run.usage,
            cost_usd,
            query_executed,
            cache_hit,
            collection,
            model_calls: run.calls,
            trace: run.trace,
        }
    }

    async fn abort(&self, mut run: Run, state: State) -> (CoreBrainError, Spend) {
        let model = run
            .model
            .clone()
            .unwrap_or_else(|| self.assembler.model().to_string());
        let cost_usd = self.record_cost(&run, &model, false).await;
        let error = run
            .error
            .take()
            .unwrap_or_else(|| CoreBrainError::Internal(format!("pipeline ended in {state}")));
        warn!(state = %state, error = %error, model_calls = run.calls, "request failed");
        let spend = Spend {
            usage: run.usage,
            cost_usd,
            calls: run.calls,
        };
        (error, spend)
    }

    /// Commit the tokens spent by this run. Runs without model calls cost nothing.
    async fn record_cost(&self, run: &Run, model: &str, cache_hit: bool) -> f64 {
        if run.calls == 0 {
            return 0.0;
        }
        let mut record = self
            .accountant
            .price(run.req.conversation_id.as_deref(), model, &run.usage);
        record.cache_hit = cache_hit;
        if let Err(e) = self.accountant.commit(&record).await {
            warn!(error = %e, "cost record not persisted");
        }
        record.cost_usd
    }

    pub fn provider(&self) -> &Arc<dyn ProviderAdapter> {
        self.gateway.provider()
    }

    /// Stop backoff waits and release the provider and document store.
    pub async fn shutdown(&self) -> Result<(), CoreBrainError> {
        self.gateway.close();
        self.gateway.provider().shutdown().await?;
        self.executor.store().shutdown().await?;
        info!("orchestrator shut down");
        Ok(())
    }
}
