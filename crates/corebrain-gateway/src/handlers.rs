// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the REST API.

use axum::{
    Extension, Json,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
};
use corebrain_core::{Conversation, CoreBrainError, Message, PermissionContext, PermissionLevel};
use corebrain_cost::{CostAccountant, CostTotals};
use corebrain_pipeline::{QueryRequest, QueryResponse};
use corebrain_query::SchemaDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::require_level;
use crate::error::ApiError;
use crate::server::AppState;

type ApiResult<T> = Result<Json<T>, ApiError>;

/// Request body for POST /api/database/query.
#[derive(Debug, Deserialize)]
pub struct DirectQueryBody {
    pub query: String,
    #[serde(default)]
    pub collection_name: Option<String>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Request body for POST /api/chat/conversations.
#[derive(Debug, Default, Deserialize)]
pub struct CreateConversationBody {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

/// Request body for POST /api/chat/conversations/{id}/messages.
#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub content: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// A conversation with its messages, oldest first.
#[derive(Debug, Serialize)]
pub struct ConversationWithMessages {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// Accumulated usage for one conversation or one day.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct CostSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub total_tokens: u64,
    pub cost_usd: f64,
    pub calls: u64,
}

impl CostSummary {
    fn from_totals(totals: &CostTotals) -> Self {
        Self {
            conversation_id: None,
            date: None,
            input_tokens: totals.input_tokens,
            output_tokens: totals.output_tokens,
            total_tokens: totals.total_tokens(),
            cost_usd: totals.cost_usd(),
            calls: totals.calls,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DailyQuery {
    /// `YYYY-MM-DD`, UTC. Defaults to today.
    #[serde(default)]
    pub date: Option<String>,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/database/query
///
/// Runs the pipeline once with data access presumed.
pub async fn post_query(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
    body: Result<Json<DirectQueryBody>, JsonRejection>,
) -> ApiResult<QueryResponse> {
    let Json(body) = body?;
    if body.query.trim().is_empty() {
        return Err(CoreBrainError::BadRequest("query is empty".into()).into());
    }

    // Without a caller limit the model's suggestion, then the configured default, applies.
    let mut request = QueryRequest::direct(body.query);
    if let Some(limit) = body.limit {
        request = request.with_limit(limit);
    }
    if let Some(collection) = body.collection_name.filter(|c| !c.trim().is_empty()) {
        request = request.with_collection(collection);
    }
    request.metadata = body.metadata;

    let outcome = state.services.orchestrator.run(request, ctx).await?;
    Ok(Json(outcome.response))
}

/// GET /api/database/collections
pub async fn get_collections(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
) -> ApiResult<SchemaDescriptor> {
    let schema = state.services.orchestrator.catalog().describe(&ctx).await?;
    Ok(Json(schema))
}

/// POST /api/database/schema/refresh
pub async fn refresh_schema(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
) -> ApiResult<SchemaDescriptor> {
    require_level(&ctx, PermissionLevel::Admin)?;
    let schema = state.services.orchestrator.catalog().refresh().await?;
    tracing::info!(
        caller = %ctx.caller_id,
        collections = schema.collections.len(),
        "schema refreshed"
    );
    Ok(Json(schema.visible_to(&ctx)))
}

/// POST /api/chat/conversations
pub async fn create_conversation(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
    body: Result<Json<CreateConversationBody>, JsonRejection>,
) -> Result<(StatusCode, Json<Conversation>), ApiError> {
    require_level(&ctx, PermissionLevel::Write)?;
    let Json(body) = body?;
    let conversation = state
        .services
        .chat
        .create_conversation(&ctx, body.title, body.metadata)
        .await?;
    Ok((StatusCode::CREATED, Json(conversation)))
}

/// GET /api/chat/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
) -> ApiResult<Vec<Conversation>> {
    let conversations = state.services.chat.list_conversations(&ctx).await?;
    Ok(Json(conversations))
}

/// GET /api/chat/conversations/{id}
pub async fn get_conversation(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
    Path(id): Path<String>,
) -> ApiResult<ConversationWithMessages> {
    let thread = state.services.chat.get_conversation(&ctx, &id).await?;
    Ok(Json(ConversationWithMessages {
        conversation: thread.conversation,
        messages: thread.messages,
    }))
}

/// POST /api/chat/conversations/{id}/messages
///
/// Returns the assistant's reply.
pub async fn post_message(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
    Path(id): Path<String>,
    body: Result<Json<SendMessageBody>, JsonRejection>,
) -> ApiResult<Message> {
    require_level(&ctx, PermissionLevel::Write)?;
    let Json(body) = body?;
    if let Some(body_id) = &body.conversation_id {
        if body_id != &id {
            return Err(CoreBrainError::BadRequest(
                "conversation id in body does not match path".into(),
            )
            .into());
        }
    }
    let reply = state
        .services
        .chat
        .send_message(&ctx, &id, body.content, body.metadata)
        .await?;
    Ok(Json(reply))
}

/// GET /api/cost/conversations/{id}
pub async fn conversation_cost(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
    Path(id): Path<String>,
) -> ApiResult<CostSummary> {
    // 404 unless the caller may see the conversation.
    state.services.chat.get_conversation(&ctx, &id).await?;
    let totals = accountant(&state).conversation_totals(&id).await?;
    Ok(Json(CostSummary {
        conversation_id: Some(id),
        ..CostSummary::from_totals(&totals)
    }))
}

/// GET /api/cost/daily?date=YYYY-MM-DD
pub async fn daily_cost(
    State(state): State<AppState>,
    Extension(ctx): Extension<PermissionContext>,
    Query(query): Query<DailyQuery>,
) -> ApiResult<CostSummary> {
    require_level(&ctx, PermissionLevel::Admin)?;
    let date = query.date.unwrap_or_else(CostAccountant::today);
    if !is_iso_date(&date) {
        return Err(CoreBrainError::BadRequest(format!("invalid date: {date}")).into());
    }
    let totals = accountant(&state).daily_totals(&date).await?;
    Ok(Json(CostSummary {
        date: Some(date),
        ..CostSummary::from_totals(&totals)
    }))
}

fn accountant(state: &AppState) -> &CostAccountant {
    state.services.orchestrator.accountant()
}

fn is_iso_date(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
