// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API tests driving the router directly.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use corebrain_config::model::ApiKeyConfig;
use corebrain_core::PermissionLevel;
use corebrain_gateway::{AppState, router};
use corebrain_test_utils::TestHarness;
use corebrain_test_utils::fixtures::top_sellers;
use serde_json::{Value, json};
use tower::ServiceExt;

const READ_KEY: &str = "cb_read_0000000001";
const WRITE_KEY: &str = "cb_write_000000002";
const ADMIN_KEY: &str = "cb_admin_000000003";
const DOMAIN_KEY: &str = "cb_domain_00000004";

const TOP_FIVE_QUERY: &str =
    r#"{"collection": "products", "operation": "find", "query": {}, "sort": {"sales": -1}, "limit": 5}"#;

fn key(name: &str, key: &str, level: PermissionLevel) -> ApiKeyConfig {
    ApiKeyConfig {
        name: name.to_string(),
        key: key.to_string(),
        level,
        allowed_collections: None,
        allowed_domains: Vec::new(),
        user_id: None,
        active: true,
    }
}

async fn app_with(replies: Vec<String>, rate_limit: Option<(u32, u32)>) -> (Router, TestHarness) {
    let harness = TestHarness::builder()
        .with_mock_responses(replies)
        .with_config(|config| {
            config.api_keys = vec![
                key("reader", READ_KEY, PermissionLevel::Read),
                key("writer", WRITE_KEY, PermissionLevel::Write),
                key("admin", ADMIN_KEY, PermissionLevel::Admin),
                ApiKeyConfig {
                    allowed_domains: vec![".example.com".to_string()],
                    ..key("widget", DOMAIN_KEY, PermissionLevel::Read)
                },
            ];
            match rate_limit {
                Some((rpm, burst)) => {
                    config.rate_limit.requests_per_minute = rpm;
                    config.rate_limit.burst = burst;
                }
                None => config.rate_limit.enabled = false,
            }
        })
        .build()
        .await
        .unwrap();
    let state = AppState::new(harness.services.clone(), Arc::new(harness.config.clone()));
    (router(state), harness)
}

async fn app(replies: Vec<String>) -> (Router, TestHarness) {
    app_with(replies, None).await
}

fn get(uri: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(k) = api_key {
        builder = builder.header("x-api-key", k);
    }
    builder.body(Body::empty()).unwrap()
}

fn post(uri: &str, api_key: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-api-key", api_key)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

#[tokio::test]
async fn health_is_public() {
    let (app, _harness) = app(vec![]).await;
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn missing_or_unknown_keys_are_unauthorized() {
    let (app, _harness) = app(vec![]).await;

    let (status, body) = send(&app, get("/api/database/collections", None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "missing API key");

    let (status, body) = send(&app, get("/api/database/collections", Some("cb_nope"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "invalid API key");
}

#[tokio::test]
async fn direct_query_returns_the_success_shape() {
    let (app, harness) = app(vec![
        TOP_FIVE_QUERY.to_string(),
        "The five best sellers are listed.".to_string(),
    ])
    .await;

    let (status, body) = send(
        &app,
        post(
            "/api/database/query",
            READ_KEY,
            json!({"query": "top 5 best-selling products", "collection_name": "products", "limit": 5}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["natural_query"], "top 5 best-selling products");
    assert_eq!(body["mongo_query"]["collection"], "products");
    assert_eq!(body["mongo_query"]["limit"], 5);
    let names: Vec<&str> = body["result"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, top_sellers(5));
    assert_eq!(body["result"]["count"], 5);
    assert_eq!(body["result"]["has_more"], true);
    assert_eq!(body["result"]["metadata"]["total_count"], 120);
    assert_eq!(body["result"]["metadata"]["skip"], 0);
    assert_eq!(body["explanation"], "The five best sellers are listed.");
    assert!(body["metadata"]["processing_time"].is_number());
    assert!(body["metadata"]["model"].is_string());
    assert_eq!(harness.store.executions(), 1);
}

#[tokio::test]
async fn direct_query_without_a_limit_uses_the_model_suggestion() {
    let (app, _harness) = app(vec![
        TOP_FIVE_QUERY.to_string(),
        "Five products.".to_string(),
    ])
    .await;

    let (status, body) = send(
        &app,
        post(
            "/api/database/query",
            READ_KEY,
            json!({"query": "top 5 best-selling products", "collection_name": "products"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mongo_query"]["limit"], 5);
    assert_eq!(body["result"]["count"], 5);
}

#[tokio::test]
async fn direct_query_without_any_limit_uses_the_default() {
    let (app, harness) = app(vec![
        r#"{"collection": "products", "operation": "find", "sort": {"sales": -1}}"#.to_string(),
        "Best sellers.".to_string(),
    ])
    .await;

    let (status, body) = send(
        &app,
        post(
            "/api/database/query",
            READ_KEY,
            json!({"query": "best-selling products", "collection_name": "products"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let default_limit = harness.config.pipeline.default_limit;
    assert_eq!(body["mongo_query"]["limit"], default_limit);
    assert_eq!(body["result"]["count"], default_limit);
}

#[tokio::test]
async fn direct_query_outside_scope_is_forbidden() {
    let (app, harness) = app(vec![
        r#"{"collection": "orders", "operation": "find"}"#.to_string(),
    ])
    .await;

    let (status, body) = send(
        &app,
        post("/api/database/query", READ_KEY, json!({"query": "all orders"})),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["detail"].as_str().unwrap().contains("orders"));
    assert_eq!(harness.store.executions(), 0);
}

#[tokio::test]
async fn malformed_bodies_are_bad_requests() {
    let (app, _harness) = app(vec![]).await;

    let (status, body) = send(&app, post("/api/database/query", READ_KEY, json!({"limit": 5}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].is_string());

    let (status, _) = send(&app, post("/api/database/query", READ_KEY, json!({"query": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn collections_are_filtered_by_level() {
    let (app, _harness) = app(vec![]).await;

    let (status, body) = send(&app, get("/api/database/collections", Some(READ_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    let collections = body["collections"].as_object().unwrap();
    assert!(collections.contains_key("products"));
    assert!(!collections.contains_key("users"));
    assert_eq!(collections["products"]["document_count"], 120);
    assert!(collections["products"]["schema"]["name"]["type"].is_string());

    let (_, body) = send(&app, get("/api/database/collections", Some(ADMIN_KEY))).await;
    assert!(body["collections"].as_object().unwrap().contains_key("users"));
}

#[tokio::test]
async fn schema_refresh_is_admin_only() {
    let (app, _harness) = app(vec![]).await;

    let refresh = |key: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/database/schema/refresh")
            .header("x-api-key", key)
            .body(Body::empty())
            .unwrap()
    };
    let (status, _) = send(&app, refresh(READ_KEY)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, refresh(ADMIN_KEY)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["collections"]["orders"].is_object());
}

#[tokio::test]
async fn chat_round_trip() {
    let (app, _harness) = app(vec!["Hello! Ask me about your data.".to_string()]).await;

    let (status, conversation) = send(
        &app,
        post("/api/chat/conversations", WRITE_KEY, json!({"title": "Support"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(conversation["title"], "Support");
    let id = conversation["id"].as_str().unwrap().to_string();

    let (status, reply) = send(
        &app,
        post(
            &format!("/api/chat/conversations/{id}/messages"),
            WRITE_KEY,
            json!({"content": "hello", "conversation_id": id}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["role"], "assistant");
    assert_eq!(reply["content"], "Hello! Ask me about your data.");
    assert_eq!(reply["metadata"]["query_executed"], false);
    assert_eq!(reply["metadata"]["tokens"]["total"], 30);

    let (status, thread) = send(
        &app,
        get(&format!("/api/chat/conversations/{id}"), Some(WRITE_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let messages = thread["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(thread["metadata"]["api_calls"], 1);

    let (status, list) = send(&app, get("/api/chat/conversations", Some(WRITE_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let (status, cost) = send(
        &app,
        get(&format!("/api/cost/conversations/{id}"), Some(WRITE_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cost["conversation_id"], id.as_str());
    assert_eq!(cost["total_tokens"], 30);
    assert_eq!(cost["calls"], 1);
}

#[tokio::test]
async fn mismatched_conversation_id_is_rejected() {
    let (app, harness) = app(vec![]).await;
    let (_, conversation) = send(&app, post("/api/chat/conversations", WRITE_KEY, json!({}))).await;
    let id = conversation["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        post(
            &format!("/api/chat/conversations/{id}/messages"),
            WRITE_KEY,
            json!({"content": "hello", "conversation_id": "other"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("does not match"));
    assert_eq!(harness.provider.calls(), 0);
}

#[tokio::test]
async fn unknown_and_foreign_conversations_are_not_found() {
    let (app, _harness) = app(vec![]).await;

    let (status, _) = send(&app, get("/api/chat/conversations/missing", Some(WRITE_KEY))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, conversation) = send(&app, post("/api/chat/conversations", WRITE_KEY, json!({}))).await;
    let id = conversation["id"].as_str().unwrap();
    let (status, _) = send(
        &app,
        get(&format!("/api/chat/conversations/{id}"), Some(READ_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        get(&format!("/api/cost/conversations/{id}"), Some(READ_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn read_keys_cannot_write_conversations() {
    let (app, _harness) = app(vec![]).await;
    let (status, _) = send(&app, post("/api/chat/conversations", READ_KEY, json!({}))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn daily_cost_is_admin_only() {
    let (app, _harness) = app(vec![]).await;

    let (status, _) = send(&app, get("/api/cost/daily", Some(READ_KEY))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(&app, get("/api/cost/daily?date=2026-01-01", Some(ADMIN_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["date"], "2026-01-01");
    assert_eq!(body["calls"], 0);

    let (status, _) = send(&app, get("/api/cost/daily?date=yesterday", Some(ADMIN_KEY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn domain_restricted_keys_require_an_allowed_origin() {
    let (app, _harness) = app(vec![]).await;

    let with_origin = |origin: Option<&str>| {
        let mut builder = Request::builder()
            .uri("/api/database/collections")
            .header("x-api-key", DOMAIN_KEY);
        if let Some(o) = origin {
            builder = builder.header("origin", o);
        }
        builder.body(Body::empty()).unwrap()
    };

    let (status, _) = send(&app, with_origin(None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, with_origin(Some("https://evil.test"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, with_origin(Some("https://app.example.com"))).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bursts_beyond_capacity_are_throttled() {
    let (app, _harness) = app_with(vec![], Some((1, 2))).await;

    for _ in 0..2 {
        let (status, _) = send(&app, get("/api/database/collections", Some(READ_KEY))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let response = app
        .clone()
        .oneshot(get("/api/database/collections", Some(READ_KEY)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = response.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after >= 1);

    // Other clients have their own bucket.
    let (status, _) = send(&app, get("/api/database/collections", Some(ADMIN_KEY))).await;
    assert_eq!(status, StatusCode::OK);

    // Health stays unthrottled.
    let (status, _) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}
