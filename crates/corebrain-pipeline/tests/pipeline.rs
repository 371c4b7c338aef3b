// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! End-to-end runs of the orchestrator and chat service against the
//! seeded product fixture and a scripted provider.

use std::time::Duration;

use corebrain_core::{CoreBrainError, MessageRole, PermissionLevel};
use corebrain_pipeline::{QueryRequest, State};
use corebrain_test_utils::TestHarness;
use corebrain_test_utils::fixtures::{product_sales, top_sellers};
use serde_json::json;

const TOP_FIVE_QUERY: &str =
    r#"{"collection": "products", "operation": "find", "query": {}, "sort": {"sales": -1}, "limit": 5}"#;

fn top_five() -> QueryRequest {
    QueryRequest::direct("top 5 best-selling products")
        .with_collection("products")
        .with_limit(5)
}

#[tokio::test]
async fn top_five_products_end_to_end() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            format!("```json\n{TOP_FIVE_QUERY}\n```"),
            "These are the five best sellers.".to_string(),
        ])
        .build()
        .await
        .unwrap();

    let outcome = harness.query(top_five(), PermissionLevel::Read).await.unwrap();
    let response = &outcome.response;

    let mongo = response.mongo_query.as_ref().unwrap();
    assert_eq!(mongo["collection"], "products");
    assert_eq!(mongo["operation"], "find");
    assert_eq!(mongo["sort"], json!({"sales": -1}));
    assert_eq!(mongo["limit"], 5);

    let names: Vec<&str> = response
        .result
        .data
        .iter()
        .map(|d| d["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, top_sellers(5));
    assert_eq!(response.result.count, 5);
    assert!(response.result.has_more);
    assert_eq!(response.result.metadata.total_count, 120);
    assert_eq!(response.result.metadata.limit, 5);
    assert_eq!(response.result.metadata.collection.as_deref(), Some("products"));
    assert_eq!(response.explanation, "These are the five best sellers.");

    // The synthesis prompt carries every returned product and its sales.
    let requests = harness.provider.requests().await;
    assert_eq!(requests.len(), 2);
    let prompt = &requests[1].messages.last().unwrap().content;
    for name in top_sellers(5) {
        assert!(prompt.contains(&name), "{name} missing from synthesis prompt");
        let i: usize = name.trim_start_matches("Product ").parse().unwrap();
        assert!(prompt.contains(&product_sales(i).to_string()));
    }

    assert_eq!(
        outcome.trace,
        vec![State::Elicit, State::Validate, State::Execute, State::Synthesize, State::Done]
    );
    assert!(outcome.query_executed);
    assert!(!outcome.cache_hit);
    assert_eq!(outcome.model_calls, 2);
    assert_eq!(outcome.usage.total(), 60);
    assert!(outcome.cost_usd > 0.0);
    assert_eq!(harness.store.executions(), 1);
}

#[tokio::test]
async fn unsafe_query_is_never_executed() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            r#"{"collection": "products", "query": {"$where": "this.sales > 0"}}"#.to_string(),
            "That request could not be run as a query.".to_string(),
        ])
        .build()
        .await
        .unwrap();

    let outcome = harness
        .query(
            QueryRequest::direct("delete every product where sales exist").with_collection("products"),
            PermissionLevel::Read,
        )
        .await
        .unwrap();

    assert_eq!(harness.store.executions(), 0);
    assert!(outcome.response.mongo_query.is_none());
    assert!(outcome.response.result.data.is_empty());
    assert!(!outcome.query_executed);
    assert!(!outcome.trace.contains(&State::Execute));

    let requests = harness.provider.requests().await;
    let prompt = &requests[1].messages.last().unwrap().content;
    assert!(prompt.contains("[Note:"));
    assert!(prompt.contains("rejected"));
}

#[tokio::test]
async fn mutating_pipeline_stage_is_rejected() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            r#"{"collection": "products", "operation": "aggregate", "pipeline": [{"$match": {}}, {"$out": "stolen"}]}"#
                .to_string(),
            "Not possible.".to_string(),
        ])
        .build()
        .await
        .unwrap();

    let outcome = harness
        .query(QueryRequest::direct("copy products elsewhere"), PermissionLevel::Admin)
        .await
        .unwrap();
    assert_eq!(harness.store.executions(), 0);
    assert!(outcome.response.mongo_query.is_none());
}

#[tokio::test]
async fn identical_query_hits_the_cache() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            TOP_FIVE_QUERY.to_string(),
            "First answer.".to_string(),
            TOP_FIVE_QUERY.to_string(),
        ])
        .build()
        .await
        .unwrap();

    let first = harness.query(top_five(), PermissionLevel::Read).await.unwrap();
    let second = harness.query(top_five(), PermissionLevel::Read).await.unwrap();

    assert!(!first.cache_hit);
    assert!(second.cache_hit);
    assert_eq!(harness.store.executions(), 1);
    assert_eq!(harness.provider.calls(), 3);
    assert_eq!(second.response.explanation, "First answer.");
    assert_eq!(second.response.result.data, first.response.result.data);
    assert_eq!(second.trace.last(), Some(&State::Done));
    assert!(!second.trace.contains(&State::Synthesize));

    // A different permission scope does not share the entry.
    harness.provider.add_response(TOP_FIVE_QUERY).await;
    harness.provider.add_response("Admin answer.").await;
    let admin = harness.query(top_five(), PermissionLevel::Admin).await.unwrap();
    assert!(!admin.cache_hit);
    assert_eq!(harness.store.executions(), 2);
}

#[tokio::test]
async fn permission_denied_is_surfaced() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![r#"{"collection": "users", "operation": "find"}"#.to_string()])
        .build()
        .await
        .unwrap();

    let err = harness
        .query(QueryRequest::direct("list all users"), PermissionLevel::Read)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreBrainError::PermissionDenied(_)));
    assert_eq!(err.status_class().code(), 403);
    assert_eq!(harness.store.executions(), 0);
    assert_eq!(harness.provider.calls(), 1);

    // The elicitation tokens were still charged.
    let today = corebrain_cost::CostAccountant::today();
    let totals = harness
        .services
        .orchestrator
        .accountant()
        .daily_totals(&today)
        .await
        .unwrap();
    assert_eq!(totals.calls, 1);
    assert_eq!(totals.total_tokens(), 30);
}

#[tokio::test]
async fn declined_elicitation_answers_without_data() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            "ERROR: the question is not about the database".to_string(),
            "I can only answer questions about your data.".to_string(),
        ])
        .build()
        .await
        .unwrap();

    let outcome = harness
        .query(QueryRequest::direct("what is the meaning of life"), PermissionLevel::Read)
        .await
        .unwrap();
    assert_eq!(
        outcome.trace,
        vec![State::Elicit, State::Synthesize, State::Done]
    );
    assert!(outcome.response.mongo_query.is_none());
    assert_eq!(harness.store.executions(), 0);
}

#[tokio::test]
async fn greetings_skip_the_data_path() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Hello! Ask me about your data.".to_string()])
        .build()
        .await
        .unwrap();

    let outcome = harness
        .query(QueryRequest::new("hello"), PermissionLevel::Read)
        .await
        .unwrap();
    assert_eq!(outcome.trace, vec![State::Intent, State::Synthesize, State::Done]);
    assert_eq!(harness.provider.calls(), 1);
    assert_eq!(outcome.response.explanation, "Hello! Ask me about your data.");
}

#[tokio::test]
async fn gateway_failure_after_execution_surfaces() {
    let harness = TestHarness::builder()
        .with_script(vec![
            Ok(TOP_FIVE_QUERY.to_string()),
            Err(CoreBrainError::provider("400 invalid_request_error")),
        ])
        .build()
        .await
        .unwrap();

    let err = harness.query(top_five(), PermissionLevel::Read).await.unwrap_err();
    assert!(matches!(err, CoreBrainError::Provider { .. }));
    assert_eq!(harness.store.executions(), 1);
    // Nothing is cached for a failed run.
    assert!(harness.services.orchestrator.cache().is_empty());
}

#[tokio::test(start_paused = true)]
async fn request_timeout_returns_without_waiting() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            "ERROR: nothing to query".to_string(),
            "Late answer.".to_string(),
        ])
        .with_provider_delays(vec![Duration::from_secs(120)])
        .with_config(|c| {
            c.server.request_timeout_secs = 1;
            c.anthropic.timeout_secs = 300;
            c.anthropic.max_retries = 0;
        })
        .build()
        .await
        .unwrap();

    let started = tokio::time::Instant::now();
    let err = harness
        .query(QueryRequest::direct("count products"), PermissionLevel::Read)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreBrainError::Timeout { .. }));
    assert!(started.elapsed() < Duration::from_secs(120));
    assert_eq!(harness.provider.calls(), 1);

    // The in-flight call is left to finish and the run carries on.
    tokio::time::sleep(Duration::from_secs(200)).await;
    assert_eq!(harness.provider.calls(), 2);
}

#[tokio::test]
async fn chat_appends_both_turns_and_accumulates_totals() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec![
            TOP_FIVE_QUERY.to_string(),
            "Here are the top five.".to_string(),
        ])
        .build()
        .await
        .unwrap();
    let ctx = harness.context(PermissionLevel::Read);
    let chat = &harness.services.chat;

    let conversation = chat
        .create_conversation(&ctx, Some("Sales".into()), None)
        .await
        .unwrap();
    let reply = chat
        .send_message(&ctx, &conversation.id, "top 5 best-selling products".into(), None)
        .await
        .unwrap();

    assert_eq!(reply.role, MessageRole::Assistant);
    assert_eq!(reply.content, "Here are the top five.");
    let meta = reply.metadata.unwrap();
    assert_eq!(meta["query_executed"], true);
    assert_eq!(meta["collection"], "products");
    assert_eq!(meta["cache_hit"], false);
    assert_eq!(meta["tokens"]["total"], 60);

    let thread = chat.get_conversation(&ctx, &conversation.id).await.unwrap();
    assert_eq!(thread.messages.len(), 2);
    assert_eq!(thread.messages[0].role, MessageRole::User);
    assert_eq!(thread.conversation.metadata["api_calls"], 2);
    assert_eq!(thread.conversation.metadata["tokens"]["input"], 20);
    assert_eq!(thread.conversation.metadata["tokens"]["output"], 40);

    let totals = harness
        .services
        .orchestrator
        .accountant()
        .conversation_totals(&conversation.id)
        .await
        .unwrap();
    assert_eq!(totals.total_tokens(), 60);
}

#[tokio::test]
async fn answered_conversations_release_their_lock() {
    let harness = TestHarness::builder()
        .with_mock_responses(vec!["Hello!".to_string()])
        .build()
        .await
        .unwrap();
    let ctx = harness.context(PermissionLevel::Read);
    let chat = &harness.services.chat;

    let conversation = chat.create_conversation(&ctx, None, None).await.unwrap();
    chat.send_message(&ctx, &conversation.id, "hello".into(), None)
        .await
        .unwrap();
    assert_eq!(chat.locks().tracked(), 0);
}

#[tokio::test]
async fn failed_message_still_counts_its_model_calls() {
    let harness = TestHarness::builder()
        .with_script(vec![
            Ok(TOP_FIVE_QUERY.to_string()),
            Err(CoreBrainError::provider("400 invalid_request_error")),
        ])
        .build()
        .await
        .unwrap();
    let ctx = harness.context(PermissionLevel::Read);
    let chat = &harness.services.chat;

    let conversation = chat.create_conversation(&ctx, None, None).await.unwrap();
    let err = chat
        .send_message(&ctx, &conversation.id, "top 5 best-selling products".into(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreBrainError::Provider { .. }));

    let thread = chat.get_conversation(&ctx, &conversation.id).await.unwrap();
    let totals = harness
        .services
        .orchestrator
        .accountant()
        .conversation_totals(&conversation.id)
        .await
        .unwrap();
    assert_eq!(totals.calls, 1);
    assert_eq!(thread.conversation.metadata["api_calls"], 1);
    assert_eq!(
        thread.conversation.metadata["tokens"]["total"],
        totals.total_tokens()
    );
    let cost = thread.conversation.metadata["cost"].as_f64().unwrap();
    assert!((cost - totals.cost_usd()).abs() < 1e-9);
    // Only the user turn was stored.
    assert_eq!(thread.messages.len(), 1);
    assert_eq!(chat.locks().tracked(), 0);
}

#[tokio::test]
async fn conversations_are_private_to_their_owner() {
    let harness = TestHarness::builder().build().await.unwrap();
    let owner = harness.context(PermissionLevel::Read);
    let other = harness
        .config
        .access
        .context_for("someone-else", PermissionLevel::Write, None);
    let chat = &harness.services.chat;

    let conversation = chat.create_conversation(&owner, None, None).await.unwrap();
    assert_eq!(conversation.title, "New conversation");

    let err = chat.get_conversation(&other, &conversation.id).await.unwrap_err();
    assert!(matches!(err, CoreBrainError::NotFound(_)));
    let err = chat
        .send_message(&other, &conversation.id, "hello".into(), None)
        .await
        .unwrap_err();
    assert_eq!(err.status_class().code(), 404);
    assert!(chat.list_conversations(&other).await.unwrap().is_empty());

    let admin = harness.context(PermissionLevel::Admin);
    assert!(chat.get_conversation(&admin, &conversation.id).await.is_ok());
}

#[tokio::test]
async fn every_adapter_reports_healthy() {
    let harness = TestHarness::builder().build().await.unwrap();
    let health = harness.services.adapter_health().await;
    let names: Vec<&str> = health.iter().map(|h| h.name.as_str()).collect();
    assert_eq!(names, ["mock-provider", "counting", "sqlite"]);
    assert!(health.iter().all(|h| h.is_healthy()));
}
