// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP client for the Anthropic Messages API.
//!
//! One call is one POST. Failures are classified as retryable (transport
//! errors, 429 and 5xx overload codes) or not; the AI gateway owns retries.

use std::time::Duration;

use corebrain_core::CoreBrainError;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use tracing::debug;

use crate::types::{ApiErrorBody, MessageRequest, MessageResponse};

/// Path of the Messages endpoint below the base URL.
const MESSAGES_PATH: &str = "/v1/messages";

/// Thin wrapper over a `reqwest::Client` preloaded with auth headers.
#[derive(Debug, Clone)]
pub struct AnthropicClient {
    client: reqwest::Client,
    url: String,
}

fn provider_err<E>(message: String, retryable: bool, source: E) -> CoreBrainError
where
    E: std::error::Error + Send + Sync + 'static,
{
    CoreBrainError::Provider {
        message,
        retryable,
        source: Some(Box::new(source)),
    }
}

fn header_value(name: &str, value: &str) -> Result<HeaderValue, CoreBrainError> {
    HeaderValue::from_str(value)
        .map_err(|e| CoreBrainError::Config(format!("{name} is not a valid header value: {e}")))
}

impl AnthropicClient {
    /// `base_url` is the API origin; the messages path is appended here.
    pub fn new(
        api_key: &str,
        api_version: &str,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, CoreBrainError> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", header_value("anthropic.api_key", api_key)?);
        headers.insert("anthropic-version", header_value("anthropic.api_version", api_version)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|e| provider_err(format!("failed to build HTTP client: {e}"), false, e))?;

        Ok(Self {
            client,
            url: format!("{}{MESSAGES_PATH}", base_url.trim_end_matches('/')),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// One non-streaming POST. Never retries.
    pub async fn complete_message(
        &self,
        request: &MessageRequest,
    ) -> Result<MessageResponse, CoreBrainError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let transient = e.is_timeout() || e.is_connect() || e.is_request();
                provider_err(format!("HTTP request failed: {e}"), transient, e)
            })?;

        let status = response.status();
        debug!(status = %status, model = %request.model, "completion response received");

        if !status.is_success() {
            return Err(failure(response).await);
        }
        let body = response
            .text()
            .await
            .map_err(|e| provider_err(format!("failed to read response body: {e}"), true, e))?;
        serde_json::from_str(&body)
            .map_err(|e| provider_err(format!("failed to parse API response: {e}"), false, e))
    }
}

/// Turn a non-2xx reply into a provider error, keeping any `retry-after` hint.
async fn failure(response: reqwest::Response) -> CoreBrainError {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = response.text().await.unwrap_or_default();

    let mut message = match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(api_err) => api_err.to_string(),
        Err(_) => format!("API returned {status}: {body}"),
    };
    if let Some(secs) = retry_after {
        message.push_str(&format!(" (retry after {secs}s)"));
    }
    CoreBrainError::Provider {
        message,
        retryable: is_transient_error(status),
        source: None,
    }
}

/// Rate limiting, server faults and Anthropic's 529 overload code.
pub fn is_transient_error(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS
        || matches!(status.as_u16(), 500 | 502 | 503 | 529)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ApiMessage;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> AnthropicClient {
        AnthropicClient::new(
            "test-api-key",
            "2023-06-01",
            base_url,
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn test_request() -> MessageRequest {
        MessageRequest {
            model: "claude-3-haiku-20240307".into(),
            messages: vec![ApiMessage {
                role: "user".into(),
                content: "Hello".into(),
            }],
            system: Some("Be brief.".into()),
            max_tokens: 1024,
            temperature: Some(0.2),
        }
    }

    fn success_body(id: &str, text: &str) -> serde_json::Value {
        serde_json::json!({
            "id": id,
            "type": "message",
            "role": "assistant",
            "content": [{"type": "text", "text": text}],
            "model": "claude-3-haiku-20240307",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        })
    }

    #[tokio::test]
    async fn complete_message_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(body_partial_json(serde_json::json!({"system": "Be brief."})))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("msg_test", "Hi")))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let result = client.complete_message(&test_request()).await.unwrap();
        assert_eq!(result.id, "msg_test");
        assert_eq!(result.usage.input_tokens, 10);
        assert_eq!(result.text(), "Hi");
    }

    #[tokio::test]
    async fn rate_limit_is_retryable_and_not_retried_here() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "7")
                    .set_body_json(serde_json::json!({
                        "error": {"type": "rate_limit_error", "message": "Rate limited"}
                    })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete_message(&test_request()).await.unwrap_err();
        assert!(err.is_retryable());
        let msg = err.to_string();
        assert!(msg.contains("rate_limit_error"), "got: {msg}");
        assert!(msg.contains("retry after 7s"), "got: {msg}");
    }

    #[tokio::test]
    async fn bad_request_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": {"type": "invalid_request_error", "message": "Bad model"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete_message(&test_request()).await.unwrap_err();
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("invalid_request_error"));
    }

    #[tokio::test]
    async fn overloaded_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(529).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete_message(&test_request()).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("529"));
    }

    #[tokio::test]
    async fn malformed_body_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let err = client.complete_message(&test_request()).await.unwrap_err();
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn connection_refused_is_retryable() {
        // A freshly released port has no listener behind it.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = test_client(&format!("http://{addr}"));
        let err = client.complete_message(&test_request()).await.unwrap_err();
        assert!(err.is_retryable(), "got: {err}");
    }

    #[tokio::test]
    async fn client_sends_correct_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", "2023-06-01"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_body("msg_h", "ok")))
            .mount(&server)
            .await;

        let client = test_client(&format!("{}/", server.uri()));
        let result = client.complete_message(&test_request()).await;
        assert!(result.is_ok(), "headers should match: {result:?}");
    }
}
