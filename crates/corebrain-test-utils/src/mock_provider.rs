// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock model provider for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with a pre-configured script
//! of replies and failures, enabling fast, CI-runnable tests without
//! external API calls.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use corebrain_core::{
    AdapterType, CoreBrainError, HealthStatus, PluginAdapter, ProviderAdapter, ProviderRequest,
    ProviderResponse, TokenUsage,
};

/// Reply used once the script runs out.
pub const DEFAULT_REPLY: &str = "mock response";

/// Tokens reported for every successful call unless overridden.
pub const DEFAULT_USAGE: TokenUsage = TokenUsage {
    input_tokens: 10,
    output_tokens: 20,
};

/// A mock provider that replays a FIFO script.
///
/// Each call pops one entry: `Ok(text)` becomes a reply, `Err(e)` is
/// returned as-is. An optional delay queue makes individual calls slow.
pub struct MockProvider {
    script: Mutex<VecDeque<Result<String, CoreBrainError>>>,
    delays: Mutex<VecDeque<Duration>>,
    requests: Mutex<Vec<ProviderRequest>>,
    calls: AtomicUsize,
    usage: TokenUsage,
}

impl MockProvider {
    /// Create a mock provider with an empty script.
    pub fn new() -> Self {
        Self::scripted(Vec::new())
    }

    /// Create a mock provider pre-loaded with successful replies.
    pub fn with_responses(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(Ok).collect())
    }

    /// Create a mock provider replaying replies and failures in order.
    pub fn scripted(script: Vec<Result<String, CoreBrainError>>) -> Self {
        Self {
            script: Mutex::new(VecDeque::from(script)),
            delays: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            usage: DEFAULT_USAGE,
        }
    }

    /// Delay the n-th call by the n-th duration.
    pub fn with_delays(mut self, delays: Vec<Duration>) -> Self {
        self.delays = Mutex::new(VecDeque::from(delays));
        self
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Add a reply to the end of the script.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.script.lock().await.push_back(Ok(text.into()));
    }

    /// Add a failure to the end of the script.
    pub async fn add_error(&self, error: CoreBrainError) {
        self.script.lock().await.push_back(Err(error));
    }

    /// Calls received so far, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received, in order.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CoreBrainError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CoreBrainError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, CoreBrainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let model = request.model.clone();
        self.requests.lock().await.push(request);

        // Claimed before the delay so a call abandoned mid-sleep still uses up its reply.
        let next = self.script.lock().await.pop_front();
        let delay = self.delays.lock().await.pop_front();
        if let Some(delay) = delay {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        let text = next.unwrap_or_else(|| Ok(DEFAULT_REPLY.to_string()))?;
        Ok(ProviderResponse {
            id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
            content: text,
            model,
            stop_reason: Some("end_turn".to_string()),
            usage: self.usage,
        })
    }
}
