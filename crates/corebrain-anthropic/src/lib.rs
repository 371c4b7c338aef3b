// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Anthropic Claude provider adapter for CoreBrain.
//!
//! This crate implements [`ProviderAdapter`] for the Anthropic Messages API.
//! It performs one request per call; retry and backoff live in the AI gateway.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use corebrain_config::model::AnthropicConfig;
use corebrain_core::{
    AdapterType, CoreBrainError, HealthStatus, PluginAdapter, ProviderAdapter, ProviderRequest,
    ProviderResponse, TokenUsage,
};
use tracing::{debug, info};

use crate::client::AnthropicClient;
use crate::types::{ApiMessage, MessageRequest};

/// Anthropic Claude provider implementing [`ProviderAdapter`].
pub struct AnthropicProvider {
    client: AnthropicClient,
    model: String,
}

impl AnthropicProvider {
    /// Creates a provider from configuration.
    ///
    /// The key comes from `anthropic.api_key`; the config loader already
    /// falls back to `ANTHROPIC_API_KEY`.
    pub fn new(config: &AnthropicConfig) -> Result<Self, CoreBrainError> {
        let api_key = resolve_api_key(config.api_key.as_deref())?;
        let client = AnthropicClient::new(
            &api_key,
            &config.api_version,
            &config.base_url,
            Duration::from_secs(config.timeout_secs),
        )?;

        info!(
            model = %config.model,
            key_prefix = %key_prefix(&api_key),
            "Anthropic provider initialized"
        );

        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }

    pub fn with_client(client: AnthropicClient, model: String) -> Self {
        Self { client, model }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn to_message_request(&self, request: &ProviderRequest) -> MessageRequest {
        let model = if request.model.is_empty() {
            self.model.clone()
        } else {
            request.model.clone()
        };
        MessageRequest {
            model,
            messages: request
                .messages
                .iter()
                .map(|m| ApiMessage {
                    role: m.role.clone(),
                    content: m.content.clone(),
                })
                .collect(),
            system: request.system.clone(),
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl PluginAdapter for AnthropicProvider {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, CoreBrainError> {
        // No API call: health checks must not consume tokens.
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), CoreBrainError> {
        debug!("Anthropic provider shutting down");
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, CoreBrainError> {
        let api_request = self.to_message_request(&request);
        let response = self.client.complete_message(&api_request).await?;

        Ok(ProviderResponse {
            content: response.text(),
            id: response.id,
            model: response.model,
            stop_reason: response.stop_reason,
            usage: TokenUsage {
                input_tokens: response.usage.input_tokens,
                output_tokens: response.usage.output_tokens,
            },
        })
    }
}

fn resolve_api_key(config_key: Option<&str>) -> Result<String, CoreBrainError> {
    match config_key {
        Some(key) if !key.is_empty() => Ok(key.to_string()),
        _ => Err(CoreBrainError::Config(
            "Anthropic API key not found. Set anthropic.api_key in config or ANTHROPIC_API_KEY environment variable.".into(),
        )),
    }
}

/// First five characters of a key, for logs.
pub fn key_prefix(key: &str) -> String {
    let prefix: String = key.chars().take(5).collect();
    format!("{prefix}...")
}
