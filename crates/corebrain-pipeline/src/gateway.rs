// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The AI gateway: the only caller of the model provider.
//!
//! Each attempt holds a model permit and is bounded by the call timeout.
//! Only retryable provider failures (transport, timeouts, overload codes)
//! are retried, with exponential backoff. Malformed model output is not a
//! gateway failure; [`AiGateway::elicit`] reports it as "no candidate".

use std::sync::Arc;
use std::time::Duration;

use corebrain_config::model::AnthropicConfig;
use corebrain_core::{CoreBrainError, ProviderAdapter, ProviderRequest, ProviderResponse};
use corebrain_query::{Candidate, parse_candidate};
use corebrain_resilience::{Backoff, ConcurrencyLimiter};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct AiGateway {
    provider: Arc<dyn ProviderAdapter>,
    limiter: ConcurrencyLimiter,
    timeout: Duration,
    max_retries: u32,
    backoff: Backoff,
    shutdown: CancellationToken,
}

impl AiGateway {
    pub fn new(
        provider: Arc<dyn ProviderAdapter>,
        limiter: ConcurrencyLimiter,
        timeout: Duration,
        max_retries: u32,
        backoff: Backoff,
    ) -> Self {
        Self {
            provider,
            limiter,
            timeout,
            max_retries,
            backoff,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn from_config(
        provider: Arc<dyn ProviderAdapter>,
        limiter: ConcurrencyLimiter,
        config: &AnthropicConfig,
    ) -> Self {
        let base = Duration::from_millis(config.retry_base_delay_ms);
        Self::new(
            provider,
            limiter,
            Duration::from_secs(config.timeout_secs),
            config.max_retries,
            Backoff::new(base, base.saturating_mul(16)),
        )
    }

    pub fn provider(&self) -> &Arc<dyn ProviderAdapter> {
        &self.provider
    }

    /// Send `request`, retrying transport-level failures.
    pub async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, CoreBrainError> {
        let mut attempt = 0u32;
        loop {
            match self.attempt(request.clone()).await {
                Ok(response) => {
                    debug!(
                        attempt,
                        model = %response.model,
                        input_tokens = response.usage.input_tokens,
                        output_tokens = response.usage.output_tokens,
                        "model call completed"
                    );
                    return Ok(response);
                }
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!(attempt, error = %e, "model call failed, retrying");
                    if !self.backoff.wait(attempt, &self.shutdown).await {
                        return Err(CoreBrainError::Provider {
                            message: "gateway shutting down".into(),
                            retryable: false,
                            source: Some(Box::new(e)),
                        });
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Phase-1 call: the reply plus the candidate query it contains, if any.
    pub async fn elicit(
        &self,
        request: ProviderRequest,
    ) -> Result<(Option<Candidate>, ProviderResponse), CoreBrainError> {
        let response = self.complete(request).await?;
        let candidate = parse_candidate(&response.content);
        if candidate.is_none() {
            debug!(reply_chars = response.content.len(), "no query candidate in model reply");
        }
        Ok((candidate, response))
    }

    /// Stop pending backoff waits.
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    async fn attempt(&self, request: ProviderRequest) -> Result<ProviderResponse, CoreBrainError> {
        let _permit = self.limiter.acquire().await?;
        match tokio::time::timeout(self.timeout, self.provider.complete(request)).await {
            Ok(result) => result,
            Err(_) => Err(CoreBrainError::Provider {
                message: format!("model call timed out after {}ms", self.timeout.as_millis()),
                retryable: true,
                source: None,
            }),
        }
    }
}
