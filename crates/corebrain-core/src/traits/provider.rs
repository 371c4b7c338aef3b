// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Provider adapter trait for language-model integrations.

use async_trait::async_trait;

use crate::error::CoreBrainError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{ProviderRequest, ProviderResponse};

/// Adapter for a language-model provider.
///
/// Implementations perform exactly one network round-trip per call and
/// classify failures via [`CoreBrainError::Provider::retryable`]; retry
/// policy belongs to the AI gateway.
#[async_trait]
pub trait ProviderAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response.
    async fn complete(&self, request: ProviderRequest)
    -> Result<ProviderResponse, CoreBrainError>;
}
