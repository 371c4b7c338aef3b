// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `corebrain serve` and shared service construction.

use std::sync::Arc;

use corebrain_anthropic::AnthropicProvider;
use corebrain_config::CoreBrainConfig;
use corebrain_core::CoreBrainError;
use corebrain_gateway::AppState;
use corebrain_pipeline::Services;
use tracing::{info, warn};

use crate::shutdown;

/// Open the stores and wire the pipeline around the Anthropic provider.
pub async fn build_services(config: &CoreBrainConfig) -> Result<Services, CoreBrainError> {
    let provider = Arc::new(AnthropicProvider::new(&config.anthropic)?);
    Services::from_config(config, provider).await
}

/// Serve the HTTP API until SIGINT or SIGTERM.
pub async fn run_serve(config: CoreBrainConfig) -> Result<(), CoreBrainError> {
    info!("starting corebrain serve");

    if config.api_keys.iter().all(|k| !k.active) {
        warn!("no active API keys configured, every API request will be rejected");
    }

    let services = Arc::new(build_services(&config).await?);
    for adapter in services.adapter_health().await {
        if adapter.is_healthy() {
            info!(adapter = %adapter.name, kind = %adapter.kind, version = %adapter.version, "adapter ready");
        } else {
            warn!(adapter = %adapter.name, kind = %adapter.kind, status = ?adapter.status, "adapter not healthy at startup");
        }
    }
    let state = AppState::new(services.clone(), Arc::new(config));

    let token = shutdown::install_signal_handler();
    let served = corebrain_gateway::serve(state, token).await;

    info!("closing services");
    shutdown::close_within(services.shutdown(), shutdown::CLOSE_GRACE).await;
    served
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set. Logs go to stderr so command output on stdout
/// stays machine-readable.
pub fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("corebrain={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .with_writer(std::io::stderr)
        .init();
}
