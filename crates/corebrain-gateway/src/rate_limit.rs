// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-client request throttling.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::Response,
};
use corebrain_core::CoreBrainError;
use corebrain_resilience::RateDecision;

use crate::auth::{key_prefix, presented_key};
use crate::error::ApiError;
use crate::server::AppState;

const CLIENT_KEY_CHARS: usize = 10;

/// Bucket key for a request: the API key's first characters, else the peer address.
pub fn client_id(request: &Request) -> String {
    if let Some(key) = presented_key(request.headers()) {
        let prefix: String = key.chars().take(CLIENT_KEY_CHARS).collect();
        return format!("key:{prefix}");
    }
    match request.extensions().get::<ConnectInfo<SocketAddr>>() {
        Some(ConnectInfo(addr)) => format!("ip:{}", addr.ip()),
        None => "anonymous".to_string(),
    }
}

/// `client` with any key characters cut down to the prefix shown in logs.
pub fn log_label(client: &str) -> String {
    match client.strip_prefix("key:") {
        Some(key) => format!("key:{}", key_prefix(key)),
        None => client.to_string(),
    }
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = &state.rate_limiter else {
        return Ok(next.run(request).await);
    };
    let client = client_id(&request);
    match limiter.check(&client) {
        RateDecision::Allowed { .. } => Ok(next.run(request).await),
        RateDecision::Limited { retry_after } => {
            tracing::warn!(
                client = %log_label(&client),
                retry_after_ms = retry_after.as_millis() as u64,
                "rate limit exceeded"
            );
            Err(CoreBrainError::RateLimited { retry_after }.into())
        }
    }
}
