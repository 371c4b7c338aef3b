// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! API key authentication.
//!
//! The `X-API-Key` header resolves through the configured keys into a
//! [`PermissionContext`], which is attached to the request extensions for
//! handlers to extract. Keys restricted to domains also require an `Origin`
//! (or `Referer`) header naming an allowed host.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use corebrain_core::{CoreBrainError, PermissionContext, PermissionLevel};

use crate::error::ApiError;
use crate::server::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

const LOGGED_KEY_CHARS: usize = 5;

/// The presented API key, if any.
pub fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|k| !k.is_empty())
}

/// First characters of a key, safe to log.
pub fn key_prefix(key: &str) -> String {
    key.chars().take(LOGGED_KEY_CHARS).collect()
}

/// Host named by the `Origin` header, falling back to `Referer`.
pub fn request_host(headers: &HeaderMap) -> Option<String> {
    let raw = headers
        .get("origin")
        .or_else(|| headers.get("referer"))
        .and_then(|v| v.to_str().ok())?;
    let rest = raw.split_once("://").map_or(raw, |(_, rest)| rest);
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = match authority.rsplit_once(':') {
        Some((host, port)) if port.chars().all(|c| c.is_ascii_digit()) => host,
        _ => authority,
    };
    (!host.is_empty()).then(|| host.to_ascii_lowercase())
}

/// Middleware resolving the caller from `X-API-Key`. Fails closed.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(key) = presented_key(request.headers()) else {
        return Err(ApiError::unauthorized("missing API key"));
    };
    let Some(ctx) = state.config.resolve_api_key(key) else {
        tracing::warn!(key_prefix = %key_prefix(key), "invalid API key");
        return Err(ApiError::unauthorized("invalid API key"));
    };

    if !ctx.allowed_domains.is_empty() {
        let allowed = request_host(request.headers())
            .as_deref()
            .is_some_and(|host| ctx.domain_allowed(host));
        if !allowed {
            tracing::warn!(caller = %ctx.caller_id, "request origin not allowed");
            return Err(ApiError::new(
                StatusCode::FORBIDDEN,
                "origin not allowed for this API key",
            ));
        }
    }

    tracing::debug!(caller = %ctx.caller_id, level = %ctx.level, "caller authenticated");
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}

/// Refuse callers below `required`.
pub fn require_level(ctx: &PermissionContext, required: PermissionLevel) -> Result<(), ApiError> {
    if ctx.level >= required {
        Ok(())
    } else {
        Err(CoreBrainError::PermissionDenied(format!(
            "{required} permission required, caller has {}",
            ctx.level
        ))
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn origin_host_is_extracted() {
        assert_eq!(
            request_host(&headers(&[("origin", "https://App.Example.com:8443")])).as_deref(),
            Some("app.example.com")
        );
        assert_eq!(
            request_host(&headers(&[("referer", "http://example.com/page?x=1")])).as_deref(),
            Some("example.com")
        );
        assert_eq!(request_host(&headers(&[])), None);
    }

    #[test]
    fn origin_wins_over_referer() {
        let h = headers(&[
            ("origin", "https://a.test"),
            ("referer", "https://b.test/x"),
        ]);
        assert_eq!(request_host(&h).as_deref(), Some("a.test"));
    }

    #[test]
    fn blank_keys_count_as_missing() {
        assert_eq!(presented_key(&headers(&[("x-api-key", "  ")])), None);
        assert_eq!(presented_key(&headers(&[("x-api-key", "cb_123")])), Some("cb_123"));
    }

    #[test]
    fn key_prefix_is_short() {
        assert_eq!(key_prefix("cb_live_0123456789"), "cb_li");
        assert_eq!(key_prefix("ab"), "ab");
    }

    #[test]
    fn levels_are_cumulative() {
        let admin = PermissionContext::new("a", PermissionLevel::Admin, vec![]);
        let read = PermissionContext::new("r", PermissionLevel::Read, vec![]);
        assert!(require_level(&admin, PermissionLevel::Write).is_ok());
        let err = require_level(&read, PermissionLevel::Write).unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
    }
}
