// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use corebrain_config::CoreBrainConfig;
use corebrain_core::CoreBrainError;
use corebrain_pipeline::Services;
use corebrain_resilience::RateLimiter;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{API_KEY_HEADER, auth_middleware};
use crate::handlers;
use crate::rate_limit::rate_limit_middleware;

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    pub services: Arc<Services>,
    pub config: Arc<CoreBrainConfig>,
    /// `None` when rate limiting is disabled.
    pub rate_limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(services: Arc<Services>, config: Arc<CoreBrainConfig>) -> Self {
        let rate_limiter = config.rate_limit.enabled.then(|| {
            Arc::new(RateLimiter::new(
                config.rate_limit.requests_per_minute,
                config.rate_limit.burst,
            ))
        });
        Self {
            services,
            config,
            rate_limiter,
        }
    }
}

/// Build the application router.
///
/// - GET /health (public)
/// - POST /api/database/query
/// - GET /api/database/collections
/// - POST /api/database/schema/refresh
/// - GET, POST /api/chat/conversations
/// - GET /api/chat/conversations/{id}
/// - POST /api/chat/conversations/{id}/messages
/// - GET /api/cost/conversations/{id}
/// - GET /api/cost/daily
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new().route("/health", get(handlers::health));

    // Rate limiting wraps authentication so that bad keys are throttled too.
    let api_routes = Router::new()
        .route("/api/database/query", post(handlers::post_query))
        .route("/api/database/collections", get(handlers::get_collections))
        .route("/api/database/schema/refresh", post(handlers::refresh_schema))
        .route(
            "/api/chat/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route("/api/chat/conversations/{id}", get(handlers::get_conversation))
        .route(
            "/api/chat/conversations/{id}/messages",
            post(handlers::post_message),
        )
        .route("/api/cost/conversations/{id}", get(handlers::conversation_cost))
        .route("/api/cost/daily", get(handlers::daily_cost))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ));

    let cors = cors_layer(&state.config.server.cors_origins);
    let mut app = Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http());
    if let Some(cors) = cors {
        app = app.layer(cors);
    }
    app
}

/// CORS for the configured origins. `*` allows any origin.
pub fn cors_layer(origins: &[String]) -> Option<CorsLayer> {
    if origins.is_empty() {
        return None;
    }
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<HeaderValue> = origins
            .iter()
            .filter_map(|o| match HeaderValue::from_str(o) {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(parsed)
    };
    Some(
        CorsLayer::new()
            .allow_origin(allow_origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)]),
    )
}

/// Serve until `shutdown` is cancelled, then drain in-flight requests.
pub async fn serve(state: AppState, shutdown: CancellationToken) -> Result<(), CoreBrainError> {
    let addr = format!(
        "{}:{}",
        state.config.server.host, state.config.server.port
    );

    if let Some(limiter) = state.rate_limiter.clone() {
        let token = shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PRUNE_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => limiter.prune_idle(Instant::now()),
                }
            }
        });
    }

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CoreBrainError::Config(format!("failed to bind {addr}: {e}")))?;

    tracing::info!("HTTP API listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move { shutdown.cancelled().await })
    .await
    .map_err(|e| CoreBrainError::Internal(format!("server error: {e}")))?;

    tracing::info!("HTTP API stopped");
    Ok(())
}
