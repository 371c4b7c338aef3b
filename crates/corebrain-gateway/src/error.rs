// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `{detail}` error bodies.

use std::time::Duration;

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use corebrain_core::CoreBrainError;
use serde::{Deserialize, Serialize};

/// Error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// A failed request, rendered as a status code and a `{detail}` body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
    retry_after_secs: Option<u64>,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
            retry_after_secs: None,
        }
    }

    /// Missing or unknown credentials.
    pub fn unauthorized(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, detail)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn detail(&self) -> &str {
        &self.detail
    }

    pub fn retry_after_secs(&self) -> Option<u64> {
        self.retry_after_secs
    }
}

/// Whole seconds to wait, rounded up, never zero.
pub fn retry_after_secs(retry_after: Duration) -> u64 {
    (retry_after.as_secs_f64().ceil() as u64).max(1)
}

impl From<CoreBrainError> for ApiError {
    fn from(err: CoreBrainError) -> Self {
        let status = StatusCode::from_u16(err.status_class().code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if err.is_user_visible() {
            tracing::debug!(status = status.as_u16(), error = %err, "request refused");
        } else {
            tracing::error!(status = status.as_u16(), error = %err, "request failed");
        }
        let retry_after_secs = match &err {
            CoreBrainError::RateLimited { retry_after } => Some(retry_after_secs(*retry_after)),
            _ => None,
        };
        Self {
            status,
            detail: err.to_string(),
            retry_after_secs,
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(StatusCode::BAD_REQUEST, rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response = (
            self.status,
            Json(ErrorResponse {
                detail: self.detail,
            }),
        )
            .into_response();
        if let Some(secs) = self.retry_after_secs {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn core_errors_map_to_status_classes() {
        let err = ApiError::from(CoreBrainError::PermissionDenied("orders".into()));
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert!(err.detail().contains("orders"));

        let err = ApiError::from(CoreBrainError::execution("store timed out"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.retry_after_secs(), None);
    }

    #[test]
    fn rate_limited_errors_carry_retry_after() {
        let err = ApiError::from(CoreBrainError::RateLimited {
            retry_after: Duration::from_millis(1200),
        });
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(err.retry_after_secs(), Some(2));

        let response = err.into_response();
        assert_eq!(response.headers()[header::RETRY_AFTER], "2");
    }

    #[test]
    fn retry_after_is_at_least_one_second() {
        assert_eq!(retry_after_secs(Duration::from_millis(10)), 1);
        assert_eq!(retry_after_secs(Duration::from_secs(3)), 3);
    }
}
