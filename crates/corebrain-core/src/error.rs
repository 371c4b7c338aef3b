// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the CoreBrain query pipeline.

use std::time::Duration;

use thiserror::Error;

/// Boxed error source carried by storage, provider, and execution failures.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The primary error type used across all CoreBrain adapter traits and pipeline stages.
#[derive(Debug, Error)]
pub enum CoreBrainError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence backend errors (conversation store, cost ledger, document store I/O).
    #[error("storage error: {source}")]
    Storage { source: BoxError },

    /// Model provider errors. `retryable` marks transport-level failures
    /// (connect errors, timeouts, 429/5xx) as opposed to malformed requests.
    #[error("AI gateway error: {message}")]
    Provider {
        message: String,
        retryable: bool,
        source: Option<BoxError>,
    },

    /// The data store failed or timed out while running an approved query.
    #[error("execution error: {message}")]
    Execution {
        message: String,
        source: Option<BoxError>,
    },

    /// The candidate query used an operator or stage outside the allow-list.
    #[error("unsafe operator: {0}")]
    UnsafeOperator(String),

    /// The candidate query referenced a field absent from the collection schema.
    #[error("unknown field '{field}' in collection '{collection}'")]
    UnknownField { collection: String, field: String },

    /// The caller may not access the named collection or operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The caller exceeded its request quota.
    #[error("rate limit exceeded, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Response cache failure. Always soft: callers degrade to a miss.
    #[error("cache error: {0}")]
    Cache(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Unknown conversation or other resource.
    #[error("not found: {0}")]
    NotFound(String),

    /// Malformed caller input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

/// HTTP-style status class of a [`CoreBrainError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    TooManyRequests,
    Internal,
}

impl StatusClass {
    /// Numeric HTTP status code for this class.
    pub fn code(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::Unauthorized => 401,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::TooManyRequests => 429,
            Self::Internal => 500,
        }
    }
}

impl CoreBrainError {
    /// Shorthand for a non-retryable provider error.
    pub fn provider(message: impl Into<String>) -> Self {
        Self::Provider {
            message: message.into(),
            retryable: false,
            source: None,
        }
    }

    /// Shorthand for an execution error without a source.
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
            source: None,
        }
    }

    /// Whether resubmitting the same request may succeed.
    ///
    /// Execution failures are retryable by the caller, never silently by the pipeline.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { retryable, .. } => *retryable,
            Self::Execution { .. } | Self::Timeout { .. } | Self::RateLimited { .. } => true,
            _ => false,
        }
    }

    /// Whether the failure comes from the query sanitizer.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::UnsafeOperator(_) | Self::UnknownField { .. } | Self::PermissionDenied(_)
        )
    }

    /// Whether the caller is always shown this failure with its specific code.
    pub fn is_user_visible(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied(_)
                | Self::RateLimited { .. }
                | Self::BadRequest(_)
                | Self::NotFound(_)
        )
    }

    /// Maps the error onto the outbound status classes.
    pub fn status_class(&self) -> StatusClass {
        match self {
            Self::BadRequest(_) | Self::UnsafeOperator(_) | Self::UnknownField { .. } => {
                StatusClass::BadRequest
            }
            Self::PermissionDenied(_) => StatusClass::Forbidden,
            Self::NotFound(_) => StatusClass::NotFound,
            Self::RateLimited { .. } => StatusClass::TooManyRequests,
            _ => StatusClass::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classes_cover_outbound_codes() {
        assert_eq!(CoreBrainError::BadRequest("x".into()).status_class().code(), 400);
        assert_eq!(
            CoreBrainError::PermissionDenied("orders".into()).status_class().code(),
            403
        );
        assert_eq!(CoreBrainError::NotFound("c1".into()).status_class().code(), 404);
        assert_eq!(
            CoreBrainError::RateLimited {
                retry_after: Duration::from_secs(1)
            }
            .status_class()
            .code(),
            429
        );
        assert_eq!(CoreBrainError::execution("boom").status_class().code(), 500);
        assert_eq!(CoreBrainError::provider("boom").status_class().code(), 500);
    }

    #[test]
    fn retryable_classification() {
        assert!(CoreBrainError::execution("store down").is_retryable());
        assert!(
            CoreBrainError::Provider {
                message: "503".into(),
                retryable: true,
                source: None,
            }
            .is_retryable()
        );
        assert!(!CoreBrainError::provider("400 bad request").is_retryable());
        assert!(!CoreBrainError::PermissionDenied("orders".into()).is_retryable());
    }

    #[test]
    fn permission_and_rate_limit_failures_are_user_visible() {
        assert!(CoreBrainError::PermissionDenied("orders".into()).is_user_visible());
        assert!(
            CoreBrainError::RateLimited {
                retry_after: Duration::from_secs(3)
            }
            .is_user_visible()
        );
        assert!(!CoreBrainError::execution("store down").is_user_visible());
        assert!(!CoreBrainError::Cache("poisoned".into()).is_user_visible());
    }

    #[test]
    fn sanitizer_errors_are_rejections() {
        assert!(CoreBrainError::UnsafeOperator("$where".into()).is_rejection());
        assert!(
            CoreBrainError::UnknownField {
                collection: "products".into(),
                field: "secret".into(),
            }
            .is_rejection()
        );
        assert!(!CoreBrainError::Cache("poisoned".into()).is_rejection());
    }

    #[test]
    fn display_includes_context() {
        let err = CoreBrainError::UnknownField {
            collection: "products".into(),
            field: "ssn".into(),
        };
        assert_eq!(err.to_string(), "unknown field 'ssn' in collection 'products'");
    }
}
