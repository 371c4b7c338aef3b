// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sanitizer rejection reasons.

use corebrain_core::CoreBrainError;
use thiserror::Error;

/// Why a candidate query was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    /// An operation, stage, or operator outside the allow-list.
    #[error("unsafe operator: {0}")]
    UnsafeOperator(String),

    /// A field absent from the collection schema or hidden from the caller.
    #[error("unknown field '{field}' in collection '{collection}'")]
    UnknownField { collection: String, field: String },

    /// The target collection is outside the caller's allow-list.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The candidate does not fit the expected shape (wrong value types,
    /// missing collection, invalid regex). Handled like a parse failure.
    #[error("malformed query: {0}")]
    Malformed(String),
}

impl RejectionReason {
    pub(crate) fn unsupported(op: &str) -> Self {
        Self::UnsafeOperator(format!("operator `{op}` is not in the allow-list"))
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }

    /// Short machine-readable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnsafeOperator(_) => "unsafe_operator",
            Self::UnknownField { .. } => "unknown_field",
            Self::PermissionDenied(_) => "permission_denied",
            Self::Malformed(_) => "malformed",
        }
    }
}

impl From<RejectionReason> for CoreBrainError {
    fn from(reason: RejectionReason) -> Self {
        match reason {
            RejectionReason::UnsafeOperator(m) => CoreBrainError::UnsafeOperator(m),
            RejectionReason::UnknownField { collection, field } => {
                CoreBrainError::UnknownField { collection, field }
            }
            RejectionReason::PermissionDenied(m) => CoreBrainError::PermissionDenied(m),
            RejectionReason::Malformed(m) => CoreBrainError::BadRequest(m),
        }
    }
}
