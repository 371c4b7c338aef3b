// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP API for the CoreBrain pipeline.
//!
//! Every route except `/health` requires an `X-API-Key` that resolves to a
//! permission context. Failures render as `{detail}` with the status class
//! of the underlying error.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod server;

pub use error::{ApiError, ErrorResponse};
pub use server::{AppState, cors_layer, router, serve};
