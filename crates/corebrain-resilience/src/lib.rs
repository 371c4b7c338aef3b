// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Resilience primitives for CoreBrain.
//!
//! - [`ConcurrencyLimiter`] bounds in-flight calls to a collaborator.
//! - [`RateLimiter`] is a per-client token bucket.
//! - [`Backoff`] computes retry delays.

pub mod backoff;
pub mod limiter;
pub mod rate_limit;

pub use backoff::Backoff;
pub use limiter::{ConcurrencyLimiter, LimiterPools};
pub use rate_limit::{RateDecision, RateLimiter};
