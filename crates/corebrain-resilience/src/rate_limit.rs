// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-client token bucket.
//!
//! Each client starts with `burst` tokens and refills at
//! `requests_per_minute / 60` tokens per second, never above `burst`.
//! A request costs one token.

use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy)]
struct Bucket {
    tokens: f64,
    last_check: Instant,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RateDecision {
    Allowed { remaining: f64 },
    Limited { retry_after: Duration },
}

/// Token buckets keyed by client identifier.
#[derive(Debug)]
pub struct RateLimiter {
    capacity: f64,
    tokens_per_second: f64,
    buckets: DashMap<String, Bucket>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        Self {
            capacity: f64::from(burst.max(1)),
            tokens_per_second: f64::from(requests_per_minute.max(1)) / 60.0,
            buckets: DashMap::new(),
        }
    }

    /// Consume one token for `client_id`.
    pub fn check(&self, client_id: &str) -> RateDecision {
        self.check_at(client_id, Instant::now())
    }

    /// [`Self::check`] against an explicit clock reading.
    pub fn check_at(&self, client_id: &str, now: Instant) -> RateDecision {
        let mut entry = self
            .buckets
            .entry(client_id.to_string())
            .or_insert(Bucket {
                tokens: self.capacity,
                last_check: now,
            });

        let elapsed = now.saturating_duration_since(entry.last_check).as_secs_f64();
        let tokens = (entry.tokens + elapsed * self.tokens_per_second).min(self.capacity);
        entry.last_check = now;

        if tokens < 1.0 {
            entry.tokens = tokens;
            let wait = ((1.0 - tokens) / self.tokens_per_second).ceil().max(1.0);
            return RateDecision::Limited {
                retry_after: Duration::from_secs(wait as u64),
            };
        }

        entry.tokens = tokens - 1.0;
        RateDecision::Allowed {
            remaining: entry.tokens,
        }
    }

    /// Drop buckets idle long enough to have refilled completely.
    pub fn prune_idle(&self, now: Instant) {
        let full_after = Duration::from_secs_f64(self.capacity / self.tokens_per_second);
        self.buckets
            .retain(|_, bucket| now.saturating_duration_since(bucket.last_check) < full_after);
    }

    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}
