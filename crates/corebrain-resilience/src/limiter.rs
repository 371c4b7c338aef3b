// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Semaphore-backed concurrency limits.
//!
//! Model calls and store calls draw from separate pools so a burst of slow
//! model requests cannot starve cheap store reads, and vice versa.

use std::sync::Arc;

use corebrain_core::CoreBrainError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

/// A named pool of permits. Cloning shares the pool.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    name: Arc<str>,
    permits: usize,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    /// Create a pool with `permits` slots. Zero is raised to one.
    pub fn new(name: &str, permits: usize) -> Self {
        let permits = permits.max(1);
        Self {
            name: Arc::from(name),
            permits,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Total capacity of the pool.
    pub fn capacity(&self) -> usize {
        self.permits
    }

    /// Permits currently free.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Wait for a permit. The permit is released when dropped.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, CoreBrainError> {
        if self.semaphore.available_permits() == 0 {
            debug!(pool = %self.name, "waiting for permit");
        }
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| CoreBrainError::Internal(format!("{} limiter closed", self.name)))
    }

    /// Close the pool. Pending and future acquires fail.
    pub fn close(&self) {
        self.semaphore.close();
    }
}

/// The two pools used by the query pipeline.
#[derive(Debug, Clone)]
pub struct LimiterPools {
    pub model: ConcurrencyLimiter,
    pub store: ConcurrencyLimiter,
}

impl LimiterPools {
    pub fn new(model_permits: usize, store_permits: usize) -> Self {
        Self {
            model: ConcurrencyLimiter::new("model", model_permits),
            store: ConcurrencyLimiter::new("store", store_permits),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn permits_are_returned_on_drop() {
        let limiter = ConcurrencyLimiter::new("store", 2);
        let a = limiter.acquire().await.unwrap();
        let _b = limiter.acquire().await.unwrap();
        assert_eq!(limiter.available(), 0);
        drop(a);
        assert_eq!(limiter.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn acquire_waits_when_exhausted() {
        let limiter = ConcurrencyLimiter::new("model", 1);
        let held = limiter.acquire().await.unwrap();

        let waiter = limiter.clone();
        let handle = tokio::spawn(async move { waiter.acquire().await.map(|_| ()) });

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!handle.is_finished());

        drop(held);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn closed_pool_rejects() {
        let limiter = ConcurrencyLimiter::new("model", 1);
        limiter.close();
        assert!(matches!(
            limiter.acquire().await,
            Err(CoreBrainError::Internal(_))
        ));
    }

    #[test]
    fn zero_permits_is_raised_to_one() {
        let pools = LimiterPools::new(0, 3);
        assert_eq!(pools.model.capacity(), 1);
        assert_eq!(pools.store.capacity(), 3);
        assert_eq!(pools.store.name(), "store");
    }
}
