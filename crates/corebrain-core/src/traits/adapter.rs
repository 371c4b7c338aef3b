// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lifecycle surface shared by the model provider and both stores.

use async_trait::async_trait;

use crate::error::CoreBrainError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, health and teardown for a pluggable backend.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Instance name used in logs, e.g. `sqlite-documents`.
    fn name(&self) -> &str;

    fn version(&self) -> semver::Version;

    /// Which seam this backend plugs into.
    fn adapter_type(&self) -> AdapterType;

    /// Check the backend. An `Err` means the check itself could not run.
    async fn health_check(&self) -> Result<HealthStatus, CoreBrainError>;

    /// Release connections and flush pending writes. Called once, at exit.
    async fn shutdown(&self) -> Result<(), CoreBrainError>;
}

/// Result of [`check_adapter`] for one adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterHealth {
    pub name: String,
    pub kind: AdapterType,
    pub version: semver::Version,
    pub status: HealthStatus,
}

impl AdapterHealth {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Run a health check, folding a failed check into `Unhealthy`.
pub async fn check_adapter<A: PluginAdapter + ?Sized>(adapter: &A) -> AdapterHealth {
    let status = match adapter.health_check().await {
        Ok(status) => status,
        Err(e) => HealthStatus::Unhealthy(e.to_string()),
    };
    AdapterHealth {
        name: adapter.name().to_string(),
        kind: adapter.adapter_type(),
        version: adapter.version(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Flaky(bool);

    #[async_trait]
    impl PluginAdapter for Flaky {
        fn name(&self) -> &str {
            "flaky"
        }
        fn version(&self) -> semver::Version {
            semver::Version::new(0, 3, 1)
        }
        fn adapter_type(&self) -> AdapterType {
            AdapterType::DocumentStore
        }
        async fn health_check(&self) -> Result<HealthStatus, CoreBrainError> {
            if self.0 {
                Ok(HealthStatus::Degraded("slow disk".into()))
            } else {
                Err(CoreBrainError::Storage {
                    source: "connection refused".into(),
                })
            }
        }
        async fn shutdown(&self) -> Result<(), CoreBrainError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn check_reports_status_and_identity() {
        let health = check_adapter(&Flaky(true)).await;
        assert_eq!(health.name, "flaky");
        assert_eq!(health.kind, AdapterType::DocumentStore);
        assert_eq!(health.version, semver::Version::new(0, 3, 1));
        assert_eq!(health.status, HealthStatus::Degraded("slow disk".into()));
        assert!(!health.is_healthy());
    }

    #[tokio::test]
    async fn failed_check_becomes_unhealthy() {
        let health = check_adapter(&Flaky(false)).await;
        assert!(matches!(health.status, HealthStatus::Unhealthy(ref m) if m.contains("connection refused")));
    }
}
