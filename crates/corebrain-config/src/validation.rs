// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as limit ordering, positive TTLs, and duplicate API keys.

use std::collections::HashSet;

use crate::diagnostic::ConfigError;
use crate::model::{CoreBrainConfig, StoreBackend};

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &CoreBrainConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let host = config.server.host.trim();
    if host.is_empty() {
        fail("server.host must not be empty".to_string());
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            fail(format!(
                "server.host `{host}` is not a valid IP address or hostname"
            ));
        }
    }

    if config.server.port == 0 {
        fail("server.port must be non-zero".to_string());
    }
    if config.server.request_timeout_secs == 0 {
        fail("server.request_timeout_secs must be at least 1".to_string());
    }

    if config.anthropic.model.trim().is_empty() {
        fail("anthropic.model must not be empty".to_string());
    }
    if config.anthropic.max_tokens == 0 {
        fail("anthropic.max_tokens must be at least 1".to_string());
    }
    for (key, value) in [
        ("temperature", config.anthropic.temperature),
        ("query_temperature", config.anthropic.query_temperature),
    ] {
        if !(0.0..=1.0).contains(&value) {
            fail(format!("anthropic.{key} must be within [0, 1], got {value}"));
        }
    }

    if config.store.backend == StoreBackend::Sqlite && config.store.database_path.trim().is_empty()
    {
        fail("store.database_path must be set for the sqlite backend".to_string());
    }
    if config.store.timeout_ms == 0 {
        fail("store.timeout_ms must be at least 1".to_string());
    }

    if config.storage.database_path.trim().is_empty() {
        fail("storage.database_path must not be empty".to_string());
    }

    if config.cache.ttl_secs == 0 {
        fail("cache.ttl_secs must be at least 1".to_string());
    }
    if config.cache.capacity == 0 {
        fail("cache.capacity must be at least 1".to_string());
    }
    if config.schema.ttl_secs == 0 {
        fail("schema.ttl_secs must be at least 1".to_string());
    }
    if config.schema.sample_size == 0 {
        fail("schema.sample_size must be at least 1".to_string());
    }

    if config.pricing.rates.is_empty() {
        fail("pricing.rates must contain at least one model".to_string());
    }
    for (model, rate) in config
        .pricing
        .rates
        .iter()
        .map(|(k, v)| (k.as_str(), v))
        .chain(std::iter::once(("fallback", &config.pricing.fallback)))
    {
        if rate.input_per_mtok < 0.0 || rate.output_per_mtok < 0.0 {
            fail(format!("pricing rate for `{model}` must be non-negative"));
        }
    }

    if config.concurrency.model_permits == 0 {
        fail("concurrency.model_permits must be at least 1".to_string());
    }
    if config.concurrency.store_permits == 0 {
        fail("concurrency.store_permits must be at least 1".to_string());
    }

    if config.rate_limit.enabled {
        if config.rate_limit.requests_per_minute == 0 {
            fail("rate_limit.requests_per_minute must be at least 1".to_string());
        }
        if config.rate_limit.burst == 0 {
            fail("rate_limit.burst must be at least 1".to_string());
        }
    }

    let pipeline = &config.pipeline;
    if !(1..=100).contains(&pipeline.max_limit) {
        fail(format!(
            "pipeline.max_limit must be within [1, 100], got {}",
            pipeline.max_limit
        ));
    }
    if pipeline.default_limit == 0 || pipeline.default_limit > pipeline.max_limit {
        fail(format!(
            "pipeline.default_limit must be within [1, max_limit], got {}",
            pipeline.default_limit
        ));
    }
    if pipeline.history_window == 0 {
        fail("pipeline.history_window must be at least 1".to_string());
    }
    if pipeline.result_byte_budget < 64 {
        fail("pipeline.result_byte_budget must be at least 64".to_string());
    }
    if pipeline.schema_max_collections == 0 {
        fail("pipeline.schema_max_collections must be at least 1".to_string());
    }

    let mut seen_keys = HashSet::new();
    let mut seen_names = HashSet::new();
    for (i, key) in config.api_keys.iter().enumerate() {
        if key.key.trim().is_empty() {
            fail(format!("api_keys[{i}].key must not be empty"));
        } else if !seen_keys.insert(&key.key) {
            fail(format!("api_keys[{i}] duplicates an earlier key"));
        }
        if key.name.trim().is_empty() {
            fail(format!("api_keys[{i}].name must not be empty"));
        } else if !seen_names.insert(&key.name) {
            fail(format!("duplicate api key name `{}`", key.name));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
