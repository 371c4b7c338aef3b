// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./corebrain.toml` > `~/.config/corebrain/corebrain.toml`
//! > `/etc/corebrain/corebrain.toml`, with environment variable overrides via the
//! `COREBRAIN_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::CoreBrainConfig;

const SYSTEM_CONFIG: &str = "/etc/corebrain/corebrain.toml";
const LOCAL_CONFIG: &str = "corebrain.toml";

/// Sections addressable from the environment, longest first so that
/// `rate_limit_burst` is not split as `rate.limit_burst`.
const ENV_SECTIONS: &[&str] = &[
    "concurrency",
    "rate_limit",
    "anthropic",
    "pipeline",
    "storage",
    "pricing",
    "server",
    "schema",
    "access",
    "store",
    "cache",
];

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/corebrain/corebrain.toml` (system-wide)
/// 3. `~/.config/corebrain/corebrain.toml` (user XDG config)
/// 4. `./corebrain.toml` (local directory)
/// 5. `COREBRAIN_*` environment variables
pub fn load_config() -> Result<CoreBrainConfig, figment::Error> {
    build_figment()
        .extract()
        .map(apply_fallback_env)
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<CoreBrainConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CoreBrainConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<CoreBrainConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(CoreBrainConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
        .map(apply_fallback_env)
}

/// Build the Figment used internally for config loading (exposed for diagnostic use).
pub fn build_figment() -> Figment {
    search_paths()
        .into_iter()
        .fold(
            Figment::new().merge(Serialized::defaults(CoreBrainConfig::default())),
            |figment, path| figment.merge(Toml::file(path)),
        )
        .merge(env_provider())
}

/// Candidate config files, lowest precedence first. Missing files are skipped
/// by figment.
pub fn search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(SYSTEM_CONFIG)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("corebrain").join(LOCAL_CONFIG));
    }
    paths.push(
        std::env::current_dir()
            .map(|d| d.join(LOCAL_CONFIG))
            .unwrap_or_else(|_| PathBuf::from(LOCAL_CONFIG)),
    );
    paths
}

/// `ANTHROPIC_API_KEY` is honoured when no key is configured.
fn apply_fallback_env(mut config: CoreBrainConfig) -> CoreBrainConfig {
    if config.anthropic.api_key.is_none() {
        config.anthropic.api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
    }
    config
}

/// Environment provider mapping `COREBRAIN_<SECTION>_<KEY>` onto `section.key`.
///
/// Only the leading section is split off, so `COREBRAIN_PIPELINE_SCHEMA_CHAR_BUDGET`
/// maps to `pipeline.schema_char_budget`.
fn env_provider() -> Env {
    Env::prefixed("COREBRAIN_").map(|key| map_env_key(key.as_str()).into())
}

pub(crate) fn map_env_key(key: &str) -> String {
    let key = key.to_ascii_lowercase();
    for section in ENV_SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|rest| rest.strip_prefix('_'))
        {
            return format!("{section}.{rest}");
        }
    }
    key
}
