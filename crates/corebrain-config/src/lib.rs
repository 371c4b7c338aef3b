// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! CoreBrain configuration: typed model, layered loading and diagnostics.
//!
//! Files are merged system, user, then local, and `COREBRAIN_*` variables
//! override all of them. Unknown keys are rejected (`deny_unknown_fields`)
//! and reported with the closest valid key.
//!
//! ```no_run
//! let config = corebrain_config::load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

use std::path::Path;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::CoreBrainConfig;

/// Validate a loaded config, or turn the figment error into diagnostics.
///
/// `sources` is only read on failure.
fn checked<F>(
    loaded: Result<CoreBrainConfig, figment::Error>,
    sources: F,
) -> Result<CoreBrainConfig, Vec<ConfigError>>
where
    F: FnOnce() -> Vec<(String, String)>,
{
    let config = loaded.map_err(|err| diagnostic::figment_to_config_errors(err, &sources()))?;
    validation::validate_config(&config)?;
    Ok(config)
}

/// Load from the standard search path and validate.
pub fn load_and_validate() -> Result<CoreBrainConfig, Vec<ConfigError>> {
    checked(loader::load_config(), || read_sources(&loader::search_paths()))
}

/// Load one explicit file (plus env overrides) and validate.
pub fn load_and_validate_path(path: &Path) -> Result<CoreBrainConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        read_sources(&[path.to_path_buf()])
    })
}

/// Load from a TOML string and validate. Spans point into `<inline>`.
pub fn load_and_validate_str(toml_content: &str) -> Result<CoreBrainConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Contents of whichever of `paths` exist, keyed by display path.
fn read_sources(paths: &[std::path::PathBuf]) -> Vec<(String, String)> {
    paths
        .iter()
        .filter_map(|path| {
            let content = std::fs::read_to_string(path).ok()?;
            // matched against figment's file source after canonicalizing both
            let shown = std::fs::canonicalize(path).unwrap_or_else(|_| path.clone());
            Some((shown.display().to_string(), content))
        })
        .collect()
}

/// Render the effective configuration as TOML with every secret masked.
pub fn redacted_toml(config: &CoreBrainConfig) -> Result<String, toml::ser::Error> {
    let mut shown = config.clone();
    if let Some(key) = shown.anthropic.api_key.as_mut() {
        *key = mask(key);
    }
    for entry in &mut shown.api_keys {
        entry.key = mask(&entry.key);
    }
    toml::to_string_pretty(&shown)
}

fn mask(secret: &str) -> String {
    let prefix: String = secret.chars().take(5).collect();
    format!("{prefix}****")
}
