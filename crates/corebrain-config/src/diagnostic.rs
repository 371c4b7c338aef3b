// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors become miette reports pointing at the offending key in
//! the TOML file that supplied it, with a "did you mean" hint for keys that
//! are close to a valid one.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Keys scoring below this Jaro-Winkler similarity get no suggestion.
const SUGGESTION_THRESHOLD: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`")]
    #[diagnostic(
        code(corebrain::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted in the same section.
        valid_keys: String,
        #[label("not a recognized key here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid type for `{key}`: found {found}")]
    #[diagnostic(code(corebrain::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        /// Dotted path of the key, e.g. `cache.ttl_secs`.
        key: String,
        found: String,
        expected: String,
        #[label("this value")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(corebrain::config::missing_key),
        help("set `{key}` in corebrain.toml or through its COREBRAIN_ variable")
    )]
    MissingKey { key: String },

    /// A value that parsed but breaks a semantic rule.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(corebrain::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(corebrain::config::other))]
    Other(String),
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? accepted here: {valid_keys}"),
        None => format!("accepted here: {valid_keys}"),
    }
}

/// Where a failing value came from: file path and its contents.
type TomlSource = (String, String);

/// Convert every error carried by `err` into a diagnostic.
///
/// `toml_sources` holds the files that were merged, so spans can be
/// resolved against the one that supplied the bad key.
pub fn figment_to_config_errors(err: figment::Error, toml_sources: &[TomlSource]) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let section: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
            match &error.kind {
                Kind::UnknownField(field, expected) => {
                    let valid: Vec<&str> = expected.to_vec();
                    let (span, src) = locate(&error, &section, field, toml_sources);
                    ConfigError::UnknownKey {
                        key: field.clone(),
                        suggestion: suggest_key(field, &valid),
                        valid_keys: valid.join(", "),
                        span,
                        src,
                    }
                }
                Kind::MissingField(field) => ConfigError::MissingKey {
                    key: dotted(&section, field),
                },
                Kind::InvalidType(found, expected) => {
                    // The path of a type error ends at the value's own key.
                    let (parent, field) = match section.split_last() {
                        Some((last, parent)) => (parent.to_vec(), last.clone()),
                        None => (Vec::new(), String::new()),
                    };
                    let (span, src) = if field.is_empty() {
                        (None, None)
                    } else {
                        locate(&error, &parent, &field, toml_sources)
                    };
                    ConfigError::InvalidType {
                        key: section.join("."),
                        found: found.to_string(),
                        expected: expected.to_string(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn dotted(section: &[String], field: &str) -> String {
    if section.is_empty() {
        field.to_string()
    } else {
        format!("{}.{field}", section.join("."))
    }
}

/// Span of `field` in the file the error's metadata names, if it was read.
fn locate(
    error: &figment::Error,
    section: &[String],
    field: &str,
    toml_sources: &[TomlSource],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    // Strings loaded inline carry no file source; they are registered as `<inline>`.
    let wanted = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => std::fs::canonicalize(path)
            .unwrap_or_else(|_| path.clone())
            .display()
            .to_string(),
        _ => "<inline>".to_string(),
    };
    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == wanted) else {
        return (None, None);
    };
    match find_key_offset(content, section, field) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), field.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of `field` as a key inside the table named by `path`.
///
/// `path` segments that are array indices (as figment reports entries of
/// `[[api_keys]]`) are skipped, and both `[a.b]` and `[[a.b]]` headers
/// match. An empty path searches the top-level keys before the first header.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let table: Vec<&str> = path
        .iter()
        .map(String::as_str)
        .filter(|s| !s.chars().all(|c| c.is_ascii_digit()))
        .collect();
    let table = table.join(".");

    let mut in_table = table.is_empty();
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim();
        if trimmed.starts_with('[') {
            let name = trimmed.trim_start_matches('[').trim_end_matches(']').trim();
            in_table = !table.is_empty() && name == table;
        } else if in_table {
            let indent = line.len() - line.trim_start().len();
            if let Some(rest) = line.trim_start().strip_prefix(field) {
                if rest.trim_start().starts_with('=') {
                    return Some(offset + indent);
                }
            }
        }
        offset += line.len();
    }
    None
}

/// Closest valid key to `unknown`, when one is close enough to be a typo.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let unknown = unknown.to_ascii_lowercase();
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(&unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Print every error to stderr as a miette report, then a count.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
    if errors.len() > 1 {
        eprintln!("{} configuration problems found", errors.len());
    }
}
