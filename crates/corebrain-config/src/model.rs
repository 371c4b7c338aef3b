// SPDX-FileCopyrightText: 2026 CoreBrain Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for CoreBrain.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::collections::BTreeMap;

use corebrain_core::{PermissionContext, PermissionLevel};
use serde::{Deserialize, Serialize};

/// Top-level CoreBrain configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CoreBrainConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Anthropic API settings.
    #[serde(default)]
    pub anthropic: AnthropicConfig,

    /// Document store holding the data that queries run against.
    #[serde(default)]
    pub store: StoreConfig,

    /// Conversation and cost ledger persistence.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Response cache settings.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Schema catalog settings.
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Token-cost rate table.
    #[serde(default)]
    pub pricing: PricingConfig,

    /// Concurrency limits for model and store calls.
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// Per-caller request rate limits.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Collection access per permission level.
    #[serde(default)]
    pub access: AccessConfig,

    /// Prompt budgets and result bounds.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Static API keys resolving to permission contexts.
    #[serde(default)]
    pub api_keys: Vec<ApiKeyConfig>,
}

impl CoreBrainConfig {
    /// Resolve a presented API key into the caller's permission context.
    ///
    /// Inactive keys resolve to `None`.
    pub fn resolve_api_key(&self, presented: &str) -> Option<PermissionContext> {
        let entry = self
            .api_keys
            .iter()
            .find(|k| k.active && k.key == presented)?;
        let caller = entry.user_id.clone().unwrap_or_else(|| entry.name.clone());
        Some(
            self.access
                .context_for(caller, entry.level, entry.allowed_collections.as_deref())
                .with_domains(entry.allowed_domains.clone()),
        )
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Address to bind the HTTP listener to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind the HTTP listener to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Upper bound on one request's whole pipeline, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Allowed CORS origins. Empty means CORS headers are not emitted.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            log_level: default_log_level(),
            request_timeout_secs: default_request_timeout_secs(),
            cors_origins: Vec::new(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// Anthropic API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AnthropicConfig {
    /// Anthropic API key. `None` falls back to the `ANTHROPIC_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Model used for both elicitation and synthesis.
    #[serde(default = "default_model")]
    pub model: String,

    /// Maximum tokens to generate per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature for answer synthesis.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Sampling temperature for query elicitation.
    #[serde(default = "default_query_temperature")]
    pub query_temperature: f32,

    /// Per-call request timeout in seconds.
    #[serde(default = "default_anthropic_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries after the first attempt, for transport failures only.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries, in milliseconds.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// API base URL.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the `anthropic-version` header.
    #[serde(default = "default_api_version")]
    pub api_version: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            query_temperature: default_query_temperature(),
            timeout_secs: default_anthropic_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            base_url: default_base_url(),
            api_version: default_api_version(),
        }
    }
}

fn default_model() -> String {
    "claude-3-opus-20240229".to_string()
}

fn default_max_tokens() -> u32 {
    1024
}

fn default_temperature() -> f32 {
    0.7
}

fn default_query_temperature() -> f32 {
    0.2
}

fn default_anthropic_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

/// Which document store backend serves queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// In-process store, optionally seeded from a JSON file.
    #[default]
    Memory,
    /// SQLite file holding one JSON document per row.
    Sqlite,
}

/// Document store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Path to the SQLite document database (sqlite backend).
    #[serde(default = "default_store_path")]
    pub database_path: String,

    /// JSON file of `{"collection": [documents...]}` loaded at startup (memory backend).
    #[serde(default)]
    pub seed_file: Option<String>,

    /// Timeout for one query execution, in milliseconds.
    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,

    /// Budget for the total-count side query, in milliseconds.
    #[serde(default = "default_count_timeout_ms")]
    pub count_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            database_path: default_store_path(),
            seed_file: None,
            timeout_ms: default_store_timeout_ms(),
            count_timeout_ms: default_count_timeout_ms(),
        }
    }
}

fn default_store_path() -> String {
    data_file("documents.db")
}

fn default_store_timeout_ms() -> u64 {
    5000
}

fn default_count_timeout_ms() -> u64 {
    1000
}

/// Conversation and ledger persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL mode for concurrent reads.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    data_file("corebrain.db")
}

fn default_wal_mode() -> bool {
    true
}

fn data_file(name: &str) -> String {
    dirs::data_dir()
        .map(|d| d.join("corebrain").join(name).display().to_string())
        .unwrap_or_else(|| format!("./{name}"))
}

/// Response cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Time-to-live of a cached answer, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of cached answers before LRU eviction.
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            capacity: default_cache_capacity(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_cache_capacity() -> usize {
    1024
}

/// Schema catalog configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SchemaConfig {
    /// How long inferred schemas stay fresh, in seconds.
    #[serde(default = "default_schema_ttl_secs")]
    pub ttl_secs: u64,

    /// Documents sampled per collection during inference.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// Example values longer than this are truncated.
    #[serde(default = "default_example_max_chars")]
    pub example_max_chars: usize,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_schema_ttl_secs(),
            sample_size: default_sample_size(),
            example_max_chars: default_example_max_chars(),
        }
    }
}

fn default_schema_ttl_secs() -> u64 {
    600
}

fn default_sample_size() -> usize {
    5
}

fn default_example_max_chars() -> usize {
    50
}

/// Per-million-token prices for one model family.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ModelRate {
    /// Price per million input tokens.
    pub input_per_mtok: f64,
    /// Price per million output tokens.
    pub output_per_mtok: f64,
}

/// Token-cost rate table.
///
/// Keys are matched as substrings of the model identifier (`"opus"` matches
/// `claude-3-opus-20240229`); the longest matching key wins.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PricingConfig {
    #[serde(default = "default_rates")]
    pub rates: BTreeMap<String, ModelRate>,

    /// Rate applied to models that match no key.
    #[serde(default = "default_fallback_rate")]
    pub fallback: ModelRate,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            rates: default_rates(),
            fallback: default_fallback_rate(),
        }
    }
}

fn default_rates() -> BTreeMap<String, ModelRate> {
    BTreeMap::from([
        (
            "opus".to_string(),
            ModelRate {
                input_per_mtok: 15.0,
                output_per_mtok: 75.0,
            },
        ),
        (
            "sonnet".to_string(),
            ModelRate {
                input_per_mtok: 3.0,
                output_per_mtok: 15.0,
            },
        ),
        (
            "haiku".to_string(),
            ModelRate {
                input_per_mtok: 0.25,
                output_per_mtok: 1.25,
            },
        ),
    ])
}

fn default_fallback_rate() -> ModelRate {
    ModelRate {
        input_per_mtok: 15.0,
        output_per_mtok: 75.0,
    }
}

/// Concurrency limiter sizes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ConcurrencyConfig {
    /// Simultaneous in-flight model calls across all requests.
    #[serde(default = "default_model_permits")]
    pub model_permits: usize,

    /// Simultaneous in-flight store calls across all requests.
    #[serde(default = "default_store_permits")]
    pub store_permits: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            model_permits: default_model_permits(),
            store_permits: default_store_permits(),
        }
    }
}

fn default_model_permits() -> usize {
    8
}

fn default_store_permits() -> usize {
    16
}

/// Token-bucket rate limit applied per caller.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sustained refill rate.
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,

    /// Bucket capacity.
    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            requests_per_minute: default_requests_per_minute(),
            burst: default_burst(),
        }
    }
}

fn default_requests_per_minute() -> u32 {
    60
}

fn default_burst() -> u32 {
    5
}

/// Access granted to one permission level.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LevelAccess {
    /// Collections readable at this level; `"*"` means all.
    pub collections: Vec<String>,

    /// Fields stripped from results and schemas (`field` or `collection:field`).
    #[serde(default)]
    pub hidden_fields: Vec<String>,
}

/// Collection access per permission level.
///
/// Levels are cumulative: a write caller may read everything a read caller may.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AccessConfig {
    #[serde(default = "default_read_access")]
    pub read: LevelAccess,

    #[serde(default = "default_write_access")]
    pub write: LevelAccess,

    #[serde(default = "default_admin_access")]
    pub admin: LevelAccess,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            read: default_read_access(),
            write: default_write_access(),
            admin: default_admin_access(),
        }
    }
}

impl AccessConfig {
    pub fn level(&self, level: PermissionLevel) -> &LevelAccess {
        match level {
            PermissionLevel::Read => &self.read,
            PermissionLevel::Write => &self.write,
            PermissionLevel::Admin => &self.admin,
        }
    }

    /// Collections reachable at `level`, including every lower level's.
    pub fn collections_for(&self, level: PermissionLevel) -> Vec<String> {
        let mut collections = Vec::new();
        for lower in [
            PermissionLevel::Read,
            PermissionLevel::Write,
            PermissionLevel::Admin,
        ] {
            if lower > level {
                break;
            }
            for c in &self.level(lower).collections {
                if !collections.contains(c) {
                    collections.push(c.clone());
                }
            }
        }
        collections
    }

    /// Build the permission context for a caller at `level`.
    ///
    /// `narrowed` restricts the level's collections further; it never widens them.
    pub fn context_for(
        &self,
        caller_id: impl Into<String>,
        level: PermissionLevel,
        narrowed: Option<&[String]>,
    ) -> PermissionContext {
        let granted = self.collections_for(level);
        let wildcard = granted.iter().any(|c| c == corebrain_core::types::ALL_COLLECTIONS);
        let collections = match narrowed {
            Some(list) => list
                .iter()
                .filter(|c| wildcard || granted.contains(c))
                .cloned()
                .collect(),
            None => granted,
        };
        PermissionContext::new(caller_id, level, collections)
            .with_hidden_fields(self.level(level).hidden_fields.clone())
    }
}

fn default_hidden_fields() -> Vec<String> {
    ["password", "password_hash", "api_key", "secret", "token"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_read_access() -> LevelAccess {
    LevelAccess {
        collections: vec![
            "products".to_string(),
            "categories".to_string(),
            "public_info".to_string(),
        ],
        hidden_fields: default_hidden_fields(),
    }
}

fn default_write_access() -> LevelAccess {
    LevelAccess {
        collections: vec!["orders".to_string()],
        hidden_fields: default_hidden_fields(),
    }
}

fn default_admin_access() -> LevelAccess {
    LevelAccess {
        collections: vec!["*".to_string()],
        hidden_fields: Vec::new(),
    }
}

/// Prompt budgets and result bounds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Trailing messages considered as conversation history.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Token budget for history inside one prompt.
    #[serde(default = "default_history_token_budget")]
    pub history_token_budget: usize,

    /// Character budget for schema context in the elicitation prompt.
    #[serde(default = "default_schema_char_budget")]
    pub schema_char_budget: usize,

    /// Collections kept when the schema context exceeds its budget.
    #[serde(default = "default_schema_max_collections")]
    pub schema_max_collections: usize,

    /// Byte budget for formatted results re-injected into the synthesis prompt.
    #[serde(default = "default_result_byte_budget")]
    pub result_byte_budget: usize,

    /// Rows of the formatted result shown to the model.
    #[serde(default = "default_result_sample_rows")]
    pub result_sample_rows: usize,

    /// Limit applied when neither the caller nor the model supplies one.
    #[serde(default = "default_limit")]
    pub default_limit: u32,

    /// Hard ceiling on any query limit.
    #[serde(default = "default_max_limit")]
    pub max_limit: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            history_token_budget: default_history_token_budget(),
            schema_char_budget: default_schema_char_budget(),
            schema_max_collections: default_schema_max_collections(),
            result_byte_budget: default_result_byte_budget(),
            result_sample_rows: default_result_sample_rows(),
            default_limit: default_limit(),
            max_limit: default_max_limit(),
        }
    }
}

fn default_history_window() -> usize {
    10
}

fn default_history_token_budget() -> usize {
    2000
}

fn default_schema_char_budget() -> usize {
    10_000
}

fn default_schema_max_collections() -> usize {
    5
}

fn default_result_byte_budget() -> usize {
    8000
}

fn default_result_sample_rows() -> usize {
    5
}

fn default_limit() -> u32 {
    10
}

fn default_max_limit() -> u32 {
    100
}

/// A static API key entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ApiKeyConfig {
    /// Human-readable label, used as caller id when `user_id` is unset.
    pub name: String,

    /// The secret presented in the `X-API-Key` header.
    pub key: String,

    #[serde(default = "default_key_level")]
    pub level: PermissionLevel,

    /// Optional narrowing of the level's collections.
    #[serde(default)]
    pub allowed_collections: Option<Vec<String>>,

    /// Origin hosts the key may be used from. Empty means any.
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_key_level() -> PermissionLevel {
    PermissionLevel::Read
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_levels_are_cumulative() {
        let access = AccessConfig::default();
        assert_eq!(
            access.collections_for(PermissionLevel::Read),
            vec!["products", "categories", "public_info"]
        );
        let write = access.collections_for(PermissionLevel::Write);
        assert!(write.contains(&"orders".to_string()));
        assert!(write.contains(&"products".to_string()));
        assert!(access.collections_for(PermissionLevel::Admin).contains(&"*".to_string()));
    }

    #[test]
    fn narrowing_never_widens() {
        let access = AccessConfig::default();
        let narrowed = vec!["products".to_string(), "orders".to_string()];
        let ctx = access.context_for("k", PermissionLevel::Read, Some(&narrowed));
        assert_eq!(ctx.allowed_collections, vec!["products"]);

        let admin = access.context_for("k", PermissionLevel::Admin, Some(&narrowed));
        assert_eq!(admin.allowed_collections, vec!["products", "orders"]);
    }

    #[test]
    fn resolve_api_key_applies_level_and_domains() {
        let mut config = CoreBrainConfig::default();
        config.api_keys.push(ApiKeyConfig {
            name: "dashboard".into(),
            key: "cb_live_abc".into(),
            level: PermissionLevel::Write,
            allowed_collections: None,
            allowed_domains: vec!["app.example.com".into()],
            user_id: Some("user-7".into()),
            active: true,
        });
        config.api_keys.push(ApiKeyConfig {
            name: "revoked".into(),
            key: "cb_live_old".into(),
            level: PermissionLevel::Admin,
            allowed_collections: None,
            allowed_domains: Vec::new(),
            user_id: None,
            active: false,
        });

        let ctx = config.resolve_api_key("cb_live_abc").unwrap();
        assert_eq!(ctx.caller_id, "user-7");
        assert_eq!(ctx.level, PermissionLevel::Write);
        assert!(ctx.can_access("orders"));
        assert_eq!(ctx.allowed_domains, vec!["app.example.com"]);
        assert!(!ctx.field_visible("users", "password"));

        assert!(config.resolve_api_key("cb_live_old").is_none());
        assert!(config.resolve_api_key("nope").is_none());
    }

    #[test]
    fn default_rate_table_has_opus_pricing() {
        let pricing = PricingConfig::default();
        assert_eq!(pricing.rates["opus"].input_per_mtok, 15.0);
        assert_eq!(pricing.rates["opus"].output_per_mtok, 75.0);
    }
}
