// SPDX-FileCopyrightText: 2026 Mnemos Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Mnemos memory engine.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level Mnemos configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MnemosConfig {
    /// Process-level settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Text-generation and embedding service settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Memory pipeline settings.
    #[serde(default)]
    pub memory: MemoryConfig,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
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
    dirs::data_dir()
        .map(|p| p.join("mnemos").join("mnemos.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("mnemos.db"))
        .display()
        .to_string()
}

fn default_wal_mode() -> bool {
    true
}

/// OpenAI-compatible service configuration.
///
/// One endpoint serves both chat completions and embeddings. Point
/// `base_url` at OpenRouter or a local gateway to swap providers.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderConfig {
    /// API key. `None` falls back to the `OPENAI_API_KEY` environment variable.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API, without a trailing path.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries on transient HTTP errors (429, 500, 502, 503).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ProviderConfig {
    /// The configured key, or `OPENAI_API_KEY` from the environment.
    ///
    /// Blank values count as absent.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|key| !key.trim().is_empty())
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    1
}

/// Memory pipeline configuration.
///
/// Controls extraction, reconciliation, the bubble connection graph,
/// retrieval scoring, and the rolling conversation summary.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Model used for extraction, reconciliation decisions, and summaries.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,

    /// Model used for every embedding request.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Sampling temperature for the extraction request.
    #[serde(default = "default_extraction_temperature")]
    pub extraction_temperature: f32,

    /// Number of nearest existing memories shown to the reconciliation decision.
    #[serde(default = "default_reconciliation_neighbors")]
    pub reconciliation_neighbors: usize,

    /// Minimum cosine similarity for a bubble connection.
    #[serde(default = "default_connection_threshold")]
    pub connection_threshold: f64,

    /// Maximum connections recorded for a new bubble.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Exponential decay rate per elapsed day for episodic recency.
    #[serde(default = "default_recency_decay_rate")]
    pub recency_decay_rate: f64,

    /// Importance used when a memory has none (semantic facts, bad extraction values).
    #[serde(default = "default_importance")]
    pub default_importance: f64,

    /// Result count used when a search does not specify one.
    #[serde(default = "default_search_limit")]
    pub default_search_limit: usize,

    /// Connected memories followed per ranked search result.
    #[serde(default = "default_connections_per_result")]
    pub connections_per_result: usize,

    /// Cap on connected entries appended to one search response.
    #[serde(default = "default_max_connected_results")]
    pub max_connected_results: usize,

    /// Turns preceding the latest exchange included in the extraction window.
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,

    /// Regenerate the conversation summary every N logged messages.
    #[serde(default = "default_summary_every_messages")]
    pub summary_every_messages: usize,

    /// Oldest-first message cap fed to the summary request.
    #[serde(default = "default_summary_max_messages")]
    pub summary_max_messages: usize,

    /// Sampling temperature for the summary request.
    #[serde(default = "default_summary_temperature")]
    pub summary_temperature: f32,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            chat_model: default_chat_model(),
            embedding_model: default_embedding_model(),
            extraction_temperature: default_extraction_temperature(),
            reconciliation_neighbors: default_reconciliation_neighbors(),
            connection_threshold: default_connection_threshold(),
            max_connections: default_max_connections(),
            recency_decay_rate: default_recency_decay_rate(),
            default_importance: default_importance(),
            default_search_limit: default_search_limit(),
            connections_per_result: default_connections_per_result(),
            max_connected_results: default_max_connected_results(),
            recent_turns: default_recent_turns(),
            summary_every_messages: default_summary_every_messages(),
            summary_max_messages: default_summary_max_messages(),
            summary_temperature: default_summary_temperature(),
        }
    }
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_extraction_temperature() -> f32 {
    0.1
}

fn default_reconciliation_neighbors() -> usize {
    10
}

fn default_connection_threshold() -> f64 {
    0.6
}

fn default_max_connections() -> usize {
    5
}

fn default_recency_decay_rate() -> f64 {
    0.05
}

fn default_importance() -> f64 {
    0.5
}

fn default_search_limit() -> usize {
    10
}

fn default_connections_per_result() -> usize {
    2
}

fn default_max_connected_results() -> usize {
    3
}

fn default_recent_turns() -> usize {
    10
}

fn default_summary_every_messages() -> usize {
    20
}

fn default_summary_max_messages() -> usize {
    200
}

fn default_summary_temperature() -> f32 {
    0.2
}
