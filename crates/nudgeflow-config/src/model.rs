// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for nudgeflow.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level nudgeflow configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. Every section is optional and defaults sensibly.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NudgeflowConfig {
    /// Process-level settings (logging).
    #[serde(default)]
    pub service: ServiceConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Global capability flags.
    #[serde(default)]
    pub features: FeatureConfig,

    /// Job queue retry and retention settings.
    #[serde(default)]
    pub queue: QueueConfig,

    /// Worker runtime settings.
    #[serde(default)]
    pub worker: WorkerConfig,

    /// Memory pipeline settings.
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Nudge engine settings.
    #[serde(default)]
    pub nudges: NudgeConfig,

    /// Completion and embedding service settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Process-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
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

    /// Enable WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_local_dir()
        .map(|d| d.join("nudgeflow").join("nudgeflow.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("nudgeflow.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_true() -> bool {
    true
}

/// Global capability flags.
///
/// Passed explicitly into each component; a capability check is a pure
/// function of this value plus the user's settings row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct FeatureConfig {
    #[serde(default = "default_true")]
    pub memory_enabled: bool,

    #[serde(default = "default_true")]
    pub enrichment_enabled: bool,

    #[serde(default = "default_true")]
    pub embedding_enabled: bool,

    #[serde(default = "default_true")]
    pub relation_detection_enabled: bool,

    /// Allow the guarded language-model fallback in the nudge engine.
    #[serde(default)]
    pub llm_nudges_enabled: bool,

    /// Propagate errors from the ingestion and retrieval paths instead of
    /// degrading. Intended for test and debug environments only.
    #[serde(default)]
    pub fail_fast: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            memory_enabled: true,
            enrichment_enabled: true,
            embedding_enabled: true,
            relation_detection_enabled: true,
            llm_nudges_enabled: false,
            fail_fast: false,
        }
    }
}

/// Job queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct QueueConfig {
    /// Attempts allowed before a job stays failed permanently.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Completed jobs older than this are purged by cleanup.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            retention_days: default_retention_days(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retention_days() -> u32 {
    7
}

/// Worker runtime configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WorkerConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Maximum jobs processing concurrently in this process.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Hard per-job timeout.
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Base delay multiplied by the attempt number before a retry.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    #[serde(default = "default_backoff_max_ms")]
    pub backoff_max_ms: u64,

    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,

    /// How long shutdown waits for in-flight jobs before aborting them.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// `processing` jobs started longer ago than this are recovered at startup.
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_concurrency: default_max_concurrency(),
            job_timeout_secs: default_job_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_max_ms: default_backoff_max_ms(),
            health_interval_secs: default_health_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
            shutdown_grace_secs: default_shutdown_grace_secs(),
            stale_after_secs: default_stale_after_secs(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_max_concurrency() -> usize {
    5
}

fn default_job_timeout_secs() -> u64 {
    30
}

fn default_backoff_base_ms() -> u64 {
    2000
}

fn default_backoff_max_ms() -> u64 {
    60_000
}

fn default_health_interval_secs() -> u64 {
    60
}

fn default_cleanup_interval_secs() -> u64 {
    3600
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_stale_after_secs() -> u64 {
    300
}

/// Memory pipeline configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryConfig {
    /// Lifetime of a cached synthesized context.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_retrieval_limit")]
    pub retrieval_limit: usize,

    /// Minimum cosine similarity for a block to be retrieved.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Number of recent blocks a new block is compared against.
    #[serde(default = "default_relation_window")]
    pub relation_window: usize,

    /// Relation-detection runs allowed per owner per hour.
    #[serde(default = "default_relation_quota_per_hour")]
    pub relation_quota_per_hour: u32,

    /// Detected relations weaker than this are discarded.
    #[serde(default = "default_relation_min_strength")]
    pub relation_min_strength: f32,

    /// Concurrent comparisons within one detection run.
    #[serde(default = "default_relation_concurrency")]
    pub relation_concurrency: usize,

    /// Blocks included in a synthesis prompt.
    #[serde(default = "default_synthesis_blocks")]
    pub synthesis_blocks: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            retrieval_limit: default_retrieval_limit(),
            similarity_threshold: default_similarity_threshold(),
            relation_window: default_relation_window(),
            relation_quota_per_hour: default_relation_quota_per_hour(),
            relation_min_strength: default_relation_min_strength(),
            relation_concurrency: default_relation_concurrency(),
            synthesis_blocks: default_synthesis_blocks(),
        }
    }
}

impl MemoryConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

fn default_retrieval_limit() -> usize {
    5
}

fn default_similarity_threshold() -> f32 {
    0.7
}

fn default_relation_window() -> usize {
    20
}

fn default_relation_quota_per_hour() -> u32 {
    5
}

fn default_relation_min_strength() -> f32 {
    0.5
}

fn default_relation_concurrency() -> usize {
    4
}

fn default_synthesis_blocks() -> usize {
    5
}

/// Nudge engine configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct NudgeConfig {
    /// Lifetime of a stored nudge.
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: i64,

    /// Memory snippets offered to the fallback prompt.
    #[serde(default = "default_fallback_snippets")]
    pub fallback_snippets: usize,

    /// A tool completion within this window triggers the journaling bridge.
    #[serde(default = "default_tool_bridge_window_mins")]
    pub tool_bridge_window_mins: i64,

    /// Mood variance above which the volatility rule fires.
    #[serde(default = "default_mood_volatility_threshold")]
    pub mood_volatility_threshold: f64,

    /// Days without goal activity before a goal counts as abandoned.
    #[serde(default = "default_abandoned_goal_days")]
    pub abandoned_goal_days: i64,
}

impl Default for NudgeConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            fallback_snippets: default_fallback_snippets(),
            tool_bridge_window_mins: default_tool_bridge_window_mins(),
            mood_volatility_threshold: default_mood_volatility_threshold(),
            abandoned_goal_days: default_abandoned_goal_days(),
        }
    }
}

fn default_ttl_hours() -> i64 {
    24
}

fn default_fallback_snippets() -> usize {
    3
}

fn default_tool_bridge_window_mins() -> i64 {
    120
}

fn default_mood_volatility_threshold() -> f64 {
    2.25
}

fn default_abandoned_goal_days() -> i64 {
    30
}

/// Completion and embedding service configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// API key. Falls back to the `NUDGEFLOW_LLM_API_KEY` env var.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_completion_model")]
    pub completion_model: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Per-request HTTP timeout.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts on rate-limit and server errors.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: None,
            completion_model: default_completion_model(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_llm_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_completion_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = NudgeflowConfig::default();
        assert_eq!(config.service.log_level, "info");
        assert_eq!(config.service.log_format, LogFormat::Pretty);
        assert!(config.storage.wal_mode);
        assert!(config.features.memory_enabled);
        assert!(!config.features.llm_nudges_enabled);
        assert!(!config.features.fail_fast);
        assert_eq!(config.queue.max_attempts, 3);
        assert_eq!(config.worker.max_concurrency, 5);
        assert_eq!(config.worker.job_timeout(), Duration::from_secs(30));
        assert_eq!(config.memory.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(config.memory.relation_window, 20);
        assert_eq!(config.memory.relation_quota_per_hour, 5);
        assert_eq!(config.nudges.ttl_hours, 24);
        assert_eq!(config.llm.max_retries, 1);
    }

    #[test]
    fn default_database_path_ends_with_file_name() {
        assert!(StorageConfig::default().database_path.ends_with("nudgeflow.db"));
    }
}
