// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as value ranges and non-empty paths.

use crate::diagnostic::ConfigError;
use crate::model::NudgeflowConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation rather than stopping at the first one.
pub fn validate_config(config: &NudgeflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !LOG_LEVELS.contains(&config.service.log_level.as_str()) {
        errors.push(ConfigError::validation(format!(
            "service.log_level must be one of {}, got `{}`",
            LOG_LEVELS.join(", "),
            config.service.log_level
        )));
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.database_path must not be empty",
        ));
    }

    if config.queue.max_attempts == 0 {
        errors.push(ConfigError::validation(
            "queue.max_attempts must be at least 1",
        ));
    }

    let worker = &config.worker;
    for (name, value) in [
        ("worker.poll_interval_ms", worker.poll_interval_ms),
        ("worker.job_timeout_secs", worker.job_timeout_secs),
        ("worker.health_interval_secs", worker.health_interval_secs),
        ("worker.cleanup_interval_secs", worker.cleanup_interval_secs),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{name} must be positive")));
        }
    }
    if worker.max_concurrency == 0 {
        errors.push(ConfigError::validation(
            "worker.max_concurrency must be at least 1",
        ));
    }
    if worker.backoff_max_ms < worker.backoff_base_ms {
        errors.push(ConfigError::validation(format!(
            "worker.backoff_max_ms ({}) must not be below worker.backoff_base_ms ({})",
            worker.backoff_max_ms, worker.backoff_base_ms
        )));
    }

    let memory = &config.memory;
    for (name, value) in [
        ("memory.similarity_threshold", memory.similarity_threshold),
        ("memory.relation_min_strength", memory.relation_min_strength),
    ] {
        if !(0.0..=1.0).contains(&value) {
            errors.push(ConfigError::validation(format!(
                "{name} must be within [0, 1], got {value}"
            )));
        }
    }
    for (name, value) in [
        ("memory.retrieval_limit", memory.retrieval_limit),
        ("memory.relation_concurrency", memory.relation_concurrency),
        ("memory.synthesis_blocks", memory.synthesis_blocks),
    ] {
        if value == 0 {
            errors.push(ConfigError::validation(format!("{name} must be at least 1")));
        }
    }

    if config.nudges.ttl_hours <= 0 {
        errors.push(ConfigError::validation(format!(
            "nudges.ttl_hours must be positive, got {}",
            config.nudges.ttl_hours
        )));
    }
    if config.nudges.mood_volatility_threshold < 0.0 {
        errors.push(ConfigError::validation(
            "nudges.mood_volatility_threshold must be non-negative",
        ));
    }

    if !(config.llm.base_url.starts_with("http://") || config.llm.base_url.starts_with("https://"))
    {
        errors.push(ConfigError::validation(format!(
            "llm.base_url `{}` must start with http:// or https://",
            config.llm.base_url
        )));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
