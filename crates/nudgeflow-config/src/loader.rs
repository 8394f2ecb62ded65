// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./nudgeflow.toml` > `~/.config/nudgeflow/nudgeflow.toml`
//! > `/etc/nudgeflow/nudgeflow.toml` with environment variable overrides via the
//! `NUDGEFLOW_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::NudgeflowConfig;

/// Top-level sections that environment variables may address.
const SECTIONS: &[&str] = &[
    "service", "storage", "features", "queue", "worker", "memory", "nudges", "llm",
];

pub(crate) const SYSTEM_CONFIG_PATH: &str = "/etc/nudgeflow/nudgeflow.toml";
pub(crate) const LOCAL_CONFIG_PATH: &str = "nudgeflow.toml";

pub(crate) fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nudgeflow/nudgeflow.toml"))
}

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/nudgeflow/nudgeflow.toml` (system-wide)
/// 3. `~/.config/nudgeflow/nudgeflow.toml` (user XDG config)
/// 4. `./nudgeflow.toml` (local directory)
/// 5. `NUDGEFLOW_*` environment variables
pub fn load_config() -> Result<NudgeflowConfig, figment::Error> {
    build_figment().extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
pub fn load_config_from_str(toml_content: &str) -> Result<NudgeflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NudgeflowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<NudgeflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(NudgeflowConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Build the Figment used for config loading, before extraction.
pub fn build_figment() -> Figment {
    Figment::new()
        .merge(Serialized::defaults(NudgeflowConfig::default()))
        .merge(Toml::file(SYSTEM_CONFIG_PATH))
        .merge(Toml::file(user_config_path().unwrap_or_default()))
        .merge(Toml::file(LOCAL_CONFIG_PATH))
        .merge(env_provider())
}

/// Create the environment variable provider.
///
/// Uses an explicit section mapping rather than `Env::split("_")` because
/// key names contain underscores: `NUDGEFLOW_WORKER_MAX_CONCURRENCY` must map
/// to `worker.max_concurrency`, not `worker.max.concurrency`.
fn env_provider() -> Env {
    Env::prefixed("NUDGEFLOW_").map(|key| map_env_key(key.as_str()).into())
}

/// Maps a lowercased, prefix-stripped env var name to a dotted config path.
pub(crate) fn map_env_key(key: &str) -> String {
    for section in SECTIONS {
        if let Some(rest) = key
            .strip_prefix(section)
            .and_then(|r| r.strip_prefix('_'))
            && !rest.is_empty()
        {
            return format!("{section}.{rest}");
        }
    }
    key.to_string()
}
