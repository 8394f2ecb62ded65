// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for nudgeflow.
//!
//! Provides TOML configuration parsing with strict validation
//! (`deny_unknown_fields`), XDG file hierarchy lookup, environment variable
//! overrides, and diagnostic error rendering with typo suggestions.
//!
//! # Usage
//!
//! ```no_run
//! use nudgeflow_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("workers: {}", config.worker.max_concurrency);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{ConfigError, render_errors};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::{
    FeatureConfig, LlmConfig, LogFormat, MemoryConfig, NudgeConfig, NudgeflowConfig,
    QueueConfig, ServiceConfig, StorageConfig, WorkerConfig,
};

/// Load configuration from the standard locations and validate it.
///
/// Loader errors point into the offending file where it can be found.
pub fn load_and_validate() -> Result<NudgeflowConfig, Vec<ConfigError>> {
    checked(loader::load_config(), collect_toml_sources)
}

/// Load configuration from an explicit file and validate it.
pub fn load_and_validate_path(path: &std::path::Path) -> Result<NudgeflowConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_path(path), || {
        std::fs::read_to_string(path)
            .map(|content| vec![(path.display().to_string(), content)])
            .unwrap_or_default()
    })
}

/// Load configuration from a TOML string and validate it.
pub fn load_and_validate_str(toml_content: &str) -> Result<NudgeflowConfig, Vec<ConfigError>> {
    checked(loader::load_config_from_str(toml_content), || {
        vec![("<inline>".to_string(), toml_content.to_string())]
    })
}

/// Validate a loaded config, or turn the loader error into diagnostics.
/// `sources` is only read on the error path.
fn checked(
    loaded: Result<NudgeflowConfig, figment::Error>,
    sources: impl FnOnce() -> Vec<(String, String)>,
) -> Result<NudgeflowConfig, Vec<ConfigError>> {
    match loaded {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::from_figment(err, &sources())),
    }
}

fn collect_toml_sources() -> Vec<(String, String)> {
    let mut candidates = vec![std::path::PathBuf::from(loader::SYSTEM_CONFIG_PATH)];
    candidates.extend(loader::user_config_path());
    candidates.push(
        std::env::current_dir()
            .map(|d| d.join(loader::LOCAL_CONFIG_PATH))
            .unwrap_or_else(|_| loader::LOCAL_CONFIG_PATH.into()),
    );

    candidates
        .into_iter()
        .filter_map(|path| {
            std::fs::read_to_string(&path)
                .ok()
                .map(|content| (path.display().to_string(), content))
        })
        .collect()
}
