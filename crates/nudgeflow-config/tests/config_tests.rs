// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests for the nudgeflow configuration system.

use nudgeflow_config::diagnostic::ConfigError;
use nudgeflow_config::{LogFormat, load_and_validate_str, load_config_from_str};

#[test]
fn full_toml_deserializes() {
    let toml = r#"
[service]
log_level = "debug"
log_format = "json"

[storage]
database_path = "/tmp/nudgeflow-test.db"
wal_mode = false

[features]
llm_nudges_enabled = true
relation_detection_enabled = false

[queue]
max_attempts = 5

[worker]
max_concurrency = 8
job_timeout_secs = 10

[memory]
similarity_threshold = 0.6
relation_quota_per_hour = 2

[nudges]
ttl_hours = 12

[llm]
base_url = "http://localhost:8080/v1"
completion_model = "local-model"
"#;

    let config = load_config_from_str(toml).expect("valid TOML should deserialize");
    assert_eq!(config.service.log_level, "debug");
    assert_eq!(config.service.log_format, LogFormat::Json);
    assert_eq!(config.storage.database_path, "/tmp/nudgeflow-test.db");
    assert!(!config.storage.wal_mode);
    assert!(config.features.llm_nudges_enabled);
    assert!(!config.features.relation_detection_enabled);
    assert!(config.features.memory_enabled);
    assert_eq!(config.queue.max_attempts, 5);
    assert_eq!(config.worker.max_concurrency, 8);
    assert_eq!(config.worker.job_timeout_secs, 10);
    assert_eq!(config.memory.similarity_threshold, 0.6);
    assert_eq!(config.memory.relation_quota_per_hour, 2);
    assert_eq!(config.nudges.ttl_hours, 12);
    assert_eq!(config.llm.base_url, "http://localhost:8080/v1");
    assert_eq!(config.llm.completion_model, "local-model");
}

#[test]
fn empty_toml_yields_defaults() {
    let config = load_and_validate_str("").expect("defaults are valid");
    assert_eq!(config.worker.poll_interval_ms, 1000);
    assert_eq!(config.memory.retrieval_limit, 5);
}

#[test]
fn unknown_key_gets_suggestion() {
    let toml = "[worker]\nmax_concurency = 3\n";
    let errors = load_and_validate_str(toml).expect_err("unknown key must be rejected");
    assert_eq!(errors.len(), 1);
    match &errors[0] {
        ConfigError::UnknownKey {
            key, suggestion, ..
        } => {
            assert_eq!(key, "max_concurency");
            assert_eq!(suggestion.as_deref(), Some("max_concurrency"));
        }
        other => panic!("expected UnknownKey, got {other:?}"),
    }
}

#[test]
fn unknown_section_is_rejected() {
    let errors = load_and_validate_str("[telemetry]\nenabled = true\n").unwrap_err();
    assert!(matches!(errors[0], ConfigError::UnknownKey { .. }));
}

#[test]
fn wrong_type_is_reported() {
    let errors = load_and_validate_str("[worker]\nmax_concurrency = \"many\"\n").unwrap_err();
    assert!(
        matches!(&errors[0], ConfigError::InvalidType { key, .. } if key.contains("max_concurrency")),
        "got {:?}",
        errors[0]
    );
}

#[test]
fn validation_errors_surface_through_loader() {
    let toml = "[memory]\nsimilarity_threshold = 2.0\n\n[llm]\nbase_url = \"ftp://nope\"\n";
    let errors = load_and_validate_str(toml).unwrap_err();
    assert_eq!(errors.len(), 2);
    assert!(
        errors
            .iter()
            .all(|e| matches!(e, ConfigError::Validation { .. }))
    );
}

#[test]
fn invalid_log_format_is_rejected() {
    assert!(load_and_validate_str("[service]\nlog_format = \"xml\"\n").is_err());
}
