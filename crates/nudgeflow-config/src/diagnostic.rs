// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Loader failures become [`ConfigError`] values that miette can render with
//! the offending TOML line highlighted and, for typos, the closest valid key.

#![allow(unused_assignments)] // triggered by code from the miette Diagnostic derive

use std::io::Write;

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Jaro-Winkler score a valid key must beat to be offered as a correction.
const MIN_SIMILARITY: f64 = 0.75;

/// Name and content of each TOML file that fed the loader.
pub type TomlSources = [(String, String)];

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("`{key}` is not a nudgeflow setting")]
    #[diagnostic(
        code(nudgeflow::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        suggestion: Option<String>,
        valid_keys: String,
        #[label("unrecognized here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("`{key}` has the wrong type: {detail}")]
    #[diagnostic(code(nudgeflow::config::invalid_type), help("use a {expected} here"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
    },

    #[error("`{key}` must be set")]
    #[diagnostic(
        code(nudgeflow::config::missing_key),
        help("set `{key}` in nudgeflow.toml or through a NUDGEFLOW_ variable")
    )]
    MissingKey { key: String },

    /// A value deserialized fine but breaks a constraint.
    #[error("invalid configuration: {message}")]
    #[diagnostic(code(nudgeflow::config::validation))]
    Validation { message: String },

    #[error("could not load configuration: {0}")]
    #[diagnostic(code(nudgeflow::config::load))]
    Other(String),
}

impl ConfigError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    let mut help = String::new();
    if let Some(closest) = suggestion {
        help.push_str(&format!("closest match is `{closest}`. "));
    }
    help.push_str(&format!("Expected one of: {valid_keys}"));
    help
}

/// Split a figment error chain into one diagnostic per failure.
pub fn from_figment(err: figment::Error, sources: &TomlSources) -> Vec<ConfigError> {
    err.into_iter().map(|error| convert(&error, sources)).collect()
}

fn convert(error: &figment::Error, sources: &TomlSources) -> ConfigError {
    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let (span, src) = locate(error, field, sources).unzip();
            ConfigError::UnknownKey {
                key: field.clone(),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: qualified(&error.path, field),
        },
        Kind::InvalidType(actual, expected) => ConfigError::InvalidType {
            key: error.path.join("."),
            detail: format!("got {actual}"),
            expected: expected.to_string(),
        },
        _ => ConfigError::Other(error.to_string()),
    }
}

/// `section.field` when the error carries a section path.
fn qualified(path: &[String], field: &str) -> String {
    match path.first() {
        Some(section) if section != field => format!("{section}.{field}"),
        _ => field.to_string(),
    }
}

/// Span of `field` inside whichever loaded file the error came from.
fn locate(
    error: &figment::Error,
    field: &str,
    sources: &TomlSources,
) -> Option<(SourceSpan, NamedSource<String>)> {
    let origin = match error.metadata.as_ref()?.source.as_ref()? {
        figment::Source::File(path) => path.display().to_string(),
        _ => "<inline>".to_string(),
    };
    let (name, content) = sources.iter().find(|(name, _)| *name == origin)?;
    let offset = find_key_offset(content, &error.path, field)?;
    Some((
        SourceSpan::new(offset.into(), field.len()),
        NamedSource::new(name, content.clone()),
    ))
}

/// Byte offset of `field` as a key in `content`, looking only below the
/// `[section]` header named by the first element of `path`.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = match path.first() {
        Some(section) => {
            let header = format!("[{section}]");
            content.find(&header)? + header.len()
        }
        None => 0,
    };

    let mut offset = start;
    for line in content[start..].split_inclusive('\n') {
        let key = line.trim_start();
        let matches = key
            .strip_prefix(field)
            .is_some_and(|rest| rest.starts_with([' ', '\t', '=']));
        if matches {
            return Some(offset + line.len() - key.len());
        }
        offset += line.len();
    }
    None
}

/// The valid key most similar to `unknown`, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    let mut best: Option<(f64, &str)> = None;
    for key in valid_keys {
        let score = strsim::jaro_winkler(unknown, key);
        if score > MIN_SIMILARITY && best.is_none_or(|(top, _)| score > top) {
            best = Some((score, key));
        }
    }
    best.map(|(_, key)| key.to_string())
}

/// Print every error to stderr, graphically when the terminal allows it.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = GraphicalReportHandler::new();
    let mut stderr = std::io::stderr().lock();
    for error in errors {
        let mut rendered = String::new();
        let written = match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => write!(stderr, "{rendered}"),
            Err(_) => writeln!(stderr, "error: {error}"),
        };
        if written.is_err() {
            return;
        }
    }
}
