// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the nudgeflow personalization pipeline.
//!
//! This crate provides the error type, the adapter traits for the external
//! collaborators (completion service, embedding service, cache, observability
//! sink), and the small set of types shared across the workspace.

pub mod error;
pub mod sinks;
pub mod traits;
pub mod types;

pub use error::NudgeflowError;
pub use types::{AdapterType, CompletionRequest, CompletionResponse, HealthStatus, TraceEvent};

pub use traits::{
    CacheAdapter, CompletionAdapter, EmbeddingAdapter, ObservabilitySink, PluginAdapter,
};
