// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter traits for the external collaborators the pipeline consumes.
//!
//! Each one is object safe and held as `Arc<dyn ...>`, so the pipeline can
//! run against real services or test doubles alike.

pub mod adapter;
pub mod cache;
pub mod completion;
pub mod embedding;
pub mod observability;

pub use adapter::PluginAdapter;
pub use cache::CacheAdapter;
pub use completion::CompletionAdapter;
pub use embedding::EmbeddingAdapter;
pub use observability::{ObservabilitySink, emit};
