// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for nudgeflow.
//!
//! - [`MockCompletion`]: canned or request-driven completion replies with call counting
//! - [`MockEmbedder`]: deterministic bag-of-words embeddings with a failure switch
//! - [`RecordingSink`] / [`FailingSink`]: observability sinks for assertions
//! - [`seed`]: database fixtures for behavioral tables and enriched blocks

pub mod mock_completion;
pub mod mock_embedder;
pub mod recording_sink;
pub mod seed;

pub use mock_completion::MockCompletion;
pub use mock_embedder::MockEmbedder;
pub use recording_sink::{FailingSink, RecordingSink};
pub use seed::test_db;
