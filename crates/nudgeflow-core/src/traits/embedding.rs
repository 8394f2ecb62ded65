// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text embeddings for similarity search.

use async_trait::async_trait;

use crate::error::NudgeflowError;
use crate::traits::adapter::PluginAdapter;

/// Adapter for the black-box `embed(text) -> vector` service.
#[async_trait]
pub trait EmbeddingAdapter: PluginAdapter {
    /// Generates one embedding vector for the given text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, NudgeflowError>;
}
