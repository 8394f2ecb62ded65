// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Completion adapter trait for the language-model service.

use async_trait::async_trait;

use crate::error::NudgeflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::{CompletionRequest, CompletionResponse};

/// Adapter for the black-box `complete(system_prompt, user_prompt) -> text` service.
///
/// Used for enrichment, relation detection, context synthesis, and fallback
/// nudges. Callers must tolerate non-JSON content in the response.
#[async_trait]
pub trait CompletionAdapter: PluginAdapter {
    /// Sends a completion request and returns the full response text.
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, NudgeflowError>;
}
