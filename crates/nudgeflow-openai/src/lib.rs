// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible completion and embedding adapters.
//!
//! Implements [`CompletionAdapter`] over `/chat/completions` and
//! [`EmbeddingAdapter`] over `/embeddings`. Any server speaking the same
//! wire format works via `llm.base_url`.

pub mod client;
pub mod types;

use std::time::Duration;

use async_trait::async_trait;
use nudgeflow_config::LlmConfig;
use nudgeflow_core::traits::{CompletionAdapter, EmbeddingAdapter, PluginAdapter};
use nudgeflow_core::types::{AdapterType, CompletionRequest, CompletionResponse};
use nudgeflow_core::NudgeflowError;
use tracing::{debug, info};

use crate::client::OpenAiClient;
use crate::types::{ChatMessage, ChatRequest, ChatResponse, EmbeddingRequest, EmbeddingResponse};

const API_KEY_ENV: &str = "NUDGEFLOW_LLM_API_KEY";

/// Completion adapter backed by `/chat/completions`.
pub struct OpenAiCompletion {
    client: OpenAiClient,
    model: String,
}

impl OpenAiCompletion {
    pub fn new(config: &LlmConfig) -> Result<Self, NudgeflowError> {
        let client = build_client(config)?;
        info!(model = config.completion_model, base_url = client.base_url(), "completion adapter initialized");
        Ok(Self::with_client(client, config.completion_model.clone()))
    }

    pub fn with_client(client: OpenAiClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiCompletion {
    fn name(&self) -> &str {
        "openai-completion"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }
}

#[async_trait]
impl CompletionAdapter for OpenAiCompletion {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, NudgeflowError> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(request.system_prompt),
                ChatMessage::user(request.user_prompt),
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };
        let response: ChatResponse = self.client.post_json("/chat/completions", &body).await?;
        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        debug!(model = %response.model, chars = content.len(), "completion received");
        let model = if response.model.is_empty() {
            self.model.clone()
        } else {
            response.model
        };
        Ok(CompletionResponse { content, model })
    }
}

/// Embedding adapter backed by `/embeddings`.
pub struct OpenAiEmbedder {
    client: OpenAiClient,
    model: String,
}

impl OpenAiEmbedder {
    pub fn new(config: &LlmConfig) -> Result<Self, NudgeflowError> {
        let client = build_client(config)?;
        info!(model = config.embedding_model, "embedding adapter initialized");
        Ok(Self::with_client(client, config.embedding_model.clone()))
    }

    pub fn with_client(client: OpenAiClient, model: String) -> Self {
        Self { client, model }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiEmbedder {
    fn name(&self) -> &str {
        "openai-embedding"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }
}

#[async_trait]
impl EmbeddingAdapter for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, NudgeflowError> {
        let body = EmbeddingRequest {
            model: self.model.clone(),
            input: text.to_string(),
        };
        let response: EmbeddingResponse = self.client.post_json("/embeddings", &body).await?;
        let vector = response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| NudgeflowError::provider("embedding response contained no vector"))?;
        Ok(vector)
    }
}

fn build_client(config: &LlmConfig) -> Result<OpenAiClient, NudgeflowError> {
    let api_key = resolve_api_key(config.api_key.as_deref())?;
    OpenAiClient::new(
        &api_key,
        &config.base_url,
        Duration::from_secs(config.timeout_secs),
        config.max_retries,
    )
}

/// Config value first, then the `NUDGEFLOW_LLM_API_KEY` environment variable.
fn resolve_api_key(configured: Option<&str>) -> Result<String, NudgeflowError> {
    if let Some(key) = configured.filter(|k| !k.is_empty()) {
        return Ok(key.to_string());
    }
    std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty()).ok_or_else(|| {
        NudgeflowError::Config(format!(
            "LLM API key not found. Set llm.api_key in config or the {API_KEY_ENV} environment variable."
        ))
    })
}
