// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock completion adapter for deterministic testing.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::traits::{CompletionAdapter, PluginAdapter};
use nudgeflow_core::types::{AdapterType, CompletionRequest, CompletionResponse};

type Responder = dyn Fn(&CompletionRequest) -> Option<Result<String, String>> + Send + Sync;

/// A mock completion service.
///
/// Replies come from, in order: the responder closure (if set and it returns
/// `Some`), then a FIFO queue, then the default text `"mock response"`.
/// Every request is recorded.
pub struct MockCompletion {
    queue: Mutex<VecDeque<Result<String, String>>>,
    responder: Option<Arc<Responder>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockCompletion {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            responder: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
            delay: None,
        }
    }

    /// Create a mock pre-loaded with the given replies.
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mock = Self::new();
        mock.queue
            .try_lock()
            .map(|mut q| q.extend(responses.into_iter().map(|s| Ok(s.into()))))
            .ok();
        mock
    }

    /// Reply by inspecting each request. Returning `None` falls through to the queue.
    pub fn with_responder<F>(mut self, responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Option<Result<String, String>> + Send + Sync + 'static,
    {
        self.responder = Some(Arc::new(responder));
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub async fn push_response(&self, text: impl Into<String>) {
        self.queue.lock().await.push_back(Ok(text.into()));
    }

    /// Queue a failure; the next call without a responder match returns it.
    pub async fn push_failure(&self, message: impl Into<String>) {
        self.queue.lock().await.push_back(Err(message.into()));
    }

    /// Number of `complete` calls made so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Snapshot of all requests received.
    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

impl Default for MockCompletion {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockCompletion {
    fn name(&self) -> &str {
        "mock-completion"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Completion
    }
}

#[async_trait]
impl CompletionAdapter for MockCompletion {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, NudgeflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().await.push(request.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let reply = match self.responder.as_ref().and_then(|r| r(&request)) {
            Some(reply) => reply,
            None => self
                .queue
                .lock()
                .await
                .pop_front()
                .unwrap_or_else(|| Ok("mock response".to_string())),
        };

        reply
            .map(|content| CompletionResponse {
                content,
                model: "mock-model".to_string(),
            })
            .map_err(NudgeflowError::provider)
    }
}
