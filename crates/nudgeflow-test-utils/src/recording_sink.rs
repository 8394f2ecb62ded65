// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observability sink that keeps every event for assertions.

use std::sync::Mutex;

use async_trait::async_trait;

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::traits::{ObservabilitySink, PluginAdapter};
use nudgeflow_core::types::{AdapterType, TraceEvent};

#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Names of recorded events, in arrival order.
    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }
}

#[async_trait]
impl PluginAdapter for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }
}

#[async_trait]
impl ObservabilitySink for RecordingSink {
    async fn record(&self, event: TraceEvent) -> Result<(), NudgeflowError> {
        self.events
            .lock()
            .map_err(|_| NudgeflowError::Internal("recording sink poisoned".into()))?
            .push(event);
        Ok(())
    }
}

/// Sink whose every call fails. Operations must not notice.
#[derive(Default)]
pub struct FailingSink;

#[async_trait]
impl PluginAdapter for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }
}

#[async_trait]
impl ObservabilitySink for FailingSink {
    async fn record(&self, _event: TraceEvent) -> Result<(), NudgeflowError> {
        Err(NudgeflowError::Internal("sink unavailable".into()))
    }
}
