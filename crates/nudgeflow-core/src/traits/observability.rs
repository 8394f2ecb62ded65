// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observability sink trait for fire-and-forget trace emission.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::error::NudgeflowError;
use crate::traits::adapter::PluginAdapter;
use crate::types::TraceEvent;

/// Fire-and-forget trace/score sink.
///
/// Absence or failure of the sink never changes the outcome of an operation.
#[async_trait]
pub trait ObservabilitySink: PluginAdapter {
    /// Records a trace event.
    async fn record(&self, event: TraceEvent) -> Result<(), NudgeflowError>;
}

/// Emits `event` on a detached task. Never blocks and never fails the caller.
///
/// Outside a tokio runtime the event is dropped.
pub fn emit(sink: &Arc<dyn ObservabilitySink>, event: TraceEvent) {
    let Ok(handle) = tokio::runtime::Handle::try_current() else {
        debug!(event = %event.name, "no runtime, dropping trace event");
        return;
    };
    let sink = Arc::clone(sink);
    handle.spawn(async move {
        let name = event.name.clone();
        if let Err(e) = sink.record(event).await {
            debug!(event = %name, error = %e, "observability sink rejected event");
        }
    });
}
