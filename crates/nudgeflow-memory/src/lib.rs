// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Asynchronous memory pipeline for nudgeflow.
//!
//! A block is written synchronously in minimal form by [`MemoryPipeline::ingest_minimal`],
//! enriched and embedded later by the worker ([`MemoryPipeline::enrich_and_embed`]),
//! linked to related blocks ([`MemoryPipeline::detect_relations`]), and served back
//! as a compact synthesized context ([`MemoryPipeline::retrieve`]).

pub mod cache;
pub mod controls;
pub mod enrichment;
pub mod events;
pub mod ingest;
pub mod parse;
pub mod relations;
pub mod retrieval;
pub mod summary;

use std::sync::Arc;

use nudgeflow_config::{FeatureConfig, MemoryConfig};
use nudgeflow_core::traits::{
    CacheAdapter, CompletionAdapter, EmbeddingAdapter, ObservabilitySink, emit,
};
use nudgeflow_core::types::TraceEvent;
use nudgeflow_storage::Database;

pub use cache::{InMemoryCache, NoopCache};
pub use enrichment::EnrichOutcome;
pub use events::{MemoryEvent, MemoryEvents};
pub use relations::RelationOutcome;
pub use retrieval::{RetrievalQuery, SynthesizedContext};

/// The external services the pipeline talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub completion: Arc<dyn CompletionAdapter>,
    pub embedder: Arc<dyn EmbeddingAdapter>,
    pub cache: Arc<dyn CacheAdapter>,
    pub sink: Arc<dyn ObservabilitySink>,
}

/// Entry point for every memory operation.
///
/// Cheap to clone; all state lives in the store and the collaborators.
#[derive(Clone)]
pub struct MemoryPipeline {
    db: Database,
    services: Collaborators,
    events: MemoryEvents,
    features: FeatureConfig,
    config: MemoryConfig,
    max_attempts: u32,
}

impl MemoryPipeline {
    /// `max_attempts` applies to the jobs the pipeline enqueues.
    pub fn new(
        db: Database,
        services: Collaborators,
        events: MemoryEvents,
        features: FeatureConfig,
        config: MemoryConfig,
        max_attempts: u32,
    ) -> Self {
        Self {
            db,
            services,
            events,
            features,
            config,
            max_attempts,
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn services(&self) -> &Collaborators {
        &self.services
    }

    pub fn events(&self) -> &MemoryEvents {
        &self.events
    }

    pub fn features(&self) -> FeatureConfig {
        self.features
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub(crate) fn trace(&self, event: TraceEvent) {
        emit(&self.services.sink, event);
    }
}
