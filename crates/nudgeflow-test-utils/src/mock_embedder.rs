// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic bag-of-words embedder.
//!
//! Each lowercase alphanumeric token is hashed (FNV-1a) into one of
//! [`DIMENSIONS`] buckets and the vector is L2-normalized, so texts sharing
//! words have high cosine similarity and disjoint texts score near zero.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::traits::{EmbeddingAdapter, PluginAdapter};
use nudgeflow_core::types::AdapterType;

pub const DIMENSIONS: usize = 64;

pub struct MockEmbedder {
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// An embedder whose every call fails.
    pub fn failing() -> Self {
        let embedder = Self::new();
        embedder.set_failing(true);
        embedder
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The vector `embed` would return for `text`.
    pub fn vector_for(text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; DIMENSIONS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            v[bucket(&token.to_lowercase())] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        v
    }
}

fn bucket(token: &str) -> usize {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0100_0000_01b3);
    }
    (hash % DIMENSIONS as u64) as usize
}

impl Default for MockEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, NudgeflowError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(NudgeflowError::provider("mock embedder configured to fail"));
        }
        Ok(Self::vector_for(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn identical_text_is_identical_vector() {
        let a = MockEmbedder::vector_for("Slept badly, anxious about work");
        let b = MockEmbedder::vector_for("slept BADLY anxious about work");
        assert!((dot(&a, &b) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_is_zero_vector() {
        assert!(MockEmbedder::vector_for("  ").iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn failure_toggle() {
        let embedder = MockEmbedder::failing();
        assert!(embedder.embed("x").await.is_err());
        embedder.set_failing(false);
        assert_eq!(embedder.embed("x").await.unwrap().len(), DIMENSIONS);
        assert_eq!(embedder.call_count(), 2);
    }
}
