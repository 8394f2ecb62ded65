// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-process cache adapters.
//!
//! [`InMemoryCache`] is a bounded LRU with per-entry expiry. [`NoopCache`]
//! always misses; every caller must behave correctly with it installed.

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;

use nudgeflow_core::NudgeflowError;
use nudgeflow_core::traits::{CacheAdapter, PluginAdapter};
use nudgeflow_core::types::AdapterType;

/// Entry limit used by [`InMemoryCache::new`].
pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// TTL cache backed by an `LruCache`.
///
/// Holds at most `capacity` entries, evicting the least recently used. Expired
/// entries are purged on every `set` and dropped on read.
pub struct InMemoryCache {
    entries: Mutex<LruCache<String, (String, Instant)>>,
}

impl Default for InMemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::with_capacity(NonZeroUsize::new(DEFAULT_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }

    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .await
            .iter()
            .filter(|(_, (_, expires))| *expires > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entries held in memory, expired or not.
    pub async fn stored(&self) -> usize {
        self.entries.lock().await.len()
    }
}

fn purge_expired(entries: &mut LruCache<String, (String, Instant)>, now: Instant) {
    let expired: Vec<String> = entries
        .iter()
        .filter(|(_, (_, expires))| *expires <= now)
        .map(|(key, _)| key.clone())
        .collect();
    for key in expired {
        entries.pop(&key);
    }
}

/// Whether `key` matches `pattern`; a trailing `*` matches any suffix.
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl PluginAdapter for InMemoryCache {
    fn name(&self) -> &str {
        "in-memory"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Cache
    }
}

#[async_trait]
impl CacheAdapter for InMemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, NudgeflowError> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        let hit = match entries.get(key) {
            Some((value, expires)) if *expires > now => Some(value.clone()),
            Some(_) => None,
            None => return Ok(None),
        };
        if hit.is_none() {
            entries.pop(key);
        }
        Ok(hit)
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), NudgeflowError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        purge_expired(&mut entries, now);
        entries.put(key.to_string(), (value, now + ttl));
        Ok(())
    }

    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, NudgeflowError> {
        let mut entries = self.entries.lock().await;
        let matching: Vec<String> = entries
            .iter()
            .filter(|(key, _)| matches_pattern(pattern, key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &matching {
            entries.pop(key);
        }
        Ok(matching.len() as u64)
    }
}

/// A cache that never stores anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopCache;

#[async_trait]
impl PluginAdapter for NoopCache {
    fn name(&self) -> &str {
        "noop"
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Cache
    }
}

#[async_trait]
impl CacheAdapter for NoopCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, NudgeflowError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: String, _ttl: Duration) -> Result<(), NudgeflowError> {
        Ok(())
    }

    async fn invalidate_pattern(&self, _pattern: &str) -> Result<u64, NudgeflowError> {
        Ok(0)
    }
}
