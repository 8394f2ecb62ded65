// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cache adapter trait for advisory key-value caching.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::NudgeflowError;
use crate::traits::adapter::PluginAdapter;

/// Advisory key-value cache.
///
/// Every caller must stay correct when the cache always misses; errors are
/// logged and treated as a miss, never propagated to the user-facing path.
#[async_trait]
pub trait CacheAdapter: PluginAdapter {
    /// Returns the cached value for `key`, if present and not expired.
    async fn get(&self, key: &str) -> Result<Option<String>, NudgeflowError>;

    /// Stores `value` under `key` for `ttl`.
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), NudgeflowError>;

    /// Removes every key matching `pattern`. A trailing `*` matches any suffix.
    ///
    /// Returns the number of removed entries.
    async fn invalidate_pattern(&self, pattern: &str) -> Result<u64, NudgeflowError>;
}
