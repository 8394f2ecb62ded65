// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Lenient parsing of structured completion replies.
//!
//! Models wrap JSON in markdown fences or chatter around it. Every call site
//! treats an unparseable reply as an empty result.

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Slice out the outermost JSON object of `reply`, if any.
pub fn json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

/// Parse the outermost JSON object of `reply` into `T`.
///
/// Returns `None` (and logs) when there is no object or it does not fit `T`.
pub fn parse_reply<T: DeserializeOwned>(reply: &str, what: &str) -> Option<T> {
    let Some(raw) = json_object(reply.trim()) else {
        warn!(reply_kind = what, "completion reply contained no JSON object");
        debug!(raw = reply, "unparseable reply");
        return None;
    };
    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(reply_kind = what, error = %e, "failed to parse completion reply");
            debug!(raw = reply, "unparseable reply");
            None
        }
    }
}

/// Trim, lowercase, drop empties and duplicates, keep order, cap at `max`.
pub fn normalize_labels(labels: Vec<String>, max: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for label in labels {
        let label = label.trim().to_lowercase();
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
        if out.len() == max {
            break;
        }
    }
    out
}

/// Truncate to at most `max` characters on a char boundary.
pub fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
