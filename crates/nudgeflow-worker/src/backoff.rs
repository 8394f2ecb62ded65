// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

/// Delay before retry number `attempts`: `base * attempts`, capped at `max`.
pub fn retry_delay(attempts: u32, base: Duration, max: Duration) -> Duration {
    base.saturating_mul(attempts.max(1)).min(max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_with_attempts_and_caps() {
        let base = Duration::from_secs(2);
        let max = Duration::from_secs(5);
        assert_eq!(retry_delay(1, base, max), Duration::from_secs(2));
        assert_eq!(retry_delay(2, base, max), Duration::from_secs(4));
        assert_eq!(retry_delay(3, base, max), max);
        assert_eq!(retry_delay(u32::MAX, base, max), max);
    }

    #[test]
    fn zero_attempts_still_waits_once() {
        let base = Duration::from_millis(100);
        assert_eq!(retry_delay(0, base, Duration::from_secs(1)), base);
    }
}
