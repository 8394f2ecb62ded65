// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Periodic health report.

use std::time::Duration;

use serde::Serialize;

use nudgeflow_storage::QueueStats;

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub queue: QueueStats,
    pub in_flight: usize,
    pub uptime_secs: u64,
}

impl HealthReport {
    pub fn new(queue: QueueStats, in_flight: usize, uptime: Duration) -> Self {
        Self {
            queue,
            in_flight,
            uptime_secs: uptime.as_secs(),
        }
    }

    /// Uptime as `1d 2h 3m`, `2h 3m`, or `3m`.
    pub fn uptime_human(&self) -> String {
        let secs = self.uptime_secs;
        let days = secs / 86_400;
        let hours = (secs % 86_400) / 3600;
        let minutes = (secs % 3600) / 60;
        if days > 0 {
            format!("{days}d {hours}h {minutes}m")
        } else if hours > 0 {
            format!("{hours}h {minutes}m")
        } else {
            format!("{minutes}m")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uptime_formatting() {
        let report = |secs| HealthReport::new(QueueStats::default(), 0, Duration::from_secs(secs));
        assert_eq!(report(59).uptime_human(), "0m");
        assert_eq!(report(3_720).uptime_human(), "1h 2m");
        assert_eq!(report(90_061).uptime_human(), "1d 1h 1m");
    }

    #[test]
    fn serializes_queue_counts() {
        let stats = QueueStats {
            pending: 3,
            failed: 1,
            exhausted: 1,
            ..QueueStats::default()
        };
        let json = serde_json::to_value(HealthReport::new(stats, 2, Duration::from_secs(10))).unwrap();
        assert_eq!(json["queue"]["pending"], 3);
        assert_eq!(json["in_flight"], 2);
        assert_eq!(json["uptime_secs"], 10);
    }
}
