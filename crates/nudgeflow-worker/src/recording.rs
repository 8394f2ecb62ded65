// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Worker metrics through the `metrics` facade.
//!
//! Nothing is exported unless the embedding application installs a recorder.

use metrics::{describe_counter, describe_gauge, describe_histogram};

use nudgeflow_storage::{JobType, QueueStats};

/// Register metric descriptions. Call once after installing a recorder.
pub fn register_metrics() {
    describe_counter!("nudgeflow_jobs_claimed_total", "Jobs claimed by this worker");
    describe_counter!("nudgeflow_jobs_completed_total", "Jobs completed successfully");
    describe_counter!("nudgeflow_jobs_failed_total", "Job attempts that failed");
    describe_counter!("nudgeflow_jobs_timed_out_total", "Job attempts that hit the timeout");
    describe_gauge!("nudgeflow_jobs_in_flight", "Jobs currently processing in this worker");
    describe_gauge!("nudgeflow_queue_depth", "Jobs in the queue by status");
    describe_histogram!("nudgeflow_job_duration_seconds", "Job execution time in seconds");
}

pub fn record_claimed(count: usize) {
    metrics::counter!("nudgeflow_jobs_claimed_total").increment(count as u64);
}

pub fn record_completed(job_type: JobType, seconds: f64) {
    metrics::counter!("nudgeflow_jobs_completed_total", "job_type" => job_type.to_string()).increment(1);
    metrics::histogram!("nudgeflow_job_duration_seconds", "job_type" => job_type.to_string()).record(seconds);
}

pub fn record_failed(job_type: JobType, timed_out: bool) {
    metrics::counter!("nudgeflow_jobs_failed_total", "job_type" => job_type.to_string()).increment(1);
    if timed_out {
        metrics::counter!("nudgeflow_jobs_timed_out_total", "job_type" => job_type.to_string()).increment(1);
    }
}

pub fn set_in_flight(count: usize) {
    metrics::gauge!("nudgeflow_jobs_in_flight").set(count as f64);
}

pub fn set_queue_depth(stats: &QueueStats) {
    for (status, count) in [
        ("pending", stats.pending),
        ("processing", stats.processing),
        ("completed", stats.completed),
        ("failed", stats.failed),
    ] {
        metrics::gauge!("nudgeflow_queue_depth", "status" => status).set(count as f64);
    }
}
