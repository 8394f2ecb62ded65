// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Background worker runtime for nudgeflow.
//!
//! Claims jobs from the durable queue, runs them through a [`JobHandler`]
//! with bounded concurrency and a per-job timeout, retries failures with
//! backoff, and shuts down with a bounded drain.

pub mod backoff;
pub mod dispatch;
pub mod health;
pub mod recording;
pub mod runtime;
pub mod shutdown;

pub use dispatch::{JobHandler, PipelineDispatcher};
pub use health::HealthReport;
pub use runtime::{CleanupReport, JobOutcome, Worker, sweep};
pub use shutdown::install_signal_handler;
