// SPDX-FileCopyrightText: 2026 Nudgeflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signal handling and in-flight job draining.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Installs handlers for SIGTERM and SIGINT.
///
/// Returns a [`CancellationToken`] cancelled when either signal arrives.
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT, initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                    }
                }
                Err(e) => {
                    warn!(error = %e, "could not install SIGTERM handler, listening for Ctrl+C only");
                    let _ = ctrl_c.await;
                    info!("received SIGINT, initiating shutdown");
                }
            }
        }

        #[cfg(not(unix))]
        {
            let _ = ctrl_c.await;
            info!("received Ctrl+C, initiating shutdown");
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Wait up to `grace` for in-flight tasks, then abort the rest.
///
/// Returns how many tasks were aborted. Aborted jobs stay `processing` and
/// are recovered as stale on the next start.
pub async fn drain<T: 'static>(tasks: &mut JoinSet<T>, grace: Duration) -> usize {
    if tasks.is_empty() {
        info!("no in-flight jobs to drain");
        return 0;
    }
    info!(count = tasks.len(), "waiting for in-flight jobs to finish");
    let finished = tokio::time::timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;
    if finished.is_ok() {
        info!("all in-flight jobs finished");
        return 0;
    }
    let remaining = tasks.len();
    warn!(remaining, "shutdown grace period elapsed, aborting in-flight jobs");
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}
    remaining
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn install_signal_handler_returns_live_token() {
        let token = install_signal_handler();
        assert!(!token.is_cancelled());
        token.cancel();
    }

    #[tokio::test]
    async fn drain_empty_set_is_immediate() {
        let mut tasks: JoinSet<()> = JoinSet::new();
        assert_eq!(drain(&mut tasks, Duration::from_millis(10)).await, 0);
    }

    #[tokio::test(start_paused = true)]
    #[tracing_test::traced_test]
    async fn drain_waits_then_aborts() {
        let mut tasks = JoinSet::new();
        tasks.spawn(async { tokio::time::sleep(Duration::from_millis(50)).await });
        tasks.spawn(async { tokio::time::sleep(Duration::from_secs(3600)).await });

        let aborted = drain(&mut tasks, Duration::from_secs(1)).await;
        assert_eq!(aborted, 1);
        assert!(tasks.is_empty());
        assert!(logs_contain("aborting in-flight jobs"));
    }
}
