//! Periodic driver for the [`Reconciler`].

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::engine::Reconciler;

/// Run cycles every `interval` until `cancel` fires.
///
/// A cycle that has started always runs to completion; cancellation is
/// only observed between cycles and during the wait.
pub async fn run_loop(mut reconciler: Reconciler, interval: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "Reconciliation loop started");
    loop {
        if cancel.is_cancelled() {
            break;
        }

        match reconciler.run_cycle().await {
            Ok(report) if report.is_clean() => {}
            Ok(report) => tracing::warn!(
                failures = report.failures.len(),
                "Cycle finished with failures, retrying next cycle"
            ),
            Err(e) => tracing::error!(error = %e, "Cycle aborted, nothing was changed"),
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    tracing::info!("Reconciliation loop stopped");
}
