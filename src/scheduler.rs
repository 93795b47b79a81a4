//! Fixed-interval trigger for the poller.
use std::future::Future;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::poller::{ReviewPoller, RunOutcome};

/// Run `poller` now and then every `interval` until `shutdown` resolves.
/// A run in progress is never interrupted; shutdown is observed between
/// runs. Failures are logged and retried on the next tick. Returns the
/// number of runs performed.
pub async fn run_every<S>(poller: &ReviewPoller, interval: Duration, shutdown: S) -> usize
where
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut ticks = 0usize;
    loop {
        ticks += 1;
        log_outcome(poller.run().await);

        tokio::select! {
            _ = &mut shutdown => {
                info!(ticks, "scheduler stopped");
                return ticks;
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

/// Resolves on SIGINT / Ctrl-C. The handler is installed before this
/// returns, so an interrupt arriving during a run is held until the
/// scheduler next checks for shutdown.
pub fn interrupt() -> std::io::Result<impl Future<Output = ()>> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        Ok(async move {
            sigint.recv().await;
        })
    }
    #[cfg(not(unix))]
    {
        let (tx, rx) = tokio::sync::oneshot::channel();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    let _ = tx.send(());
                }
                Err(err) => warn!(?err, "failed to listen for ctrl-c"),
            }
        });
        Ok(async move {
            if rx.await.is_err() {
                std::future::pending::<()>().await;
            }
        })
    }
}

fn log_outcome(result: crate::error::Result<RunOutcome>) {
    match result {
        Ok(RunOutcome::Skipped(reason)) => info!(?reason, "run skipped"),
        Ok(RunOutcome::Primed { cursor }) => info!(cursor, "cursor primed"),
        Ok(RunOutcome::Completed {
            fetched,
            published,
            cursor,
        }) => info!(fetched, published = published.len(), cursor, "run complete"),
        Err(err) if err.is_retryable() => warn!(error = %err, "run failed; will retry next tick"),
        Err(err) => error!(error = %err, "run failed"),
    }
}
