use std::future::Future;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    Completed(T),
    Cancelled,
}

/// Waits on `work` and `cancel` together; whichever resolves first wins and
/// the other is dropped.
pub async fn race_cancellation<T, W, C>(work: W, cancel: C) -> RaceOutcome<T>
where
    W: Future<Output = T>,
    C: Future<Output = ()>,
{
    tokio::select! {
        value = work => RaceOutcome::Completed(value),
        () = cancel => RaceOutcome::Cancelled,
    }
}

/// Resolves on SIGINT or SIGTERM. Never resolves if no handler could be
/// installed.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if result.is_err() {
                            let _ = terminate.recv().await;
                        }
                    }
                    _ = terminate.recv() => {}
                }
            }
            Err(_) => interrupt().await,
        }
    }
    #[cfg(not(unix))]
    interrupt().await;
}

async fn interrupt() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
