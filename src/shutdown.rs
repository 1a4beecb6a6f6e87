//! Shutdown signal plumbing
//!
//! SIGINT and SIGTERM are turned into a `watch` flag so long-running loops can
//! check for shutdown between steps instead of being torn down mid-write.

use tokio::sync::watch;

/// Waits for Ctrl+C, or SIGTERM on unix
pub async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut term = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = term.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Spawns a task that flips the returned flag to `true` on the first signal
pub fn spawn_listener() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        match wait_for_signal().await {
            Ok(()) => {
                tracing::info!("shutdown signal received");
                let _ = tx.send(true);
            }
            Err(e) => tracing::error!("Failed to install signal handler: {}", e),
        }
    });
    rx
}

/// Resolves once the flag is set; never resolves if the sender is gone unset
pub async fn requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}
