//! Graceful shutdown handling for SIGTERM and SIGINT.

use tokio::signal;
use tracing::{error, info};

async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            error!(error = %e, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn terminate() {
    std::future::pending::<()>().await;
}

/// Resolves once the process receives SIGINT or SIGTERM.
///
/// A handler that cannot be installed is logged and never fires; if
/// neither can be installed this never resolves.
pub async fn wait_for_shutdown() {
    tokio::select! {
        _ = ctrl_c() => {
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown...");
        }
        _ = terminate() => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
