//! Graceful shutdown utilities
//!
//! Provides unified shutdown signal handling for all services.

use std::time::Duration;
use tracing::{info, warn};

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
///
/// # Example
///
/// ```ignore
/// tokio::select! {
///     _ = common::shutdown::wait_for_shutdown() => {
///         info!("Shutdown signal received");
///     }
///     // ... other tasks
/// }
/// ```
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!(
                    "Failed to install SIGTERM handler: {}. Service will only respond to Ctrl+C",
                    e
                );
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(mut sig) = term_signal {
                    sig.recv().await;
                } else {
                    // SIGTERM handler unavailable, only Ctrl+C will work
                    std::future::pending::<()>().await
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

/// Wait for a shutdown signal or, when `deadline` is set, for it to elapse
///
/// A zero or absent deadline means "run until signalled".
pub async fn wait_for_shutdown_or(deadline: Option<Duration>) {
    match deadline.filter(|d| !d.is_zero()) {
        Some(deadline) => {
            tokio::select! {
                _ = wait_for_shutdown() => {},
                _ = tokio::time::sleep(deadline) => {
                    info!("Run time of {:?} elapsed", deadline);
                },
            }
        },
        None => wait_for_shutdown().await,
    }
}
