//! OS signal handling.
//!
//! # Responsibilities
//! - Register handlers for SIGTERM and SIGINT
//! - Translate the first one received into a shutdown trigger

use tokio::signal::unix::{signal, SignalKind};

use crate::lifecycle::Shutdown;

/// Wait for SIGTERM or SIGINT and return the signal's name.
pub async fn wait_for_signal() -> std::io::Result<&'static str> {
    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = terminate.recv() => Ok("SIGTERM"),
        _ = interrupt.recv() => Ok("SIGINT"),
    }
}

/// Trigger `shutdown` once a termination signal arrives.
///
/// If the handlers cannot be installed the controller keeps running and
/// must be stopped externally.
pub async fn shutdown_on_signal(shutdown: Shutdown) {
    match wait_for_signal().await {
        Ok(name) => {
            tracing::info!(signal = name, "Shutdown signal received");
            shutdown.trigger();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed installing signal handlers");
        }
    }
}
