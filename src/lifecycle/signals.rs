//! OS signal handling.
//!
//! SIGINT (Ctrl-C) and, on Unix, SIGTERM both mean graceful shutdown.
//! Config reload is driven by the file watcher, not by SIGHUP.

use std::sync::Arc;

use tokio::signal;

use crate::lifecycle::Shutdown;

/// Resolve once a termination signal arrives. Returns the signal name.
pub async fn wait_for_termination() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        let mut term = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = term.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await.map(|()| "ctrl-c")
    }
}

/// Spawn a task that triggers `shutdown` on the first termination signal.
pub fn listen_for_termination(shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        match wait_for_termination().await {
            Ok(name) => shutdown.trigger(name),
            Err(e) => tracing::error!(error = %e, "Failed to install signal handlers"),
        }
    });
}
