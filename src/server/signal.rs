// Signal handling module
//
// Supported signals:
// - SIGTERM: Graceful shutdown
// - SIGINT:  Graceful shutdown (Ctrl+C)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::logger;

/// Process-wide shutdown flag shared by the accept loop and the load monitor
#[derive(Debug, Default)]
pub struct Shutdown {
    requested: AtomicBool,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        if !self.requested.swap(true, Ordering::SeqCst) {
            self.notify.notify_waiters();
        }
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    /// Resolves once `trigger` has been called, including before this call.
    pub async fn wait(&self) {
        // Registered before the flag check so a concurrent trigger is not lost
        let notified = self.notify.notified();
        if self.is_requested() {
            return;
        }
        notified.await;
    }
}

/// Start signal handlers (Unix only)
///
/// Spawns a background task that turns SIGTERM or SIGINT into a shutdown request.
#[cfg(unix)]
pub fn start_signal_handler(shutdown: Arc<Shutdown>) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tracing::debug!(pid = std::process::id(), "[SIGNAL] SIGTERM/SIGINT handlers registered");

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        };
        logger::log_signal(name);
        shutdown.trigger();
    });
    Ok(())
}

/// Fallback for other platforms: only Ctrl+C
#[cfg(not(unix))]
pub fn start_signal_handler(shutdown: Arc<Shutdown>) -> std::io::Result<()> {
    tokio::spawn(async move {
        if let Ok(()) = tokio::signal::ctrl_c().await {
            logger::log_signal("Ctrl+C");
            shutdown.trigger();
        }
    });
    Ok(())
}
