//! OS signal handling as an actor.
//!
//! [`SignalWatcher::run`] returns cleanly on the first SIGINT (Ctrl+C) or
//! SIGTERM, which makes the group interrupt every other actor. When force quit
//! is enabled, a Ctrl+C received while the group is unwinding exits the
//! process immediately. This holds whichever actor started the shutdown.

use super::{Actor, Cause};
use crate::server::error::ServerError;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Exit status used when a second Ctrl+C forces the process down.
pub const FORCE_QUIT_EXIT_CODE: i32 = 130;

pub struct SignalWatcher {
    shutdown: CancellationToken,
    force_quit: bool,
    armed: AtomicBool,
}

impl SignalWatcher {
    pub fn new() -> Self {
        Self {
            shutdown: CancellationToken::new(),
            force_quit: true,
            armed: AtomicBool::new(false),
        }
    }

    /// Enables or disables exiting on a second Ctrl+C.
    pub fn with_force_quit(mut self, force_quit: bool) -> Self {
        self.force_quit = force_quit;
        self
    }

    /// Whether a further Ctrl+C now exits the process.
    pub fn is_force_quit_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    fn arm_force_quit(&self) {
        if self.armed.swap(true, Ordering::SeqCst) {
            return;
        }
        tokio::spawn(async {
            if signal::ctrl_c().await.is_ok() {
                tracing::warn!("Received second Ctrl+C signal, forcing exit");
                std::process::exit(FORCE_QUIT_EXIT_CODE);
            }
        });
    }
}

impl Default for SignalWatcher {
    fn default() -> Self {
        Self::new()
    }
}

#[tonic::async_trait]
impl Actor for SignalWatcher {
    fn name(&self) -> &str {
        "signal"
    }

    async fn run(&self) -> anyhow::Result<()> {
        #[cfg(unix)]
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(ServerError::Signal)?;

        #[cfg(unix)]
        let terminate = terminate.recv();

        #[cfg(not(unix))]
        let terminate = std::future::pending::<Option<()>>();

        tokio::select! {
            res = signal::ctrl_c() => {
                res.map_err(ServerError::Signal)?;
                tracing::info!("Received Ctrl+C signal");
            },
            _ = terminate => {
                tracing::info!("Received SIGTERM signal");
            },
            () = self.shutdown.cancelled() => {
                tracing::debug!("Signal watcher interrupted by another actor");
            },
        }

        if self.force_quit {
            tracing::info!("Shutting down gracefully, press Ctrl+C to force");
            self.arm_force_quit();
        } else {
            tracing::info!("Shutting down gracefully");
        }
        Ok(())
    }

    fn interrupt(&self, _cause: &Cause<'_>) {
        self.shutdown.cancel();
    }
}
