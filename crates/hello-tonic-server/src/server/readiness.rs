//! Single-fire startup barrier between actors.
//!
//! The gRPC listener fires its [`ReadySignal`] once its socket is bound; the
//! gateway holds the matching [`ReadyWaiter`] and does not dial before that.
//! The signal carries the bound address so a listener started on port `0`
//! can still be reached.

use crate::server::error::{Result, ServerError};
use std::net::SocketAddr;
use tokio::sync::watch;

/// Creates a connected signal/waiter pair.
pub fn readiness() -> (ReadySignal, ReadyWaiter) {
    let (tx, rx) = watch::channel(None);
    (ReadySignal { tx }, ReadyWaiter { rx })
}

/// Firing side of the barrier. Owned by the actor that becomes ready.
#[derive(Debug)]
pub struct ReadySignal {
    tx: watch::Sender<Option<SocketAddr>>,
}

impl ReadySignal {
    /// Marks the owner as ready at `addr`. Only the first call has an effect.
    pub fn fire(&self, addr: SocketAddr) {
        self.tx.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(addr);
            true
        });
    }
}

/// Waiting side of the barrier. Cheap to clone; every clone observes the same
/// signal.
#[derive(Debug, Clone)]
pub struct ReadyWaiter {
    rx: watch::Receiver<Option<SocketAddr>>,
}

impl ReadyWaiter {
    /// Waits until the signal fires and returns the advertised address.
    ///
    /// Returns immediately if the signal already fired.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::NotReady`] if the signal is dropped without
    /// firing, e.g. because the listener failed to bind.
    pub async fn wait(&mut self) -> Result<SocketAddr> {
        let ready = *self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ServerError::NotReady)?;
        ready.ok_or(ServerError::NotReady)
    }

    /// Returns the advertised address without waiting.
    pub fn get(&self) -> Option<SocketAddr> {
        *self.rx.borrow()
    }
}
