//! Actor group with coordinated shutdown.
//!
//! Every long-running part of the process implements [`Actor`]: a blocking
//! `run` plus a non-blocking `interrupt`. An [`ActorGroup`] starts all of
//! them concurrently and, as soon as any one returns, interrupts every member
//! and waits for all of them to unwind. Listening for OS signals is just
//! another actor ([`SignalWatcher`]), so an external Ctrl+C and an internal
//! failure take the same shutdown path.
//!
//! ```text
//!   ActorGroup::run()
//!      ├─ spawn run() for actor[0] ... actor[N-1]
//!      ├─ wait for the first exit ──► Cause { actor, error }
//!      ├─ interrupt(&cause) on every actor, once
//!      └─ join the rest ──► Ok(()) | ActorFailed | AbnormalShutdown
//! ```

mod actor;
mod error;
mod group;
mod signal;

pub use actor::{Actor, Cause};
pub use error::Error;
pub use group::ActorGroup;
pub use signal::SignalWatcher;

use core::any::Any;

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
