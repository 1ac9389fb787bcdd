//! The gRPC listener and its call pipeline.
//!
//! - [`listener`] - [`TransportListener`], the gRPC server actor.
//! - [`logging`] - Start/finish logging of every call.
//! - [`recovery`] - Conversion of handler panics into `INTERNAL` errors.

pub mod listener;
pub mod logging;
pub mod recovery;

pub use listener::TransportListener;
