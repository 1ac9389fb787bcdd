//! Errors raised while starting or running the listeners.
//!
//! Every variant here is fatal for the actor that produced it: the supervisor
//! interrupts the rest of the group and the process exits non-zero. Per-call
//! failures never reach this type, they are converted to a
//! [`tonic::Status`] at the call boundary instead.

use std::net::SocketAddr;

pub type Result<T> = core::result::Result<T, ServerError>;

#[derive(thiserror::Error, Debug)]
pub enum ServerError {
    /// The listening socket could not be bound (port in use, permissions, ...).
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The gRPC transport failed while serving.
    #[error("gRPC server failed: {0}")]
    Serve(#[from] tonic::transport::Error),

    /// The gateway could not connect to the gRPC listener.
    #[error("failed to dial gRPC endpoint {endpoint}: {source}")]
    Dial {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The gateway upstream address could not be turned into an endpoint.
    #[error("invalid gRPC endpoint {endpoint}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: tonic::transport::Error,
    },

    /// The HTTP gateway failed while serving.
    #[error("gateway server failed: {0}")]
    Gateway(#[source] std::io::Error),

    /// An OS signal handler could not be installed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),

    /// The reflection service could not be built from the descriptor sets.
    #[error("failed to build reflection service: {0}")]
    Reflection(#[from] tonic_reflection::server::Error),

    /// A readiness signal was dropped before it fired.
    #[error("upstream never became ready")]
    NotReady,

    /// `run()` was invoked a second time on a single-use actor.
    #[error("{0} was already started")]
    AlreadyStarted(&'static str),
}
