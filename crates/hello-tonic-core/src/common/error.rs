//! Error types for RPC handlers.
//!
//! This module defines the `Error` enum returned at the call boundary. It
//! implements `From<Error>` for `tonic::Status` so handler code and the call
//! pipeline can propagate failures to clients with appropriate status codes.
//!
//! ## Error Cases
//! - `HandlerPanicked`: A handler panicked and the call pipeline recovered.
//! - `InvalidRequest`: The client request was malformed.
//! - `ServiceShutdown`: A request arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for RPC calls.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// A handler panicked; the panic was contained at the call boundary.
    #[error("Handler panicked: {message}")]
    HandlerPanicked { message: String },

    /// The client request was invalid.
    #[error("Invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::HandlerPanicked { message } => {
                Status::internal(format!("panic caught: {message}"))
            }
            Error::InvalidRequest { reason } => Status::invalid_argument(reason),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn panics_surface_as_internal() {
        let status = Status::from(Error::HandlerPanicked {
            message: "boom".to_string(),
        });
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "panic caught: boom");
    }

    #[test]
    fn shutdown_surfaces_as_unavailable() {
        let status = Status::from(Error::ServiceShutdown);
        assert_eq!(status.code(), Code::Unavailable);
    }

    #[test]
    fn invalid_request_keeps_reason() {
        let status = Status::from(Error::InvalidRequest {
            reason: "missing name".to_string(),
        });
        assert_eq!(status.code(), Code::InvalidArgument);
        assert_eq!(status.message(), "missing name");
    }
}
