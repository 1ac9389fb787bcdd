//! HTTP/JSON gateway in front of the gRPC listener.
//!
//! [`GatewayBridge`] waits for the listener to bind, dials it over loopback
//! and serves REST routes that forward to the RPCs. Responses and errors are
//! shaped the way grpc-gateway shapes them, so existing REST clients keep
//! working.

pub mod bridge;
pub mod routes;

pub use bridge::{GatewayBridge, dial_target};
pub use routes::{ErrorBody, GatewayError, http_status, router};
