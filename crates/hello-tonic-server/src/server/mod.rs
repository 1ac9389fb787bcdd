//! Server-side components of the `hello-tonic` service.
//!
//! The process runs three long-lived units, each registered as an
//! [`Actor`](supervisor::Actor) with a single [`ActorGroup`](supervisor::ActorGroup):
//!
//! - a [`SignalWatcher`](supervisor::SignalWatcher) waiting for SIGINT/SIGTERM,
//! - the gRPC [`TransportListener`](transport::TransportListener), and
//! - the HTTP/JSON [`GatewayBridge`](gateway::GatewayBridge).
//!
//! Whichever exits first (signal, fatal error, or a clean return) interrupts
//! the others, and the group returns once every actor has unwound.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration.
//! - [`error`] - Setup and runtime errors of the listeners.
//! - [`gateway`] - HTTP/JSON to gRPC transcoding bridge.
//! - [`health`] - `grpc.health.v1` serving status.
//! - [`readiness`] - Single-fire startup barrier between actors.
//! - [`service`] - The `HelloService` handler.
//! - [`shutdown`] - Grace-bounded serving helper.
//! - [`supervisor`] - Actor group with coordinated shutdown.
//! - [`telemetry`] - Logging and optional OpenTelemetry export.
//! - [`transport`] - gRPC listener and its call pipeline.

pub mod config;
pub mod error;
pub mod gateway;
pub mod health;
pub mod readiness;
pub mod service;
pub mod shutdown;
pub mod supervisor;
pub mod telemetry;
pub mod transport;
