//! # Shared Names and Constants
//!
//! Values that both ends of the wire must agree on: the fully qualified
//! service name used by health checks and reflection, the constant greeting,
//! and the REST path the gateway mirrors the RPC on.

/// Fully qualified protobuf name of the Hello service.
///
/// This is the key registered with the health reporter and the value clients
/// pass to `grpc.health.v1.Health/Check`.
pub const HELLO_SERVICE_NAME: &str = "hello.v1.HelloService";

/// Greeting returned by every `Hello` call.
pub const GREETING: &str = "Hello world!";

/// HTTP path the gateway maps onto `HelloService.Hello`.
pub const HELLO_HTTP_PATH: &str = "/v1/hello";

/// Full gRPC method path of the standard health check.
pub const HEALTH_CHECK_METHOD: &str = "/grpc.health.v1.Health/Check";
