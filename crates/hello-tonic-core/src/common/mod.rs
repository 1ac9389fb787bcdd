//! Wire contract shared by the server, the gateway and any Rust client.
//!
//! - [`proto`] - Generated `hello.v1` messages, client and server.
//! - [`types`] - Names and constants both sides of the wire agree on.
//! - [`error`] - RPC-level error type and its mapping onto [`tonic::Status`].

pub mod error;
pub mod types;

pub use error::{Error, Result};

/// gRPC service and message definitions generated from
/// `proto/hello/v1/hello.proto`.
///
/// ## Service
///
/// - `HelloService.Hello(google.protobuf.Empty) -> HelloResponse`
///
/// `google.protobuf.Empty` is mapped to `()` by prost, so the generated client
/// is called as `client.hello(())`.
///
/// [`HelloResponse`](proto::HelloResponse) also implements `serde` traits so
/// the HTTP gateway can relay it verbatim as JSON.
pub mod proto {
    tonic::include_proto!("hello.v1");

    /// Encoded file descriptor set for the `hello.v1` package, registered with
    /// the reflection service.
    pub const FILE_DESCRIPTOR_SET: &[u8] = tonic::include_file_descriptor_set!("hello_descriptor");
}
