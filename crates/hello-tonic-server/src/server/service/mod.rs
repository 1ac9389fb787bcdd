//! RPC handlers.

pub mod handler;

pub use handler::Greeter;
