//! The `hello.v1.HelloService` implementation.
//!
//! [`Greeter`] answers every `Hello` call with the same greeting. It holds no
//! state, so one instance serves any number of concurrent calls.

use hello_tonic_core::{
    proto::{HelloResponse, hello_service_server::HelloService},
    types::GREETING,
};
use tonic::{Request, Response, Status};

#[derive(Debug, Clone, Copy, Default)]
pub struct Greeter;

impl Greeter {
    pub fn new() -> Self {
        Self
    }
}

#[tonic::async_trait]
impl HelloService for Greeter {
    async fn hello(&self, _request: Request<()>) -> Result<Response<HelloResponse>, Status> {
        tracing::info!("replying to the greeting");
        Ok(Response::new(HelloResponse {
            hello: GREETING.to_owned(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replies_with_the_greeting() {
        let response = Greeter::new().hello(Request::new(())).await.unwrap();
        assert_eq!(response.into_inner().hello, "Hello world!");
    }
}
