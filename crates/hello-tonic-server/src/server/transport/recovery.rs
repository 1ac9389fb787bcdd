//! Panic recovery for the gRPC server.
//!
//! [`RecoveryLayer`] contains a panic raised while a handler builds or polls
//! its response and answers the call with `INTERNAL` instead. The connection
//! and every other in-flight call keep going.

use crate::server::supervisor::panic_message;
use core::task::{Context, Poll};
use futures::FutureExt;
use futures::future::BoxFuture;
use hello_tonic_core::Error;
use http::{Request, Response};
use std::any::Any;
use std::panic::AssertUnwindSafe;
use tonic::Status;
use tower::{Layer, Service};

#[derive(Debug, Clone, Copy, Default)]
pub struct RecoveryLayer;

impl RecoveryLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RecoveryLayer {
    type Service = Recovery<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Recovery { inner }
    }
}

#[derive(Debug, Clone)]
pub struct Recovery<S> {
    inner: S,
}

fn recovered<B: Default>(full_method: &str, payload: Box<dyn Any + Send>) -> Response<B> {
    let message = panic_message(payload.as_ref());
    tracing::error!(grpc.method = full_method, panic = %message, "Recovered from panic in handler");
    Status::from(Error::HandlerPanicked { message }).into_http()
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for Recovery<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: Default + Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let full_method = req.uri().path().to_owned();

        let fut = match std::panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req))) {
            Ok(fut) => fut,
            Err(payload) => {
                let response = recovered(&full_method, payload);
                return Box::pin(async move { Ok(response) });
            }
        };

        Box::pin(async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(res) => res,
                Err(payload) => Ok(recovered(&full_method, payload)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::convert::Infallible;
    use tonic::Code;

    #[derive(Clone)]
    struct Panicking;

    impl Service<Request<()>> for Panicking {
        type Response = Response<String>;
        type Error = Infallible;
        type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, req: Request<()>) -> Self::Future {
            if req.uri().path() == "/sync" {
                panic!("panicked while building the future");
            }
            Box::pin(async { panic!("panicked while polling") })
        }
    }

    fn status_of(response: &Response<String>) -> Code {
        Status::from_header_map(response.headers())
            .map(|status| status.code())
            .unwrap_or(Code::Ok)
    }

    #[tokio::test]
    async fn panic_while_polling_becomes_internal() {
        let mut svc = RecoveryLayer::new().layer(Panicking);
        let req = Request::builder().uri("/async").body(()).unwrap();
        let response = svc.call(req).await.unwrap();
        assert_eq!(status_of(&response), Code::Internal);
    }

    #[tokio::test]
    async fn panic_while_calling_becomes_internal() {
        let mut svc = RecoveryLayer::new().layer(Panicking);
        let req = Request::builder().uri("/sync").body(()).unwrap();
        let response = svc.call(req).await.unwrap();
        assert_eq!(status_of(&response), Code::Internal);
    }
}
