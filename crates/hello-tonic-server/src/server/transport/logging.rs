//! Per-call logging for the gRPC server.
//!
//! [`CallLogLayer`] logs the start and finish of every call with the gRPC
//! service, method, status code and duration. The finish line is logged at a
//! level derived from the status code. Health `Check` calls are only logged
//! when they fail, so periodic health checks do not flood the logs.
//!
//! A call is finished when its response body ends, not when the response
//! headers are sent, so streaming calls such as health `Watch` report their
//! full duration and the status from their trailers.

use core::pin::Pin;
use core::task::{Context, Poll, ready};
use futures::future::BoxFuture;
use hello_tonic_core::types::HEALTH_CHECK_METHOD;
use http::{HeaderMap, Request, Response};
use http_body::{Body, Frame, SizeHint};
use std::time::Instant;
use tonic::Code;
use tower::{Layer, Service};

/// What to log for a given method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogDecision {
    /// Log when the call starts and when it finishes.
    StartAndFinish,
    /// Log only the finish, and only if the call failed.
    ErrorsOnly,
}

/// Decides how a call to `full_method` (e.g. `/hello.v1.HelloService/Hello`)
/// is logged.
pub fn decide(full_method: &str) -> LogDecision {
    if full_method == HEALTH_CHECK_METHOD {
        LogDecision::ErrorsOnly
    } else {
        LogDecision::StartAndFinish
    }
}

/// Severity of the finish line for a given status code.
pub fn level_for(code: Code) -> tracing::Level {
    match code {
        Code::Ok
        | Code::Cancelled
        | Code::InvalidArgument
        | Code::NotFound
        | Code::AlreadyExists
        | Code::Unauthenticated => tracing::Level::INFO,
        Code::DeadlineExceeded
        | Code::PermissionDenied
        | Code::ResourceExhausted
        | Code::FailedPrecondition
        | Code::Aborted
        | Code::OutOfRange
        | Code::Unavailable => tracing::Level::WARN,
        Code::Unknown | Code::Unimplemented | Code::Internal | Code::DataLoss => {
            tracing::Level::ERROR
        }
    }
}

/// Splits `/package.Service/Method` into its service and method parts.
pub fn split_method(full_method: &str) -> (&str, &str) {
    let trimmed = full_method.trim_start_matches('/');
    trimmed.rsplit_once('/').unwrap_or(("unknown", trimmed))
}

/// Status code carried in a header or trailer map. A missing `grpc-status`
/// reads as `Ok`.
fn status_code(headers: &HeaderMap) -> Code {
    headers
        .get("grpc-status")
        .map(|value| Code::from_bytes(value.as_bytes()))
        .unwrap_or(Code::Ok)
}

/// A call that has started but not yet been logged as finished.
struct PendingCall {
    full_method: String,
    decision: LogDecision,
    started: Instant,
}

impl PendingCall {
    fn finish(self, code: Code) {
        if self.decision == LogDecision::ErrorsOnly && code == Code::Ok {
            return;
        }

        let (service, method) = split_method(&self.full_method);
        let time_ms = self.started.elapsed().as_secs_f64() * 1000.0;
        match level_for(code) {
            tracing::Level::ERROR => tracing::error!(
                grpc.service = service,
                grpc.method = method,
                grpc.code = ?code,
                grpc.time_ms = time_ms,
                "finished call"
            ),
            tracing::Level::WARN => tracing::warn!(
                grpc.service = service,
                grpc.method = method,
                grpc.code = ?code,
                grpc.time_ms = time_ms,
                "finished call"
            ),
            _ => tracing::info!(
                grpc.service = service,
                grpc.method = method,
                grpc.code = ?code,
                grpc.time_ms = time_ms,
                "finished call"
            ),
        }
    }
}

/// Response body that logs the finish of its call exactly once.
///
/// The status comes from the trailers when they arrive. A body that ends
/// without trailers (a "trailers-only" reply, where the status sits in the
/// response headers) uses the header status. A body dropped before its end
/// was cut off by the client or by shutdown, and is logged as `Cancelled`.
pub struct LoggedBody<B: Body> {
    inner: Pin<Box<B>>,
    header_code: Code,
    call: Option<PendingCall>,
}

impl<B: Body> LoggedBody<B> {
    fn new(inner: B, header_code: Code, call: PendingCall) -> Self {
        Self {
            inner: Box::pin(inner),
            header_code,
            call: Some(call),
        }
    }

    fn finish(&mut self, code: Code) {
        if let Some(call) = self.call.take() {
            call.finish(code);
        }
    }
}

impl<B: Body> Body for LoggedBody<B> {
    type Data = B::Data;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let frame = ready!(this.inner.as_mut().poll_frame(cx));
        match &frame {
            Some(Ok(frame)) => {
                if let Some(trailers) = frame.trailers_ref() {
                    this.finish(status_code(trailers));
                }
            }
            Some(Err(_)) => this.finish(Code::Unknown),
            None => this.finish(this.header_code),
        }
        Poll::Ready(frame)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl<B: Body> Drop for LoggedBody<B> {
    fn drop(&mut self) {
        let code = if self.inner.is_end_stream() {
            self.header_code
        } else {
            Code::Cancelled
        };
        self.finish(code);
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CallLogLayer;

impl CallLogLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CallLogLayer {
    type Service = CallLog<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CallLog { inner }
    }
}

#[derive(Debug, Clone)]
pub struct CallLog<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CallLog<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
    S::Future: Send + 'static,
    S::Error: 'static,
    ResBody: Body + 'static,
{
    type Response = Response<LoggedBody<ResBody>>;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
        let full_method = req.uri().path().to_owned();
        let decision = decide(&full_method);

        if decision == LogDecision::StartAndFinish {
            let (service, method) = split_method(&full_method);
            tracing::info!(grpc.service = service, grpc.method = method, "started call");
        }

        let call = PendingCall {
            full_method,
            decision,
            started: Instant::now(),
        };
        let fut = self.inner.call(req);
        Box::pin(async move {
            match fut.await {
                Ok(response) => {
                    let header_code = status_code(response.headers());
                    Ok(response.map(|body| LoggedBody::new(body, header_code, call)))
                }
                Err(err) => {
                    call.finish(Code::Unknown);
                    Err(err)
                }
            }
        })
    }
}
