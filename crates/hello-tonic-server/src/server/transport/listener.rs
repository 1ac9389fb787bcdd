use crate::server::{
    config::DEFAULT_SHUTDOWN_GRACE,
    error::{Result, ServerError},
    health::{mark_not_serving, serving_health_service},
    readiness::ReadySignal,
    shutdown::{ForceClose, serve_with_grace},
    supervisor::{Actor, Cause},
    transport::{logging::CallLogLayer, recovery::RecoveryLayer},
};
use core::time::Duration;
use hello_tonic_core::proto::{
    FILE_DESCRIPTOR_SET,
    hello_service_server::{HelloService, HelloServiceServer},
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::TcpListener;
use tokio_stream::{StreamExt, wrappers::TcpListenerStream};
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, server::NamedService, transport::Server};
use tonic_reflection::server::Builder;
use tower::ServiceBuilder;

/// The gRPC listener, run as an [`Actor`].
///
/// Serves the Hello service, `grpc.health.v1.Health` and server reflection on
/// one port. Every call goes through the call pipeline: [`CallLogLayer`]
/// first, then [`RecoveryLayer`], then the service.
///
/// The socket is bound when the actor starts running. Binding failures end
/// `run()` with [`ServerError::Bind`]; success fires the readiness signal
/// with the bound address.
///
/// Interrupting the listener marks it `NOT_SERVING`, refuses new calls and
/// waits for in-flight calls for at most the grace budget (5 seconds by
/// default) before force-closing the remaining connections.
pub struct TransportListener<H: HelloService> {
    addr: SocketAddr,
    grace: Duration,
    service: HelloServiceServer<H>,
    shutdown: CancellationToken,
    ready: ReadySignal,
    started: AtomicBool,
}

impl<H: HelloService> TransportListener<H> {
    pub fn new(addr: SocketAddr, handler: H, ready: ReadySignal) -> Self {
        Self {
            addr,
            grace: DEFAULT_SHUTDOWN_GRACE,
            service: build_hello_service(handler),
            shutdown: CancellationToken::new(),
            ready,
            started: AtomicBool::new(false),
        }
    }

    /// Overrides the graceful stop budget.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    async fn serve(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted("gRPC listener"));
        }

        let listener = TcpListener::bind(self.addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| ServerError::Bind {
                addr: self.addr,
                source,
            })?;

        let services = [<HelloServiceServer<H> as NamedService>::NAME];
        let (health_reporter, health_service) = serving_health_service(&services).await;

        let reflection = Builder::configure()
            .register_encoded_file_descriptor_set(FILE_DESCRIPTOR_SET)
            .register_encoded_file_descriptor_set(tonic_health::pb::FILE_DESCRIPTOR_SET)
            .build_v1()?;

        tracing::info!("gRPC server listening on {local_addr}");
        self.ready.fire(local_addr);

        let shutdown = self.shutdown.clone();
        let signal = async move {
            shutdown.cancelled().await;
            // Publish the status first so health checks fail before connections drain.
            mark_not_serving(&health_reporter, &services).await;
            tracing::info!("gRPC server refusing new calls, draining in-flight calls");
        };

        let force = ForceClose::new();
        let incoming = TcpListenerStream::new(listener).map({
            let force = force.clone();
            move |conn| conn.map(|io| force.wrap(io))
        });

        let serve = Server::builder()
            .layer(
                ServiceBuilder::new()
                    .layer(CallLogLayer::new())
                    .layer(RecoveryLayer::new()),
            )
            .add_service(health_service)
            .add_service(reflection)
            .add_service(self.service.clone())
            .serve_with_incoming_shutdown(incoming, signal);

        let drain = serve_with_grace(serve, &self.shutdown, &force, self.grace, "grpc").await?;
        tracing::info!(?drain, "gRPC server stopped");
        Ok(())
    }
}

fn build_hello_service<H: HelloService>(handler: H) -> HelloServiceServer<H> {
    HelloServiceServer::new(handler)
        .send_compressed(CompressionEncoding::Zstd)
        .send_compressed(CompressionEncoding::Gzip)
        .accept_compressed(CompressionEncoding::Zstd)
        .accept_compressed(CompressionEncoding::Gzip)
}

#[tonic::async_trait]
impl<H: HelloService> Actor for TransportListener<H> {
    fn name(&self) -> &str {
        "grpc"
    }

    async fn run(&self) -> anyhow::Result<()> {
        Ok(self.serve().await?)
    }

    fn interrupt(&self, cause: &Cause<'_>) {
        if !self.shutdown.is_cancelled() {
            tracing::debug!(%cause, "Stopping gRPC server");
        }
        self.shutdown.cancel();
    }
}
