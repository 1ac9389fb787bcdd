use super::routes::router;
use crate::server::{
    config::DEFAULT_SHUTDOWN_GRACE,
    error::{Result, ServerError},
    readiness::{ReadySignal, ReadyWaiter},
    shutdown::{ForceClose, ForcedIo, serve_with_grace},
    supervisor::{Actor, Cause},
};
use core::future::IntoFuture;
use core::time::Duration;
use hello_tonic_core::proto::hello_service_client::HelloServiceClient;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;

const DIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// The HTTP/JSON gateway, run as an [`Actor`].
///
/// Startup is ordered after the gRPC listener: `run()` first waits on the
/// listener's readiness signal, then dials the address it advertised. A
/// failed dial is fatal. Only after the dial succeeds is the gateway port
/// bound, and the optional readiness signal given through
/// [`with_ready`](Self::with_ready) fired.
pub struct GatewayBridge {
    addr: SocketAddr,
    grace: Duration,
    upstream: ReadyWaiter,
    shutdown: CancellationToken,
    ready: Option<ReadySignal>,
    started: AtomicBool,
}

impl GatewayBridge {
    pub fn new(addr: SocketAddr, upstream: ReadyWaiter) -> Self {
        Self {
            addr,
            grace: DEFAULT_SHUTDOWN_GRACE,
            upstream,
            shutdown: CancellationToken::new(),
            ready: None,
            started: AtomicBool::new(false),
        }
    }

    /// Fires `ready` with the bound gateway address once it accepts requests.
    pub fn with_ready(mut self, ready: ReadySignal) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Overrides the graceful stop budget.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    async fn serve(&self) -> Result<()> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(ServerError::AlreadyStarted("HTTP gateway"));
        }

        let mut upstream = self.upstream.clone();
        let grpc_addr = tokio::select! {
            res = upstream.wait() => res?,
            () = self.shutdown.cancelled() => {
                tracing::debug!("HTTP gateway interrupted before the gRPC listener was ready");
                return Ok(());
            }
        };

        let target = dial_target(grpc_addr);
        let endpoint = format!("http://{target}");
        let channel = Endpoint::from_shared(endpoint.clone())
            .map_err(|source| ServerError::InvalidEndpoint {
                endpoint: endpoint.clone(),
                source,
            })?
            .connect_timeout(DIAL_TIMEOUT)
            .connect()
            .await
            .map_err(|source| ServerError::Dial { endpoint, source })?;
        let client = HelloServiceClient::new(channel);

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

        tracing::info!("HTTP gateway listening on {local_addr}, forwarding to {target}");
        if let Some(ready) = &self.ready {
            ready.fire(local_addr);
        }

        let force = ForceClose::new();
        let listener = GatewayListener {
            inner: listener,
            force: force.clone(),
        };
        let serve = axum::serve(listener, router(client))
            .with_graceful_shutdown(self.shutdown.clone().cancelled_owned())
            .into_future();

        let drain = serve_with_grace(serve, &self.shutdown, &force, self.grace, "gateway")
            .await
            .map_err(ServerError::Gateway)?;
        tracing::info!(?drain, "HTTP gateway stopped");
        Ok(())
    }
}

/// Gateway socket whose accepted connections can be force-closed.
struct GatewayListener {
    inner: TcpListener,
    force: ForceClose,
}

impl axum::serve::Listener for GatewayListener {
    type Io = ForcedIo<TcpStream>;
    type Addr = SocketAddr;

    async fn accept(&mut self) -> (Self::Io, Self::Addr) {
        let (io, addr) = axum::serve::Listener::accept(&mut self.inner).await;
        (self.force.wrap(io), addr)
    }

    fn local_addr(&self) -> io::Result<Self::Addr> {
        self.inner.local_addr()
    }
}

/// Address the gateway dials for a listener bound at `addr`.
///
/// A wildcard bind (`0.0.0.0` or `::`) is reached over the loopback address
/// of the same family.
pub fn dial_target(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(ip) if ip.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

#[tonic::async_trait]
impl Actor for GatewayBridge {
    fn name(&self) -> &str {
        "gateway"
    }

    async fn run(&self) -> anyhow::Result<()> {
        Ok(self.serve().await?)
    }

    fn interrupt(&self, cause: &Cause<'_>) {
        if !self.shutdown.is_cancelled() {
            tracing::debug!(%cause, "Stopping HTTP gateway");
        }
        self.shutdown.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::readiness::readiness;

    #[test]
    fn wildcard_binds_are_dialed_over_loopback() {
        let v4: SocketAddr = "0.0.0.0:8080".parse().unwrap();
        assert_eq!(dial_target(v4), "127.0.0.1:8080".parse().unwrap());

        let v6: SocketAddr = "[::]:8080".parse().unwrap();
        assert_eq!(dial_target(v6), "[::1]:8080".parse().unwrap());

        let concrete: SocketAddr = "10.1.2.3:9000".parse().unwrap();
        assert_eq!(dial_target(concrete), concrete);
    }

    #[tokio::test]
    async fn interrupt_before_upstream_is_ready_returns_cleanly() {
        let (_upstream_signal, upstream) = readiness();
        let (ready, mut gateway_ready) = readiness();
        let bridge =
            GatewayBridge::new("127.0.0.1:0".parse().unwrap(), upstream).with_ready(ready);

        bridge.interrupt(&Cause {
            actor: "test",
            error: None,
        });
        bridge.run().await.unwrap();
        assert!(gateway_ready.get().is_none());
        drop(bridge);
        assert!(gateway_ready.wait().await.is_err());
    }

    #[tokio::test]
    async fn dropped_upstream_fails_the_gateway() {
        let (upstream_signal, upstream) = readiness();
        let bridge = GatewayBridge::new("127.0.0.1:0".parse().unwrap(), upstream);
        drop(upstream_signal);

        let err = bridge.run().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServerError>(),
            Some(ServerError::NotReady)
        ));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_dial_error() {
        // Reserve a port, then free it so nothing listens there.
        let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = reserved.local_addr().unwrap();
        drop(reserved);

        let (upstream_signal, upstream) = readiness();
        let bridge = GatewayBridge::new("127.0.0.1:0".parse().unwrap(), upstream);
        upstream_signal.fire(dead);

        let err = bridge.run().await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ServerError>(),
            Some(ServerError::Dial { .. })
        ));
    }
}
