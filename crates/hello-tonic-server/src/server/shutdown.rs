//! Grace-bounded serving.
//!
//! Both listeners stop the same way: once their cancellation token fires they
//! refuse new connections and drain in-flight calls, but only for a bounded
//! time. [`serve_with_grace`] enforces that bound around any serve future.
//!
//! tonic and axum run every connection on its own spawned task, so dropping
//! the serve future alone leaves accepted connections open. Each accepted
//! socket is therefore wrapped in a [`ForcedIo`] tied to a [`ForceClose`]
//! switch; when the budget runs out the switch fails every pending read and
//! write, and the connection tasks tear the sockets down.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll};
use core::time::Duration;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};
use tonic::transport::server::Connected;

/// How a grace-bounded serve future finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drain {
    /// The server returned on its own (graceful drain completed, or it failed).
    Completed,
    /// The grace budget ran out; remaining connections were force-closed and
    /// the server future was dropped.
    Forced,
}

/// Switch that aborts every connection wrapped through it.
#[derive(Debug, Clone, Default)]
pub struct ForceClose {
    token: CancellationToken,
}

impl ForceClose {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ties `io` to this switch.
    pub fn wrap<IO>(&self, io: IO) -> ForcedIo<IO> {
        ForcedIo {
            io,
            forced: Box::pin(self.token.clone().cancelled_owned()),
        }
    }

    /// Fails all current and future I/O on wrapped connections.
    pub fn trigger(&self) {
        self.token.cancel();
    }

    pub fn is_triggered(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// A connection that errors with `ConnectionAborted` once its
/// [`ForceClose`] switch is triggered.
///
/// Pending reads and writes are woken by the switch, so even an idle
/// connection notices right away.
pub struct ForcedIo<IO> {
    io: IO,
    forced: Pin<Box<WaitForCancellationFutureOwned>>,
}

impl<IO> ForcedIo<IO> {
    fn poll_forced(&mut self, cx: &mut Context<'_>) -> Poll<io::Error> {
        match self.forced.as_mut().poll(cx) {
            Poll::Ready(()) => Poll::Ready(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "connection closed after the graceful stop budget",
            )),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<IO: AsyncRead + Unpin> AsyncRead for ForcedIo<IO> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Poll::Ready(err) = this.poll_forced(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.io).poll_read(cx, buf)
    }
}

impl<IO: AsyncWrite + Unpin> AsyncWrite for ForcedIo<IO> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Poll::Ready(err) = this.poll_forced(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.io).poll_write(cx, buf)
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        if let Poll::Ready(err) = this.poll_forced(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.io).poll_write_vectored(cx, bufs)
    }

    fn is_write_vectored(&self) -> bool {
        self.io.is_write_vectored()
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Poll::Ready(err) = this.poll_forced(cx) {
            return Poll::Ready(Err(err));
        }
        Pin::new(&mut this.io).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().io).poll_shutdown(cx)
    }
}

impl<IO: Connected> Connected for ForcedIo<IO> {
    type ConnectInfo = IO::ConnectInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.io.connect_info()
    }
}

/// Drives `serve` until it completes, or until `grace` has elapsed after
/// `shutdown` was cancelled.
///
/// `serve` is expected to begin its own graceful shutdown when `shutdown` is
/// cancelled (tonic and axum both take a shutdown future for this). If it has
/// not finished `grace` later, `force` is triggered to close the connections
/// accepted through it and `serve` is dropped.
pub async fn serve_with_grace<F, E>(
    serve: F,
    shutdown: &CancellationToken,
    force: &ForceClose,
    grace: Duration,
    name: &'static str,
) -> Result<Drain, E>
where
    F: Future<Output = Result<(), E>>,
{
    tokio::pin!(serve);

    let deadline = async {
        shutdown.cancelled().await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        res = &mut serve => res.map(|()| Drain::Completed),
        () = deadline => {
            tracing::warn!(
                server = name,
                grace_ms = grace.as_millis() as u64,
                "Graceful stop exceeded its budget, closing remaining connections"
            );
            force.trigger();
            Ok(Drain::Forced)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn completed_server_is_reported() {
        let token = CancellationToken::new();
        let force = ForceClose::new();
        let serve = async { Ok::<_, Infallible>(()) };
        let drain = serve_with_grace(serve, &token, &force, Duration::from_secs(5), "test")
            .await
            .unwrap();
        assert_eq!(drain, Drain::Completed);
        assert!(!force.is_triggered());
    }

    #[tokio::test]
    async fn stuck_server_is_forced_after_grace() {
        let token = CancellationToken::new();
        let force = ForceClose::new();
        let serve = std::future::pending::<Result<(), Infallible>>();
        token.cancel();

        let started = tokio::time::Instant::now();
        let drain = serve_with_grace(serve, &token, &force, Duration::from_millis(100), "test")
            .await
            .unwrap();
        assert_eq!(drain, Drain::Forced);
        assert!(started.elapsed() >= Duration::from_millis(100));
        assert!(force.is_triggered());
    }

    #[tokio::test]
    async fn grace_only_starts_after_cancellation() {
        let token = CancellationToken::new();
        let force = ForceClose::new();
        let serve = std::future::pending::<Result<(), Infallible>>();
        let res = tokio::time::timeout(
            Duration::from_millis(200),
            serve_with_grace(serve, &token, &force, Duration::from_millis(10), "test"),
        )
        .await;
        assert!(res.is_err(), "grace elapsed without a shutdown request");
        assert!(!force.is_triggered());
    }

    #[tokio::test]
    async fn server_errors_propagate() {
        let token = CancellationToken::new();
        let force = ForceClose::new();
        let serve = async { Err::<(), _>("boom") };
        let err = serve_with_grace(serve, &token, &force, Duration::from_secs(1), "test")
            .await
            .unwrap_err();
        assert_eq!(err, "boom");
    }

    #[tokio::test]
    async fn wrapped_io_passes_data_until_forced() {
        let force = ForceClose::new();
        let (near, mut far) = tokio::io::duplex(64);
        let mut near = force.wrap(near);

        far.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        near.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        near.write_all(b"pong").await.unwrap();
        far.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[tokio::test]
    async fn forcing_wakes_a_pending_read() {
        let force = ForceClose::new();
        let (near, _far) = tokio::io::duplex(64);
        let mut near = force.wrap(near);

        let reader = tokio::spawn(async move {
            let mut buf = [0u8; 1];
            near.read(&mut buf).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!reader.is_finished());

        force.trigger();
        let err = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("pending read ignored the force switch")
            .unwrap()
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }

    #[tokio::test]
    async fn connections_accepted_after_forcing_fail_immediately() {
        let force = ForceClose::new();
        force.trigger();
        let (near, _far) = tokio::io::duplex(64);
        let mut near = force.wrap(near);
        let err = near.write_all(b"late").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionAborted);
    }
}
