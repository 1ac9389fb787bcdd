use core::{fmt, hint::black_box};
use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use futures::stream::{FuturesUnordered, StreamExt};
use hello_tonic_core::proto::hello_service_client::HelloServiceClient;
use hello_tonic_server::server::{
    gateway::GatewayBridge,
    readiness::readiness,
    service::Greeter,
    supervisor::{Actor, ActorGroup, Cause},
    transport::TransportListener,
};
use std::net::SocketAddr;
use std::time::Instant;
use tokio::runtime::Builder;
use tokio_util::sync::CancellationToken;
use tonic::{codec::CompressionEncoding, transport::Channel};

#[derive(Clone, Copy, Debug)]
enum Compression {
    None,
    Gzip,
    Zstd,
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

impl From<Compression> for Option<CompressionEncoding> {
    fn from(value: Compression) -> Self {
        match value {
            Compression::None => None,
            Compression::Gzip => Some(CompressionEncoding::Gzip),
            Compression::Zstd => Some(CompressionEncoding::Zstd),
        }
    }
}

struct Stop(CancellationToken);

#[tonic::async_trait]
impl Actor for Stop {
    fn name(&self) -> &str {
        "bench"
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.0.cancelled().await;
        Ok(())
    }

    fn interrupt(&self, _cause: &Cause<'_>) {
        self.0.cancel();
    }
}

fn hello_bench(c: &mut Criterion) {
    let rt = Builder::new_multi_thread().enable_all().build().unwrap();
    let stop = CancellationToken::new();

    let (grpc, gateway, server) = rt.block_on(async {
        let any_port: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let (grpc_ready, mut grpc_waiter) = readiness();
        let (gateway_ready, mut gateway_waiter) = readiness();

        let mut group = ActorGroup::new();
        group
            .add(Stop(stop.clone()))
            .add(TransportListener::new(any_port, Greeter::new(), grpc_ready))
            .add(GatewayBridge::new(any_port, grpc_waiter.clone()).with_ready(gateway_ready));
        let server = tokio::spawn(group.run());

        let grpc = grpc_waiter.wait().await.expect("gRPC listener did not start");
        let gateway = gateway_waiter.wait().await.expect("gateway did not start");
        (grpc, gateway, server)
    });

    let channel = rt.block_on(async {
        Channel::from_shared(format!("http://{grpc}"))
            .unwrap()
            .connect()
            .await
            .expect("Failed to connect to server")
    });

    let concurrency_cases = [1, 8, 64];
    let compression_cases = [Compression::None, Compression::Gzip, Compression::Zstd];

    let mut group = c.benchmark_group("grpc/hello");
    for &concurrency in &concurrency_cases {
        for &compression in &compression_cases {
            group.throughput(Throughput::Elements(concurrency as u64));
            group.bench_function(format!("conc/{concurrency}/comp/{compression}"), |b| {
                b.to_async(&rt).iter_custom(|iters| {
                    let channel = channel.clone();
                    async move {
                        let start = Instant::now();
                        for _ in 0..iters {
                            run_grpc_hello(&channel, concurrency, compression).await;
                        }
                        start.elapsed()
                    }
                });
            });
        }
    }
    group.finish();

    let http = reqwest::Client::new();
    let url = format!("http://{gateway}/v1/hello");
    let mut group = c.benchmark_group("http/hello");
    for &concurrency in &concurrency_cases {
        group.throughput(Throughput::Elements(concurrency as u64));
        group.bench_function(format!("conc/{concurrency}"), |b| {
            b.to_async(&rt).iter_custom(|iters| {
                let http = http.clone();
                let url = url.clone();
                async move {
                    let start = Instant::now();
                    for _ in 0..iters {
                        run_http_hello(&http, &url, concurrency).await;
                    }
                    start.elapsed()
                }
            });
        });
    }
    group.finish();

    stop.cancel();
    if let Err(err) = rt.block_on(server).expect("server task panicked") {
        eprintln!("server stopped with error: {err}");
    }
}

async fn run_grpc_hello(channel: &Channel, concurrency: usize, compression: Compression) {
    let mut tasks = FuturesUnordered::new();

    for _ in 0..concurrency {
        let mut client = HelloServiceClient::new(channel.clone());
        if let Some(encoding) = compression.into() {
            client = client.accept_compressed(encoding).send_compressed(encoding);
        }

        tasks.push(tokio::spawn(async move {
            let response = client.hello(()).await.expect("hello call failed");
            black_box(response.into_inner());
        }));
    }

    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

async fn run_http_hello(http: &reqwest::Client, url: &str, concurrency: usize) {
    let mut tasks = FuturesUnordered::new();

    for _ in 0..concurrency {
        let request = http.get(url).send();
        tasks.push(tokio::spawn(async move {
            let body = request
                .await
                .expect("gateway call failed")
                .bytes()
                .await
                .expect("gateway body failed");
            black_box(body);
        }));
    }

    while let Some(res) = tasks.next().await {
        res.unwrap();
    }
}

criterion_group!(hello_benches, hello_bench);
criterion_main!(hello_benches);
