use clap::Parser;
use hello_tonic_server::server::{
    config::{CliArgs, ServerConfig},
    gateway::GatewayBridge,
    readiness::readiness,
    service::Greeter,
    supervisor::{ActorGroup, SignalWatcher},
    telemetry::init_telemetry,
    transport::TransportListener,
};

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    let providers = init_telemetry(config.dev)?;
    log_startup_info(&config);

    let (grpc_ready, grpc_waiter) = readiness();

    let mut group = ActorGroup::new();
    group
        .add(SignalWatcher::new().with_force_quit(config.force_quit))
        .add(
            TransportListener::new(config.grpc_addr, Greeter::new(), grpc_ready)
                .with_grace(config.shutdown_grace),
        )
        .add(
            GatewayBridge::new(config.gateway_addr, grpc_waiter)
                .with_grace(config.shutdown_grace),
        );

    let res = group.run().await;
    match &res {
        Ok(()) => tracing::info!("Server exiting"),
        Err(err) => tracing::error!(error = %err, "Server exiting with error"),
    }

    providers.shutdown();
    Ok(res?)
}

fn log_startup_info(config: &ServerConfig) {
    if config.dev {
        tracing::info!("Starting server with full config: {:#?}", config);
    } else {
        tracing::info!(
            grpc_addr = %config.grpc_addr,
            gateway_addr = %config.gateway_addr,
            shutdown_grace_secs = config.shutdown_grace.as_secs(),
            "Starting server"
        );
    }
}
