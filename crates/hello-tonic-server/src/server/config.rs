use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default port of the gRPC listener, overridable through `PORT`.
pub const DEFAULT_PORT: u16 = 8080;

/// Port of the HTTP/JSON gateway. Fixed by design.
pub const GATEWAY_PORT: u16 = 8081;

/// Graceful stop budget for each listener.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Runtime configuration for the `hello-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a
/// `.env` file is loaded first), with defaults suitable for running in a
/// container behind a load balancer.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "hello-tonic-server",
    version,
    about = "A gRPC service with an HTTP/JSON gateway, health checks and reflection"
)]
pub struct CliArgs {
    /// Enable development mode.
    ///
    /// Switches logging from JSON lines to human-readable, colored output and
    /// lowers the default level to `debug`.
    #[arg(long, default_value_t = false)]
    pub dev: bool,

    /// Port the gRPC listener binds.
    ///
    /// The gateway dials the listener on the loopback interface using this
    /// same port.
    ///
    /// Environment variable: `PORT`
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Address both listeners bind on.
    ///
    /// Environment variable: `HOST`
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Seconds each listener waits for in-flight calls on shutdown before
    /// closing the remaining connections.
    ///
    /// Environment variable: `SHUTDOWN_GRACE_SECS`
    #[arg(long, env = "SHUTDOWN_GRACE_SECS", default_value_t = DEFAULT_SHUTDOWN_GRACE.as_secs())]
    pub shutdown_grace: u64,

    /// Do not exit immediately on a second Ctrl+C during shutdown.
    #[arg(long, default_value_t = false)]
    pub no_force_quit: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub dev: bool,
    pub grpc_addr: SocketAddr,
    pub gateway_addr: SocketAddr,
    pub shutdown_grace: Duration,
    pub force_quit: bool,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.shutdown_grace == 0 {
            bail!("SHUTDOWN_GRACE_SECS must be greater than 0");
        }

        if args.port != 0 && args.port == GATEWAY_PORT {
            bail!("PORT ({}) collides with the gateway port", args.port);
        }

        Ok(Self {
            dev: args.dev,
            grpc_addr: SocketAddr::new(args.host, args.port),
            gateway_addr: SocketAddr::new(args.host, GATEWAY_PORT),
            shutdown_grace: Duration::from_secs(args.shutdown_grace),
            force_quit: !args.no_force_quit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> anyhow::Result<ServerConfig> {
        let mut argv = vec!["hello-tonic-server"];
        argv.extend_from_slice(args);
        ServerConfig::try_from(CliArgs::try_parse_from(argv)?)
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let config = parse(&["--port", "9090", "--dev", "--shutdown-grace", "2"]).unwrap();
        assert!(config.dev);
        assert_eq!(config.grpc_addr.port(), 9090);
        assert_eq!(config.gateway_addr.port(), GATEWAY_PORT);
        assert_eq!(config.shutdown_grace, Duration::from_secs(2));
        assert!(config.force_quit);
    }

    #[test]
    fn rejects_zero_grace() {
        assert!(parse(&["--port", "9090", "--shutdown-grace", "0"]).is_err());
    }

    #[test]
    fn rejects_gateway_port_collision() {
        assert!(parse(&["--port", "8081"]).is_err());
    }

    #[test]
    fn listeners_share_the_host() {
        let config = parse(&["--port", "9090", "--host", "127.0.0.1", "--no-force-quit"]).unwrap();
        assert_eq!(config.grpc_addr, "127.0.0.1:9090".parse().unwrap());
        assert_eq!(config.gateway_addr, "127.0.0.1:8081".parse().unwrap());
        assert!(!config.force_quit);
    }
}
