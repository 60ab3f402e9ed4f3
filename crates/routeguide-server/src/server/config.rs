use anyhow::bail;
use clap::Parser;
use core::time::Duration;
use std::path::PathBuf;

/// Runtime configuration for the `routeguide-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is honored), with defaults suitable for running the demo locally.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "routeguide-server",
    version,
    about = "A gRPC RouteGuide service: features, route summaries and route chat"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:8980" or "/tmp/routeguide.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8980"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Path to the JSON feature database loaded at startup.
    ///
    /// Environment variable: `FEATURE_DB`
    #[arg(long, env = "FEATURE_DB", default_value = "data/route_guide_db.json")]
    pub feature_db: PathBuf,

    /// Capacity of the outbound buffer for streamed responses
    /// (`ListFeatures`, `RouteChat`).
    ///
    /// A full buffer suspends the producing session until the client reads.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 8)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight calls to finish on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub feature_db: PathBuf,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: String::from("0.0.0.0:8980"),
            uds: false,
            feature_db: PathBuf::from("data/route_guide_db.json"),
            stream_buffer_size: 8,
            shutdown_timeout: Duration::from_secs(3),
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.shutdown_timeout == 0 {
            bail!("SHUTDOWN_TIMEOUT must be greater than 0");
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            feature_db: args.feature_db,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout),
        })
    }
}
