//! Volume server binary
//!
//! `minidfs-volume <port>` stores its blocks in `<data-root>/data_<port>`.
//! Failures map to distinct exit codes (see `minidfs::common::error::exit_code`).

use clap::error::ErrorKind;
use clap::Parser;
use minidfs::common::error::exit_code;
use minidfs::common::{Config, Error, VolumeConfig};
use minidfs::VolumeServer;
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "minidfs-volume")]
#[command(about = "minidfs volume server - fixed-capacity block storage node")]
#[command(version)]
struct Args {
    /// Port to listen on; also names the data directory
    port: Option<String>,

    /// Interface to listen on
    #[arg(long)]
    host: Option<IpAddr>,

    /// Number of block slots
    #[arg(long)]
    capacity: Option<u32>,

    /// Directory holding data_<port>
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(exit_code::INVALID_ARGS as u8),
            };
        }
    };

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(e.exit_code() as u8);
        }
    };

    let level = args
        .log_level
        .clone()
        .or(config.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    match run(args, config.volume.unwrap_or_default()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

async fn run(args: Args, mut config: VolumeConfig) -> minidfs::Result<()> {
    config.port = parse_port(args.port.as_deref())?;
    if let Some(host) = args.host {
        config.host = host;
    }
    if let Some(capacity) = args.capacity {
        config.capacity = capacity;
    }
    if let Some(data_root) = args.data_root {
        config.data_root = data_root;
    }

    tracing::info!("Storing all blocks in: {}", config.data_dir().display());
    let server = VolumeServer::bind(&config).await?;

    server
        .serve_until(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Ctrl-C received");
            }
        })
        .await
}

fn parse_port(raw: Option<&str>) -> minidfs::Result<u16> {
    let raw = raw.ok_or(Error::MissingPort)?;
    raw.trim()
        .parse()
        .map_err(|_| Error::InvalidPort(raw.to_string()))
}
