//! Coordinator binary

use anyhow::Context;
use clap::{Parser, Subcommand};
use minidfs::common::{Config, VolumeNode};
use minidfs::Coordinator;
use std::net::SocketAddr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "minidfs-coord")]
#[command(about = "minidfs coordinator (directory service)")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start coordinator server
    Serve {
        /// Bind address for client sessions
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Volume as ID=HOST:PORT (repeatable, round-robin order)
        #[arg(long = "volume", value_parser = parse_volume)]
        volumes: Vec<VolumeNode>,

        /// Maximum segment size in bytes
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Fail an append after this many refused allocations (default: retry forever)
        #[arg(long)]
        alloc_retry_limit: Option<usize>,

        /// Log level (trace, debug, info, warn, error)
        #[arg(long)]
        log_level: Option<String>,
    },
}

fn parse_volume(raw: &str) -> Result<VolumeNode, String> {
    let (id, addr) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected ID=HOST:PORT, got {:?}", raw))?;
    let addr = addr
        .parse()
        .map_err(|e| format!("bad address {:?}: {}", addr, e))?;
    Ok(VolumeNode::new(id, addr))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            volumes,
            chunk_size,
            alloc_retry_limit,
            log_level,
        } => {
            // Load config from file, then override with CLI arguments
            let config = Config::load().context("loading configuration")?;
            let level = log_level
                .or(config.log_level)
                .unwrap_or_else(|| "info".to_string());
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| level.into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let mut coord_config = config.coordinator.unwrap_or_default();
            if let Some(bind) = bind {
                coord_config.bind_addr = bind;
            }
            if !volumes.is_empty() {
                coord_config.volumes = volumes;
            }
            if let Some(chunk_size) = chunk_size {
                coord_config.chunk_size = chunk_size;
            }
            if alloc_retry_limit.is_some() {
                coord_config.alloc_retry_limit = alloc_retry_limit;
            }
            coord_config
                .validate()
                .context("invalid coordinator configuration")?;

            let coord = Coordinator::bind(&coord_config).await?;
            let shutdown = coord.shutdown_handle();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("Ctrl-C received");
                    shutdown.shutdown();
                }
            });
            coord.serve().await?;
        }
    }

    Ok(())
}
