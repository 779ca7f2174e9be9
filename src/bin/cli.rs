//! CLI for file and cluster operations

use clap::{Parser, Subcommand};
use minidfs::coordinator::TcpVolumeClient;
use minidfs::DfsClient;
use std::io::Write;
use std::net::SocketAddr;

#[derive(Parser)]
#[command(name = "minidfs")]
#[command(about = "minidfs distributed block store CLI")]
#[command(version)]
struct Cli {
    /// Coordinator address
    #[arg(long, default_value = "127.0.0.1:5558")]
    coordinator: SocketAddr,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a file's content
    Read {
        /// File name
        file: String,
    },

    /// Append content to a file
    Append {
        /// File name
        file: String,

        /// Content (words are joined with single spaces)
        #[arg(required = true, num_args = 1..)]
        content: Vec<String>,
    },

    /// Stop the coordinator
    Shutdown,

    /// Show block usage of a volume
    Stat {
        /// Volume address
        volume: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let client = DfsClient::new(cli.coordinator);

    match cli.command {
        Commands::Read { file } => {
            let content = client.read(&file).await?;
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&content)?;
            writeln!(stdout)?;
        }

        Commands::Append { file, content } => {
            let content = content.join(" ");
            client.append(&file, content.clone()).await?;
            println!("Appended {} bytes to {}", content.len(), file);
        }

        Commands::Shutdown => {
            println!("{}", client.shutdown().await?);
        }

        Commands::Stat { volume } => {
            let stats = TcpVolumeClient::new().stat(volume).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}
