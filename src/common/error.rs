//! Error types for minidfs

use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Exit codes reported by `minidfs-volume` when startup or shutdown fails.
pub mod exit_code {
    pub const INVALID_ARGS: i32 = 1;
    pub const BIND: i32 = 2;
    pub const LISTENER: i32 = 3;
    pub const MISSING_PORT: i32 = 4;
    pub const DATA_DIR: i32 = 5;
}

#[derive(Error, Debug)]
pub enum Error {
    // === I/O Errors ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // === Block Store Errors ===
    #[error("Block not found: {0}")]
    BlockNotFound(u32),

    // === Protocol Errors ===
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Unexpected response from {peer}: {response}")]
    UnexpectedResponse { peer: String, response: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Placement Errors ===
    #[error("No volumes configured")]
    NoVolumes,

    #[error("Unknown volume: {0}")]
    UnknownVolume(String),

    #[error("No free blocks after {attempts} allocation attempts")]
    NoFreeBlocks { attempts: usize },

    #[error("Write of block {block_id} on {node} failed: {reason}")]
    WriteFailed {
        node: String,
        block_id: u32,
        reason: String,
    },

    // === Network Errors ===
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    // === Process Errors ===
    #[error("Please specify the port number as the first argument")]
    MissingPort,

    #[error("Expected the port argument to be an integer, got {0:?}")]
    InvalidPort(String),

    #[error("Unable to create data directory {path:?}: {source}")]
    DataDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unable to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("Listener failed: {0}")]
    Listener(std::io::Error),
}

impl Error {
    /// Can the allocation loop move on to the next volume after this error?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed(_) | Error::UnexpectedResponse { .. }
        )
    }

    /// Process exit code for startup and shutdown failures.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::MissingPort => exit_code::MISSING_PORT,
            Error::InvalidPort(_) | Error::InvalidConfig(_) | Error::Config(_) => {
                exit_code::INVALID_ARGS
            }
            Error::DataDir { .. } => exit_code::DATA_DIR,
            Error::Bind { .. } => exit_code::BIND,
            _ => exit_code::LISTENER,
        }
    }
}
