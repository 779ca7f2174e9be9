//! Common utilities and types shared across minidfs

pub mod config;
pub mod error;
pub mod protocol;

pub use config::{Config, CoordinatorConfig, VolumeConfig, VolumeNode, DEFAULT_CHUNK_SIZE};
pub use error::{Error, Result};
