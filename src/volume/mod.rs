//! Volume (storage node) implementation
//!
//! A volume holds a fixed number of block slots, each backed by one file in
//! the volume's data directory:
//! - FIFO free pool of block ids
//! - In-use map of allocated blocks
//! - Shared/exclusive lock per block
//! - Line protocol server (ALLOC, READ, WRITE, STAT)

pub mod block;
pub mod lock;
pub mod server;
pub mod store;

pub use server::VolumeServer;
pub use store::{BlockStore, StoreStats};
