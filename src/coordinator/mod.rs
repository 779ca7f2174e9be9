//! Coordinator (directory service) implementation
//!
//! The coordinator is responsible for:
//! - Metadata management (filename → ordered block placements)
//! - Chunking appends into block-sized segments
//! - Placement decisions (round-robin with retry on full volumes)
//! - Gathering blocks for reads
//! - Session handling and graceful shutdown

pub mod directory;
pub mod metadata;
pub mod placement;
pub mod server;
pub mod volume_client;

pub use directory::DirectoryService;
pub use metadata::BlockHandle;
pub use server::{Coordinator, ShutdownHandle};
pub use volume_client::{TcpVolumeClient, VolumeClient};
