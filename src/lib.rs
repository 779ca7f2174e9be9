//! # minidfs
//!
//! A minimal distributed block store with:
//! - One coordinator tracking filename → (volume, block) placements
//! - Fixed-capacity volumes holding block files on local disk
//! - Chunked appends with round-robin placement and retry on full volumes
//! - Per-block shared/exclusive locking
//! - A one-line-per-connection text protocol everywhere
//!
//! ## Architecture
//!
//! ```text
//!            ┌──────────────┐
//!  client ──▶│ Coordinator  │  READ <file> | APPEND <file> <content> | shutdown
//!            │ (directory)  │
//!            └──────┬───────┘
//!                   │ ALLOC | READ <id> | WRITE <id> <bytes>
//!   ┌───────────────┼───────────────┐
//! ┌─▼──────────┐ ┌──▼─────────┐ ┌───▼────────┐
//! │ Volume D1  │ │ Volume D2  │ │ Volume D3  │
//! │ 100 blocks │ │ 100 blocks │ │ 100 blocks │
//! └────────────┘ └────────────┘ └────────────┘
//! ```
//!
//! Metadata lives only in coordinator memory and nothing is replicated: a
//! restarted coordinator forgets every file, a lost volume loses its blocks.
//!
//! ## Usage
//!
//! ### Start the volumes
//! ```bash
//! minidfs-volume 65530 &
//! minidfs-volume 65531 &
//! minidfs-volume 65532 &
//! ```
//!
//! ### Start the coordinator
//! ```bash
//! minidfs-coord serve --bind 127.0.0.1:5558 \
//!   --volume D1=127.0.0.1:65530 \
//!   --volume D2=127.0.0.1:65531 \
//!   --volume D3=127.0.0.1:65532
//! ```
//!
//! ### Use the CLI
//! ```bash
//! minidfs append a.txt hello
//! minidfs read a.txt
//! minidfs stat 127.0.0.1:65530
//! minidfs shutdown
//! ```

pub mod client;
pub mod common;
pub mod coordinator;
pub mod volume;

// Re-export commonly used types
pub use client::DfsClient;
pub use common::{Config, Error, Result};
pub use coordinator::Coordinator;
pub use volume::VolumeServer;

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
