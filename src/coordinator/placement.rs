//! Chunking and round-robin volume selection
//!
//! Appends are cut into segments of at most `chunk_size` bytes, one block per
//! segment. Content no longer than half a chunk always stays in one block.
//! Volumes are tried in configuration order by a selector that callers
//! advance whenever a volume refuses an allocation.

use crate::common::{Error, Result, VolumeNode};
use bytes::Bytes;

/// PlacementManager owns the volume list and the chunking rule.
#[derive(Debug, Clone)]
pub struct PlacementManager {
    volumes: Vec<VolumeNode>,
    chunk_size: usize,
}

impl PlacementManager {
    pub fn new(volumes: Vec<VolumeNode>, chunk_size: usize) -> Result<Self> {
        if volumes.is_empty() {
            return Err(Error::NoVolumes);
        }
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be positive".into()));
        }
        Ok(Self {
            volumes,
            chunk_size,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn volumes(&self) -> &[VolumeNode] {
        &self.volumes
    }

    /// Number of blocks needed for `len` bytes
    pub fn chunk_count(&self, len: usize) -> usize {
        chunk_count(len, self.chunk_size)
    }

    /// Cut `content` into block-sized segments (zero-copy slices)
    pub fn segments(&self, content: &Bytes) -> Vec<Bytes> {
        let len = content.len();
        (0..self.chunk_count(len))
            .map(|i| {
                let start = (i * self.chunk_size).min(len);
                let end = start.saturating_add(self.chunk_size).min(len);
                content.slice(start..end)
            })
            .collect()
    }

    /// Volume picked by round-robin for `selector`
    pub fn volume_for(&self, selector: usize) -> &VolumeNode {
        &self.volumes[selector % self.volumes.len()]
    }

    pub fn volume(&self, node_id: &str) -> Result<&VolumeNode> {
        self.volumes
            .iter()
            .find(|v| v.id == node_id)
            .ok_or_else(|| Error::UnknownVolume(node_id.to_string()))
    }
}

/// One block when `len * 2 <= chunk_size`, otherwise `ceil(len / chunk_size)`.
pub fn chunk_count(len: usize, chunk_size: usize) -> usize {
    if len.saturating_mul(2) <= chunk_size {
        1
    } else {
        len.div_ceil(chunk_size)
    }
}
