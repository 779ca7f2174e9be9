//! Directory service: append and read of logical files
//!
//! Append cuts content into segments, places each segment on the first
//! volume (round-robin) that grants a block, writes it there, and finally
//! records the new handles. Read fetches every block of a file concurrently
//! and joins the segments in placement order with a single space.

use crate::common::{CoordinatorConfig, Error, Result};
use crate::coordinator::metadata::{BlockHandle, PlacementMap};
use crate::coordinator::placement::PlacementManager;
use crate::coordinator::volume_client::VolumeClient;
use bytes::Bytes;
use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

pub struct DirectoryService {
    placement: PlacementManager,
    files: PlacementMap,
    client: Arc<dyn VolumeClient>,
    alloc_retry_limit: Option<usize>,
    alloc_backoff: Duration,
}

impl DirectoryService {
    pub fn new(config: &CoordinatorConfig, client: Arc<dyn VolumeClient>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            placement: PlacementManager::new(config.volumes.clone(), config.chunk_size)?,
            files: PlacementMap::new(),
            client,
            alloc_retry_limit: config.alloc_retry_limit,
            alloc_backoff: config.alloc_backoff(),
        })
    }

    pub fn placement(&self) -> &PlacementManager {
        &self.placement
    }

    /// Placement list of `filename` (empty if unknown)
    pub fn blocks(&self, filename: &str) -> Vec<BlockHandle> {
        self.files.blocks(filename)
    }

    pub fn file_count(&self) -> usize {
        self.files.file_count()
    }

    /// Store `content` as new blocks at the end of `filename`.
    ///
    /// Without `alloc_retry_limit` this keeps cycling through the volumes
    /// until one grants a block, so it never returns while every volume is
    /// full. Blocks already written stay orphaned if a later segment fails.
    pub async fn append(&self, filename: &str, content: Bytes) -> Result<Vec<BlockHandle>> {
        if content.contains(&b'\n') {
            return Err(Error::InvalidCommand(
                "content must not contain a line break".into(),
            ));
        }

        let segments = self.placement.segments(&content);
        tracing::debug!(
            "APPEND {}: {} bytes in {} segment(s)",
            filename,
            content.len(),
            segments.len()
        );

        let mut selector = 0;
        let mut placed = Vec::with_capacity(segments.len());
        for segment in segments {
            placed.push(self.place_segment(&mut selector, segment).await?);
        }

        let total = self.files.extend(filename, placed.clone());
        tracing::info!(
            "Appended {} block(s) to {} ({} total)",
            placed.len(),
            filename,
            total
        );
        Ok(placed)
    }

    async fn place_segment(&self, selector: &mut usize, segment: Bytes) -> Result<BlockHandle> {
        let volume_count = self.placement.volumes().len();
        let mut attempts = 0;

        loop {
            let node = self.placement.volume_for(*selector);
            match self.client.alloc(node).await {
                Ok(Some(block_id)) => {
                    self.client.write(node, block_id, segment).await?;
                    return Ok(BlockHandle::new(node.id.clone(), block_id));
                }
                Ok(None) => tracing::debug!("{} is full", node.id),
                Err(e) if e.is_retryable() => {
                    tracing::warn!("Allocation on {} failed: {}", node.id, e)
                }
                Err(e) => return Err(e),
            }

            *selector += 1;
            attempts += 1;
            if let Some(limit) = self.alloc_retry_limit {
                if attempts >= limit {
                    return Err(Error::NoFreeBlocks { attempts });
                }
            }
            if attempts % volume_count == 0 {
                tracing::warn!(
                    "No volume could take a block after {} attempts, retrying",
                    attempts
                );
                tokio::time::sleep(self.alloc_backoff).await;
            }
        }
    }

    /// Content of `filename`: every block in placement order, joined by one space.
    /// A block that cannot be fetched contributes an empty segment.
    pub async fn read(&self, filename: &str) -> Bytes {
        let handles = self.files.blocks(filename);
        if handles.is_empty() {
            return Bytes::new();
        }

        let segments = join_all(handles.iter().map(|h| self.fetch(h))).await;
        Bytes::from(segments.join(&b' '))
    }

    async fn fetch(&self, handle: &BlockHandle) -> Bytes {
        let node = match self.placement.volume(&handle.node_id) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", handle, e);
                return Bytes::new();
            }
        };
        match self.client.read(node, handle.block_id).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Cannot read {}: {}", handle, e);
                Bytes::new()
            }
        }
    }
}
