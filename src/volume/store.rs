//! Fixed-capacity block store
//!
//! A volume owns `capacity` block slots. Free ids wait in a FIFO pool; an
//! allocated id moves to the in-use map together with its backing file and
//! lock. The pool and the map are guarded separately, and neither guard is
//! held across file I/O, so allocation never stalls reads or writes of other
//! blocks.

use crate::common::{Error, Result};
use crate::volume::block::Block;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;

/// Pool usage snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub capacity: u32,
    pub free: usize,
    pub used: usize,
}

pub struct BlockStore {
    data_dir: PathBuf,
    capacity: u32,
    free_pool: Mutex<VecDeque<u32>>,
    in_use: Mutex<HashMap<u32, Arc<Block>>>,
}

impl BlockStore {
    /// Open a store rooted at `data_dir`, creating the directory if needed.
    /// Every id starts out free; files left over from an earlier run are
    /// truncated when their id is allocated again.
    pub fn open(data_dir: impl Into<PathBuf>, capacity: u32) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir).map_err(|source| Error::DataDir {
            path: data_dir.clone(),
            source,
        })?;

        tracing::info!(
            "BlockStore opened: {} blocks in {}",
            capacity,
            data_dir.display()
        );

        Ok(Self {
            data_dir,
            capacity,
            free_pool: Mutex::new((0..capacity).collect()),
            in_use: Mutex::new(HashMap::with_capacity(capacity as usize)),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Take one free block. `None` when the pool is exhausted.
    pub async fn allocate(&self) -> Result<Option<u32>> {
        let Some(block_id) = self.free_pool.lock().unwrap().pop_front() else {
            return Ok(None);
        };

        let block = Arc::new(Block::new(&self.data_dir, block_id));
        let guard = block.lock().exclusive().await;
        self.in_use.lock().unwrap().insert(block_id, block.clone());

        // Truncates whatever a previous lifetime of this id left behind
        if let Err(e) = fs::File::create(block.path()).await {
            tracing::error!(
                "Unable to create {} for block {}: {}",
                block.path().display(),
                block_id,
                e
            );
            self.in_use.lock().unwrap().remove(&block_id);
            self.free_pool.lock().unwrap().push_front(block_id);
            return Err(e.into());
        }
        drop(guard);

        tracing::debug!("Allocated block {} ({})", block_id, block.path().display());
        Ok(Some(block_id))
    }

    /// Full content of an allocated block
    pub async fn read(&self, block_id: u32) -> Result<Bytes> {
        let block = self.lookup(block_id)?;
        let _guard = block.lock().shared().await;

        match fs::read(block.path()).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Error::BlockNotFound(block_id)),
            Err(e) => {
                tracing::error!("Unable to read {}: {}", block.path().display(), e);
                Err(e.into())
            }
        }
    }

    /// Replace the block's content with `data`
    pub async fn write(&self, block_id: u32, data: &[u8]) -> Result<()> {
        let block = self.lookup(block_id)?;
        let _guard = block.lock().exclusive().await;

        fs::write(block.path(), data).await.map_err(|e| {
            tracing::error!(
                "Unable to write block {} ({}): {}",
                block_id,
                block.path().display(),
                e
            );
            Error::from(e)
        })
    }

    /// Return a block to the free pool, discarding its content.
    /// Waits for in-flight reads and writes on the block to finish.
    pub async fn release(&self, block_id: u32) -> Result<()> {
        let block = self
            .in_use
            .lock()
            .unwrap()
            .remove(&block_id)
            .ok_or(Error::BlockNotFound(block_id))?;

        let _guard = block.lock().exclusive().await;
        match fs::remove_file(block.path()).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Unable to remove {}: {}", block.path().display(), e),
        }

        self.free_pool.lock().unwrap().push_back(block_id);
        tracing::debug!("Released block {}", block_id);
        Ok(())
    }

    pub fn is_full(&self) -> bool {
        self.free_pool.lock().unwrap().is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.free_pool.lock().unwrap().len()
    }

    pub fn used_count(&self) -> usize {
        self.in_use.lock().unwrap().len()
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            capacity: self.capacity,
            free: self.free_count(),
            used: self.used_count(),
        }
    }

    fn lookup(&self, block_id: u32) -> Result<Arc<Block>> {
        if block_id >= self.capacity {
            return Err(Error::BlockNotFound(block_id));
        }
        self.in_use
            .lock()
            .unwrap()
            .get(&block_id)
            .cloned()
            .ok_or(Error::BlockNotFound(block_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_allocate_until_full() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path(), 3).unwrap();

        let mut ids = HashSet::new();
        for _ in 0..3 {
            let id = store.allocate().await.unwrap().unwrap();
            assert!(ids.insert(id));
            assert_eq!(store.free_count() + store.used_count(), 3);
        }

        assert!(store.is_full());
        for _ in 0..5 {
            assert_eq!(store.allocate().await.unwrap(), None);
        }
        assert_eq!(
            store.stats(),
            StoreStats {
                capacity: 3,
                free: 0,
                used: 3
            }
        );
    }

    #[tokio::test]
    async fn test_write_replaces_content() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path(), 10).unwrap();
        let id = store.allocate().await.unwrap().unwrap();

        assert_eq!(store.read(id).await.unwrap(), Bytes::new());

        store.write(id, b"first write, long").await.unwrap();
        store.write(id, b"second").await.unwrap();
        assert_eq!(store.read(id).await.unwrap(), Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn test_unknown_blocks_are_not_found() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path(), 4).unwrap();

        assert!(matches!(store.read(0).await, Err(Error::BlockNotFound(0))));
        assert!(matches!(store.read(99).await, Err(Error::BlockNotFound(99))));
        assert!(matches!(
            store.write(2, b"x").await,
            Err(Error::BlockNotFound(2))
        ));
    }

    #[tokio::test]
    async fn test_missing_backing_file() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path(), 4).unwrap();
        let id = store.allocate().await.unwrap().unwrap();

        std::fs::remove_file(dir.path().join(format!("blk_{}.bin", id))).unwrap();
        assert!(matches!(store.read(id).await, Err(Error::BlockNotFound(_))));
    }

    #[tokio::test]
    async fn test_allocate_truncates_stale_file() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("blk_0.bin"), b"left over").unwrap();

        let store = BlockStore::open(dir.path(), 2).unwrap();
        assert_eq!(store.allocate().await.unwrap(), Some(0));
        assert!(store.read(0).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_returns_block_to_pool() {
        let dir = tempdir().unwrap();
        let store = BlockStore::open(dir.path(), 1).unwrap();

        let id = store.allocate().await.unwrap().unwrap();
        store.write(id, b"payload").await.unwrap();
        assert!(store.is_full());

        store.release(id).await.unwrap();
        assert_eq!(store.free_count(), 1);
        assert!(matches!(store.read(id).await, Err(Error::BlockNotFound(_))));
        assert!(matches!(
            store.release(id).await,
            Err(Error::BlockNotFound(_))
        ));

        assert_eq!(store.allocate().await.unwrap(), Some(id));
        assert!(store.read(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_fails_when_dir_cannot_be_created() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("not-a-dir");
        std::fs::write(&file, b"").unwrap();

        let err = BlockStore::open(file.join("data_1"), 4).err().unwrap();
        assert!(matches!(err, Error::DataDir { .. }));
        assert_eq!(err.exit_code(), crate::common::error::exit_code::DATA_DIR);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_allocations_are_unique() {
        let dir = tempdir().unwrap();
        let store = Arc::new(BlockStore::open(dir.path(), 40).unwrap());

        let mut handles = Vec::new();
        for _ in 0..50 {
            let store = store.clone();
            handles.push(tokio::spawn(async move { store.allocate().await.unwrap() }));
        }

        let mut granted = HashSet::new();
        let mut refused = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Some(id) => assert!(granted.insert(id), "block {} handed out twice", id),
                None => refused += 1,
            }
        }

        assert_eq!(granted.len(), 40);
        assert_eq!(refused, 10);
        assert_eq!(store.free_count() + store.used_count(), 40);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_never_interleave() {
        let dir = tempdir().unwrap();
        let store = Arc::new(BlockStore::open(dir.path(), 1).unwrap());
        let id = store.allocate().await.unwrap().unwrap();

        let mut handles = Vec::new();
        for letter in b'a'..=b'h' {
            let writer = store.clone();
            handles.push(tokio::spawn(async move {
                let payload = vec![letter; 256 * 1024];
                writer.write(id, &payload).await.unwrap();
            }));
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let seen = store.read(id).await.unwrap();
                if let Some(first) = seen.first() {
                    assert!(seen.iter().all(|b| b == first), "torn read");
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let content = store.read(id).await.unwrap();
        assert_eq!(content.len(), 256 * 1024);
        assert!(content.iter().all(|b| *b == content[0]));
    }
}
