//! Block slot: one allocated block and its backing file

use crate::volume::lock::BlockLock;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct Block {
    pub block_id: u32,
    path: PathBuf,
    lock: BlockLock,
}

impl Block {
    pub fn new(data_dir: &Path, block_id: u32) -> Self {
        Self {
            block_id,
            path: block_path(data_dir, block_id),
            lock: BlockLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lock(&self) -> &BlockLock {
        &self.lock
    }
}

/// `<data_dir>/blk_<id>.bin`
pub fn block_path(data_dir: &Path, block_id: u32) -> PathBuf {
    data_dir.join(format!("blk_{}.bin", block_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_path_is_deterministic() {
        let block = Block::new(Path::new("data_65530"), 12);
        assert_eq!(block.path(), Path::new("data_65530/blk_12.bin"));
        assert_eq!(block.path(), block_path(Path::new("data_65530"), 12));
    }
}
