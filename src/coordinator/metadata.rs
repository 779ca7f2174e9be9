//! Directory metadata: filename → ordered block placements
//!
//! The map lives in memory only. A single guard protects it, held just long
//! enough to splice new handles onto a list or to copy a list out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

/// One block on one volume
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockHandle {
    pub node_id: String,
    pub block_id: u32,
}

impl BlockHandle {
    pub fn new(node_id: impl Into<String>, block_id: u32) -> Self {
        Self {
            node_id: node_id.into(),
            block_id,
        }
    }
}

impl fmt::Display for BlockHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.node_id, self.block_id)
    }
}

#[derive(Debug, Default)]
pub struct PlacementMap {
    files: Mutex<HashMap<String, Vec<BlockHandle>>>,
}

impl PlacementMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `handles` to the file's list, creating it on first use.
    /// Returns the file's block count after the splice.
    pub fn extend(&self, filename: &str, handles: Vec<BlockHandle>) -> usize {
        let mut files = self.files.lock().unwrap();
        let list = files.entry(filename.to_string()).or_default();
        list.extend(handles);
        list.len()
    }

    /// Copy of the file's placement list; empty for unknown files
    pub fn blocks(&self, filename: &str) -> Vec<BlockHandle> {
        self.files
            .lock()
            .unwrap()
            .get(filename)
            .cloned()
            .unwrap_or_default()
    }

    pub fn file_count(&self) -> usize {
        self.files.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_extend_preserves_order() {
        let map = PlacementMap::new();
        assert!(map.blocks("a.txt").is_empty());
        assert_eq!(map.file_count(), 0);

        assert_eq!(map.extend("a.txt", vec![BlockHandle::new("D1", 0)]), 1);
        assert_eq!(
            map.extend(
                "a.txt",
                vec![BlockHandle::new("D2", 4), BlockHandle::new("D1", 1)]
            ),
            3
        );

        let blocks = map.blocks("a.txt");
        let rendered: Vec<String> = blocks.iter().map(|b| b.to_string()).collect();
        assert_eq!(rendered, vec!["D1/0", "D2/4", "D1/1"]);
        assert_eq!(map.file_count(), 1);
    }

    #[test]
    fn test_concurrent_splices_are_not_lost() {
        let map = Arc::new(PlacementMap::new());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let map = map.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        map.extend("shared.log", vec![BlockHandle::new(format!("D{}", t), i)]);
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }

        assert_eq!(map.blocks("shared.log").len(), 800);
    }
}
