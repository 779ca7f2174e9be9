//! Per-block shared/exclusive lock
//!
//! Readers take the shared side, writers the exclusive side, and both wait for their turn. Guards release on
//! drop, so early returns and `?` paths never leak a held lock.

use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub type SharedGuard<'a> = RwLockReadGuard<'a, ()>;
pub type ExclusiveGuard<'a> = RwLockWriteGuard<'a, ()>;

#[derive(Debug, Default)]
pub struct BlockLock {
    inner: RwLock<()>,
}

impl BlockLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for shared access (any number of concurrent holders)
    pub async fn shared(&self) -> SharedGuard<'_> {
        self.inner.read().await
    }

    /// Wait for exclusive access
    pub async fn exclusive(&self) -> ExclusiveGuard<'_> {
        self.inner.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn can_share(lock: &BlockLock) -> bool {
        lock.inner.try_read().is_ok()
    }

    fn can_exclude(lock: &BlockLock) -> bool {
        lock.inner.try_write().is_ok()
    }

    #[tokio::test]
    async fn test_shared_holders_coexist() {
        let lock = BlockLock::new();
        let _a = lock.shared().await;
        let _b = tokio::time::timeout(Duration::from_secs(1), lock.shared())
            .await
            .expect("second reader should not wait");
        assert!(!can_exclude(&lock));
    }

    #[tokio::test]
    async fn test_exclusive_excludes_everyone() {
        let lock = BlockLock::new();
        let guard = lock.exclusive().await;
        assert!(!can_share(&lock));
        assert!(!can_exclude(&lock));
        drop(guard);
        assert!(can_share(&lock));
    }

    #[tokio::test]
    async fn test_released_on_early_return() {
        fn disk_write() -> Result<(), &'static str> {
            Err("disk on fire")
        }

        async fn fails(lock: &BlockLock) -> Result<(), &'static str> {
            let _guard = lock.exclusive().await;
            disk_write()?;
            Ok(())
        }

        let lock = BlockLock::new();
        assert!(fails(&lock).await.is_err());
        assert!(can_exclude(&lock));
    }

    #[tokio::test]
    async fn test_writer_waits_for_reader() {
        let lock = Arc::new(BlockLock::new());
        let reader = lock.shared().await;

        let writer = {
            let lock = lock.clone();
            tokio::spawn(async move {
                let _guard = lock.exclusive().await;
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished());
        drop(reader);
        tokio::time::timeout(Duration::from_secs(1), writer)
            .await
            .unwrap()
            .unwrap();
    }
}
