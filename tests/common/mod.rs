//! Shared cluster harness for integration tests

#![allow(dead_code)]

use minidfs::common::{CoordinatorConfig, VolumeConfig, VolumeNode};
use minidfs::coordinator::{DirectoryService, ShutdownHandle};
use minidfs::volume::BlockStore;
use minidfs::{Coordinator, DfsClient, VolumeServer};
use std::net::SocketAddr;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinHandle;

pub struct Cluster {
    pub coordinator: SocketAddr,
    pub volumes: Vec<VolumeNode>,
    pub stores: Vec<Arc<BlockStore>>,
    pub directory: Arc<DirectoryService>,
    pub shutdown: ShutdownHandle,
    pub server: JoinHandle<minidfs::Result<()>>,
    _dirs: Vec<TempDir>,
}

impl Cluster {
    pub fn client(&self) -> DfsClient {
        DfsClient::new(self.coordinator)
    }
}

/// Start one volume per entry of `capacities` (ids D1, D2, ...) and a coordinator in front
pub async fn start_cluster(capacities: &[u32], chunk_size: usize) -> Cluster {
    let mut dirs = Vec::new();
    let mut volumes = Vec::new();
    let mut stores = Vec::new();

    for (i, capacity) in capacities.iter().enumerate() {
        let dir = TempDir::new().unwrap();
        let server = VolumeServer::bind(&VolumeConfig {
            capacity: *capacity,
            data_root: dir.path().to_path_buf(),
            ..Default::default()
        })
        .await
        .unwrap();

        volumes.push(VolumeNode::new(
            format!("D{}", i + 1),
            server.local_addr().unwrap(),
        ));
        stores.push(server.store());
        tokio::spawn(server.serve());
        dirs.push(dir);
    }

    start_coordinator(volumes, stores, dirs, chunk_size).await
}

/// Coordinator over an explicit volume list (some may be unreachable)
pub async fn start_coordinator(
    volumes: Vec<VolumeNode>,
    stores: Vec<Arc<BlockStore>>,
    dirs: Vec<TempDir>,
    chunk_size: usize,
) -> Cluster {
    let config = CoordinatorConfig {
        bind_addr: "127.0.0.1:0".parse().unwrap(),
        volumes: volumes.clone(),
        chunk_size,
        alloc_backoff_ms: 10,
        ..Default::default()
    };
    let coordinator = Coordinator::bind(&config).await.unwrap();

    let addr = coordinator.local_addr().unwrap();
    let directory = coordinator.directory();
    let shutdown = coordinator.shutdown_handle();
    let server = tokio::spawn(coordinator.serve());

    Cluster {
        coordinator: addr,
        volumes,
        stores,
        directory,
        shutdown,
        server,
        _dirs: dirs,
    }
}

/// An address nothing listens on
pub fn dead_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}
