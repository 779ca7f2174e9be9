//! Client side of the coordinator → volume protocol

use crate::common::protocol::{
    exchange, is_error_response, parse_alloc_response, VolumeRequest, COMPLETE,
};
use crate::common::{Error, Result, VolumeNode};
use crate::volume::StoreStats;
use async_trait::async_trait;
use bytes::Bytes;
use std::net::SocketAddr;

/// Block operations the directory service needs from a volume.
#[async_trait]
pub trait VolumeClient: Send + Sync {
    /// `Some(block_id)`, or `None` when the volume is full
    async fn alloc(&self, node: &VolumeNode) -> Result<Option<u32>>;

    /// Block content; empty when the volume has no such block
    async fn read(&self, node: &VolumeNode, block_id: u32) -> Result<Bytes>;

    async fn write(&self, node: &VolumeNode, block_id: u32, data: Bytes) -> Result<()>;
}

/// Opens a fresh TCP connection for every operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpVolumeClient;

impl TcpVolumeClient {
    pub fn new() -> Self {
        Self
    }

    /// Pool usage of the volume at `addr`
    pub async fn stat(&self, addr: SocketAddr) -> Result<StoreStats> {
        let body = exchange(addr, &VolumeRequest::Stat.encode()).await?;
        if is_error_response(&body) {
            return Err(Error::UnexpectedResponse {
                peer: addr.to_string(),
                response: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl VolumeClient for TcpVolumeClient {
    async fn alloc(&self, node: &VolumeNode) -> Result<Option<u32>> {
        let body = exchange(node.addr, &VolumeRequest::Alloc.encode()).await?;
        parse_alloc_response(&node.id, &body)
    }

    async fn read(&self, node: &VolumeNode, block_id: u32) -> Result<Bytes> {
        exchange(node.addr, &VolumeRequest::Read { block_id }.encode()).await
    }

    async fn write(&self, node: &VolumeNode, block_id: u32, data: Bytes) -> Result<()> {
        let request = VolumeRequest::Write { block_id, data }.encode();
        let body = exchange(node.addr, &request).await?;
        if body == COMPLETE.as_bytes() {
            Ok(())
        } else {
            Err(Error::WriteFailed {
                node: node.id.clone(),
                block_id,
                reason: String::from_utf8_lossy(&body).into_owned(),
            })
        }
    }
}
