//! Client for the coordinator's line protocol

use crate::common::protocol::{exchange, is_error_response, ClientRequest};
use crate::common::{Error, Result};
use bytes::Bytes;
use std::net::SocketAddr;

#[derive(Debug, Clone, Copy)]
pub struct DfsClient {
    coordinator: SocketAddr,
}

impl DfsClient {
    pub fn new(coordinator: SocketAddr) -> Self {
        Self { coordinator }
    }

    /// File content, empty if the coordinator does not know the file.
    /// The body is returned as is, even if it happens to start with `ERROR: `.
    pub async fn read(&self, filename: &str) -> Result<Bytes> {
        let request = ClientRequest::Read {
            filename: filename.to_string(),
        };
        exchange(self.coordinator, &request.encode()).await
    }

    pub async fn append(&self, filename: &str, content: impl Into<Bytes>) -> Result<()> {
        self.send(ClientRequest::Append {
            filename: filename.to_string(),
            content: content.into(),
        })
        .await
        .map(|_| ())
    }

    /// Ask the coordinator to stop; returns its acknowledgement
    pub async fn shutdown(&self) -> Result<String> {
        let body = self.send(ClientRequest::Shutdown).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn send(&self, request: ClientRequest) -> Result<Bytes> {
        let body = exchange(self.coordinator, &request.encode()).await?;
        if is_error_response(&body) {
            return Err(Error::UnexpectedResponse {
                peer: self.coordinator.to_string(),
                response: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        Ok(body)
    }
}
