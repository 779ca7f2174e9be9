//! Volume server: one task per connection, one command per connection

use crate::common::protocol::{
    error_response, is_transient, read_request_line, write_response, VolumeRequest, ALLOC_FULL,
    COMPLETE, INVALID_COMMAND,
};
use crate::common::{Error, Result, VolumeConfig};
use crate::volume::store::BlockStore;
use bytes::Bytes;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::task::JoinSet;

pub struct VolumeServer {
    listener: TcpListener,
    store: Arc<BlockStore>,
}

impl VolumeServer {
    /// Open the block store under `config.data_dir()` and bind the listener.
    pub async fn bind(config: &VolumeConfig) -> Result<Self> {
        let store = Arc::new(BlockStore::open(config.data_dir(), config.capacity)?);

        let addr = config.bind_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        Ok(Self { listener, store })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn store(&self) -> Arc<BlockStore> {
        self.store.clone()
    }

    /// Serve until the listener fails
    pub async fn serve(self) -> Result<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves or the listener fails. Either way the
    /// listener is closed and sessions still running are aborted before this
    /// returns.
    pub async fn serve_until<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let VolumeServer { listener, store } = self;
        let addr = listener.local_addr()?;
        tracing::info!("Volume server running on {}", addr);
        tracing::info!("  Data path: {}", store.data_dir().display());
        tracing::info!("  Capacity: {} blocks", store.capacity());

        tokio::pin!(shutdown);
        let mut sessions = JoinSet::new();
        let mut result = Ok(());

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(conn) => conn,
                        Err(e) if is_transient(&e) => {
                            tracing::warn!("Accept failed on {}: {}", addr, e);
                            continue;
                        }
                        Err(e) => {
                            tracing::error!("Accept failed on {}: {}", addr, e);
                            result = Err(Error::Listener(e));
                            break;
                        }
                    };

                    let store = store.clone();
                    sessions.spawn(async move {
                        if let Err(e) = handle_connection(&store, stream).await {
                            tracing::warn!("Session with {} failed: {}", peer, e);
                        }
                    });
                }
                _ = &mut shutdown => break,
            }

            while sessions.try_join_next().is_some() {}
        }

        drop(listener);
        sessions.abort_all();
        while sessions.join_next().await.is_some() {}

        tracing::info!("Volume server on {} stopped", addr);
        result
    }
}

/// Read one command, answer it, close.
pub async fn handle_connection<S>(store: &BlockStore, stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let Some(line) = read_request_line(&mut reader).await? else {
        return Ok(());
    };
    let response = dispatch(store, &line).await;
    write_response(&mut writer, &response).await
}

async fn dispatch(store: &BlockStore, line: &[u8]) -> Bytes {
    let request = match VolumeRequest::parse(line) {
        Ok(request) => request,
        Err(e) => {
            tracing::warn!("{}", e);
            return Bytes::from_static(INVALID_COMMAND.as_bytes());
        }
    };

    match request {
        VolumeRequest::Alloc => match store.allocate().await {
            Ok(Some(block_id)) => Bytes::from(block_id.to_string()),
            Ok(None) => {
                tracing::debug!("ALLOC refused: all {} blocks in use", store.capacity());
                Bytes::from_static(ALLOC_FULL.as_bytes())
            }
            Err(e) => Bytes::from(error_response(&e)),
        },
        VolumeRequest::Read { block_id } => match store.read(block_id).await {
            Ok(data) => {
                tracing::debug!("READ {} -> {} bytes", block_id, data.len());
                data
            }
            Err(e) => {
                tracing::warn!("READ {} failed: {}", block_id, e);
                Bytes::new()
            }
        },
        VolumeRequest::Write { block_id, data } => match store.write(block_id, &data).await {
            Ok(()) => {
                tracing::debug!("WRITE {} <- {} bytes", block_id, data.len());
                Bytes::from_static(COMPLETE.as_bytes())
            }
            Err(e) => {
                tracing::warn!("WRITE {} failed: {}", block_id, e);
                Bytes::from(error_response(&e))
            }
        },
        VolumeRequest::Stat => match serde_json::to_vec(&store.stats()) {
            Ok(body) => Bytes::from(body),
            Err(e) => Bytes::from(error_response(&Error::from(e))),
        },
    }
}
