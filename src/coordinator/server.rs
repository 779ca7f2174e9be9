//! Coordinator server
//!
//! Accepts client sessions, one task each, until a `shutdown` command (or the
//! owner of a [`ShutdownHandle`]) stops it. Stopping drops the listener so new
//! connections are refused, then aborts every session still running.

use crate::common::protocol::{
    error_response, is_transient, read_request_line, write_response, ClientRequest,
    INVALID_COMMAND, SHUTDOWN_ACK,
};
use crate::common::{CoordinatorConfig, Error, Result};
use crate::coordinator::directory::DirectoryService;
use crate::coordinator::volume_client::{TcpVolumeClient, VolumeClient};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinSet;

/// Stops a running coordinator. Cheap to clone.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
    stop: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self {
            running: Arc::new(AtomicBool::new(true)),
            stop: Arc::new(stop),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            tracing::info!("Coordinator shutdown requested");
        }
        self.stop.send_replace(true);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.stop.subscribe()
    }
}

pub struct Coordinator {
    listener: TcpListener,
    directory: Arc<DirectoryService>,
    shutdown: ShutdownHandle,
}

impl Coordinator {
    /// Bind with the TCP volume client
    pub async fn bind(config: &CoordinatorConfig) -> Result<Self> {
        Self::bind_with_client(config, Arc::new(TcpVolumeClient::new())).await
    }

    pub async fn bind_with_client(
        config: &CoordinatorConfig,
        client: Arc<dyn VolumeClient>,
    ) -> Result<Self> {
        let directory = Arc::new(DirectoryService::new(config, client)?);

        let addr = config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| Error::Bind { addr, source })?;

        Ok(Self {
            listener,
            directory,
            shutdown: ShutdownHandle::new(),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn directory(&self) -> Arc<DirectoryService> {
        self.directory.clone()
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Accept sessions until shut down. Returns once the listener is closed
    /// and every session has ended.
    pub async fn serve(self) -> Result<()> {
        let Coordinator {
            listener,
            directory,
            shutdown,
        } = self;

        let addr = listener.local_addr()?;
        tracing::info!("Coordinator started on {}", addr);
        for node in directory.placement().volumes() {
            tracing::info!("  Volume {}: {}", node.id, node.addr);
        }
        tracing::info!("  Chunk size: {} bytes", directory.placement().chunk_size());

        let mut stop = shutdown.subscribe();
        let mut sessions = JoinSet::new();
        let mut result = Ok(());

        loop {
            let stopped = *stop.borrow_and_update();
            if stopped {
                break;
            }

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
                    tracing::debug!("New client connection accepted: {}", peer);

                    let directory = directory.clone();
                    let shutdown = shutdown.clone();
                    sessions.spawn(async move {
                        if let Err(e) = handle_session(&directory, &shutdown, stream).await {
                            tracing::warn!("Session with {} failed: {}", peer, e);
                        }
                        tracing::debug!("Closed client connection: {}", peer);
                    });
                }
                changed = stop.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }

            while sessions.try_join_next().is_some() {}
        }

        drop(listener);
        tracing::info!("Listener on {} closed, aborting {} session(s)", addr, sessions.len());
        sessions.abort_all();
        while sessions.join_next().await.is_some() {}

        shutdown.shutdown();
        tracing::info!("Coordinator has been shut down");
        result
    }
}

/// Read one command from a client, answer it, close.
pub async fn handle_session<S>(
    directory: &DirectoryService,
    shutdown: &ShutdownHandle,
    stream: S,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (reader, mut writer) = tokio::io::split(stream);
    let mut reader = BufReader::new(reader);

    let Some(line) = read_request_line(&mut reader).await? else {
        return Ok(());
    };
    if !shutdown.is_running() {
        return Ok(());
    }

    match ClientRequest::parse(&line) {
        Err(e) => {
            tracing::warn!("Failed to parse client request: {}", e);
            write_response(&mut writer, INVALID_COMMAND.as_bytes()).await
        }
        Ok(ClientRequest::EndSession) => Ok(()),
        Ok(ClientRequest::Shutdown) => {
            write_response(&mut writer, SHUTDOWN_ACK.as_bytes()).await?;
            shutdown.shutdown();
            Ok(())
        }
        Ok(ClientRequest::Read { filename }) => {
            let content = directory.read(&filename).await;
            tracing::debug!("READ {} -> {} bytes", filename, content.len());
            write_response(&mut writer, &content).await
        }
        Ok(ClientRequest::Append { filename, content }) => {
            match directory.append(&filename, content).await {
                Ok(_) => write_response(&mut writer, b"").await,
                Err(e) => {
                    tracing::warn!("APPEND {} failed: {}", filename, e);
                    write_response(&mut writer, &error_response(&e)).await
                }
            }
        }
    }
}
