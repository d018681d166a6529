//! Transport acceptor: one bridge task per accepted connection

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use torbit_broadcaster::{Bridge, BridgeConfig, BroadcasterError, CoordinatorHandle};
use tracing::{debug, info, warn};

use crate::config::{DaemonConfig, Protocol};

/// Bound listening socket
pub enum ChatListener {
    Tcp(TcpListener),
    Unix(UnixListener, PathBuf),
}

impl ChatListener {
    /// Bind according to `[server]`. Failure here is fatal for the daemon.
    pub async fn bind(config: &DaemonConfig) -> Result<Self> {
        match config.server.protocol {
            Protocol::Tcp => {
                let address = config.listen_address();
                let listener = TcpListener::bind(&address)
                    .await
                    .with_context(|| format!("Failed to listen on {}", address))?;
                Ok(Self::Tcp(listener))
            }
            Protocol::Unix => {
                let path = config.server.socket_path.clone();

                // Remove stale socket from a previous run
                if path.exists() {
                    std::fs::remove_file(&path)
                        .with_context(|| format!("Failed to remove stale socket {}", path.display()))?;
                }
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        torbit_paths::ensure_dir(parent)?;
                    }
                }

                let listener = UnixListener::bind(&path)
                    .with_context(|| format!("Failed to bind Unix socket {}", path.display()))?;
                torbit_paths::secure_socket_permissions(&path)?;

                Ok(Self::Unix(listener, path))
            }
        }
    }

    /// Human-readable bound address
    pub fn local_addr(&self) -> Result<String> {
        match self {
            Self::Tcp(listener) => Ok(listener.local_addr()?.to_string()),
            Self::Unix(_, path) => Ok(path.display().to_string()),
        }
    }
}

impl Drop for ChatListener {
    fn drop(&mut self) {
        if let Self::Unix(_, path) = self {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// Accept loop wiring every connection to the shared coordinator
pub struct ChatServer {
    listener: ChatListener,
    coordinator: CoordinatorHandle,
    bridge_config: Arc<BridgeConfig>,
    shutdown: CancellationToken,
    connections: TaskTracker,
}

impl ChatServer {
    pub fn new(
        listener: ChatListener,
        coordinator: CoordinatorHandle,
        bridge_config: BridgeConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            listener,
            coordinator,
            bridge_config: Arc::new(bridge_config),
            shutdown,
            connections: TaskTracker::new(),
        }
    }

    /// Accept until shutdown, then wait for every bridge to finish.
    ///
    /// An accept error ends the loop and is returned.
    pub async fn run(&self) -> Result<()> {
        info!("Accepting connections on {}", self.listener.local_addr()?);

        let result = loop {
            let accepted = tokio::select! {
                _ = self.shutdown.cancelled() => break Ok(()),
                accepted = self.accept() => accepted,
            };
            if let Err(e) = accepted {
                break Err(e);
            }
        };

        self.connections.close();
        info!("Waiting for {} connections to close", self.connections.len());
        if let Err(e) = &result {
            warn!("Accept loop failed: {:#}", e);
            self.shutdown.cancel();
        }
        self.connections.wait().await;

        result
    }

    async fn accept(&self) -> Result<()> {
        match &self.listener {
            ChatListener::Tcp(listener) => {
                let (stream, addr) = listener
                    .accept()
                    .await
                    .context("Failed to accept connection")?;
                self.spawn_bridge(stream, addr.to_string());
            }
            ChatListener::Unix(listener, path) => {
                let (stream, _addr) = listener
                    .accept()
                    .await
                    .context("Failed to accept connection")?;
                self.spawn_bridge(stream, format!("unix:{}", path.display()));
            }
        }
        Ok(())
    }

    fn spawn_bridge<S>(&self, stream: S, peer: String)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        debug!("New connection from {}", peer);
        let mut bridge = Bridge::new(
            peer,
            self.coordinator.clone(),
            Arc::clone(&self.bridge_config),
            self.shutdown.clone(),
        );

        self.connections.spawn(async move {
            match bridge.run(stream).await {
                Ok(()) => {}
                Err(BroadcasterError::HandshakeAborted) => {
                    debug!("Connection closed during handshake");
                }
                Err(BroadcasterError::NameTaken(name)) => {
                    info!("Refused connection claiming {}", name);
                }
                Err(e) => {
                    debug!("Connection ended: {}", e);
                }
            }
        });
    }
}
