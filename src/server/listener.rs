//! Device server listener
//!
//! Handles the TCP accept loop and spawns a task per connection. Frames from
//! the capture side enter through [`DeviceServer::publish_frame`] and
//! [`DeviceServer::publish_video`].

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

use crate::device::{Capture, Controller};
use crate::error::Result;
use crate::http::Router;
use crate::registry::{ClientRegistry, Frame, FrameSlot, RegistryConfig};
use crate::server::config::ServerConfig;
use crate::server::connection::Connection;

/// Screen streaming and remote control server
pub struct DeviceServer {
    config: ServerConfig,
    registry: Arc<ClientRegistry>,
    router: Arc<Router>,
    frames: Arc<FrameSlot>,
    capture: Arc<dyn Capture>,
    controller: Arc<dyn Controller>,
    next_connection_id: AtomicU64,
    connection_semaphore: Option<Arc<Semaphore>>,
}

impl DeviceServer {
    /// Create a new server with the given configuration and collaborators
    pub fn new(
        config: ServerConfig,
        capture: Arc<dyn Capture>,
        controller: Arc<dyn Controller>,
    ) -> Self {
        Self::with_registry_config(config, capture, controller, RegistryConfig::default())
    }

    /// Create a new server with custom registry configuration
    pub fn with_registry_config(
        config: ServerConfig,
        capture: Arc<dyn Capture>,
        controller: Arc<dyn Controller>,
        registry_config: RegistryConfig,
    ) -> Self {
        let connection_semaphore = if config.max_connections > 0 {
            Some(Arc::new(Semaphore::new(config.max_connections)))
        } else {
            None
        };

        let frames = Arc::new(FrameSlot::new());
        let registry = Arc::new(ClientRegistry::with_config(
            Arc::clone(&capture),
            registry_config,
        ));
        let router = Arc::new(Router::new(
            config.clone(),
            Arc::clone(&capture),
            Arc::clone(&controller),
            Arc::clone(&frames),
        ));

        Self {
            config,
            registry,
            router,
            frames,
            capture,
            controller,
            next_connection_id: AtomicU64::new(1),
            connection_semaphore,
        }
    }

    /// Get a reference to the client registry
    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Get a reference to the current-frame slot
    pub fn frames(&self) -> &Arc<FrameSlot> {
        &self.frames
    }

    /// Make `frame` the current frame and push it to snapshot subscribers
    ///
    /// Empty frames are ignored. Returns the number of subscribers served.
    pub async fn publish_frame(&self, frame: Frame) -> usize {
        if frame.is_empty() {
            return 0;
        }
        self.frames.store(frame.clone()).await;
        self.registry.push_to_snapshot_subscribers(&frame).await
    }

    /// Forward encoded video to stream subscribers
    pub async fn publish_video(&self, data: &[u8]) -> usize {
        self.registry.push_to_stream_subscribers(data).await
    }

    /// Send a binary payload to every WebSocket client
    pub async fn broadcast(&self, payload: &[u8]) -> usize {
        self.registry.broadcast_binary(payload).await
    }

    /// Drop the current frame after a capture failure
    pub async fn clear_frame(&self) {
        self.frames.clear().await;
    }

    /// Run the server
    ///
    /// This method blocks until the server is shut down.
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Device server listening");

        self.accept_loop(&listener).await
    }

    /// Run the server with graceful shutdown
    pub async fn run_until<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// On shutdown the listener is closed and every registered connection is
    /// closed, which releases their parked tasks.
    pub async fn serve<F>(&self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(addr = %addr, "Device server listening");
        }

        let result = tokio::select! {
            _ = shutdown => {
                tracing::info!("Shutdown signal received");
                Ok(())
            }
            result = self.accept_loop(&listener) => result,
        };

        drop(listener);
        self.registry.close_all().await;
        self.frames.clear().await;

        result
    }

    async fn accept_loop(&self, listener: &TcpListener) -> Result<()> {
        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    self.handle_connection(socket, peer_addr);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    fn handle_connection(&self, socket: TcpStream, peer_addr: SocketAddr) {
        // Check connection limit
        let permit = if let Some(ref sem) = self.connection_semaphore {
            match sem.clone().try_acquire_owned() {
                Ok(permit) => Some(permit),
                Err(_) => {
                    tracing::warn!(peer = %peer_addr, "Connection rejected: limit reached");
                    return;
                }
            }
        } else {
            None
        };

        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            connection_id = connection_id,
            peer = %peer_addr,
            "New connection"
        );

        if let Err(e) = self.configure_socket(&socket) {
            tracing::error!(error = %e, "Failed to configure socket");
            return;
        }

        let mut connection = Connection::new(
            connection_id,
            peer_addr,
            Arc::clone(&self.registry),
            Arc::clone(&self.router),
            Arc::clone(&self.capture),
            Arc::clone(&self.controller),
        );

        tokio::spawn(async move {
            // Held for the lifetime of the connection
            let _permit = permit;

            if let Err(e) = connection.run(socket).await {
                if e.is_disconnect() {
                    tracing::debug!(connection_id = connection_id, error = %e, "Peer disconnected");
                } else {
                    tracing::warn!(connection_id = connection_id, error = %e, "Connection error");
                }
            }

            tracing::debug!(connection_id = connection_id, "Connection closed");
        });
    }

    fn configure_socket(&self, socket: &TcpStream) -> std::io::Result<()> {
        if self.config.tcp_nodelay {
            socket.set_nodelay(true)?;
        }
        Ok(())
    }

    /// Get the bind address
    pub fn bind_addr(&self) -> SocketAddr {
        self.config.bind_addr
    }
}
