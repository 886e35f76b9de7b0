//! Per-connection handler
//!
//! Reads the first request, classifies it and then either runs the
//! WebSocket loop or serves the HTTP route. Registered connections hand
//! their write half to the registry and park until it removes them or the
//! peer hangs up; the registry entry is always removed on the way out.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpStream;

use crate::control;
use crate::device::{Capture, Controller, InjectOutcome};
use crate::error::Result;
use crate::http::response::{chunked_head, encode_chunk, keep_alive_head, IMAGE_JPEG, VIDEO_AVC};
use crate::http::{Outcome, Router};
use crate::protocol::{perform_handshake, read_frame, read_request, Request};
use crate::registry::{ClientId, ClientRegistry, RemovalSignal};
use crate::session::{ConnectionRole, ConnectionState};

type Reader = BufReader<OwnedReadHalf>;

/// One accepted connection
pub struct Connection {
    state: ConnectionState,
    registry: Arc<ClientRegistry>,
    router: Arc<Router>,
    capture: Arc<dyn Capture>,
    controller: Arc<dyn Controller>,
}

impl Connection {
    pub fn new(
        id: u64,
        peer_addr: SocketAddr,
        registry: Arc<ClientRegistry>,
        router: Arc<Router>,
        capture: Arc<dyn Capture>,
        controller: Arc<dyn Controller>,
    ) -> Self {
        Self {
            state: ConnectionState::new(id, peer_addr),
            registry,
            router,
            capture,
            controller,
        }
    }

    /// Serve the connection to completion
    pub async fn run(&mut self, socket: TcpStream) -> Result<()> {
        let result = self.serve(socket).await;

        let role = self.state.close();
        if let Some(client_id) = self.state.client_id.take() {
            self.registry.unregister(client_id).await;
        }
        tracing::debug!(
            connection_id = self.state.id,
            role = ?role,
            duration_ms = self.state.duration().as_millis() as u64,
            "Connection finished"
        );

        result
    }

    async fn serve(&mut self, socket: TcpStream) -> Result<()> {
        let (read_half, mut write_half) = socket.into_split();
        let mut reader = BufReader::new(read_half);

        let Some(request) = read_request(&mut reader).await? else {
            tracing::debug!(
                connection_id = self.state.id,
                "Stream closed before a complete request"
            );
            return Ok(());
        };

        if request.is_websocket_upgrade() {
            self.state.classify(ConnectionRole::WebSocketClient);
            perform_handshake(&request, &mut write_half).await?;

            let (client_id, removed) = self.registry.register(Box::new(write_half)).await;
            self.state.registered(client_id);
            tracing::info!(
                connection_id = self.state.id,
                client_id = client_id,
                peer = %self.state.peer_addr,
                "WebSocket client connected"
            );
            return self.websocket_loop(client_id, reader, removed).await;
        }

        match self.router.handle(&request).await {
            Outcome::Respond(response) => {
                self.state.classify(ConnectionRole::HttpOneShot);
                write_half.write_all(&response.to_bytes()).await?;
                write_half.flush().await?;
                write_half.shutdown().await?;
                tracing::debug!(
                    connection_id = self.state.id,
                    path = %request.target(),
                    status = response.status,
                    "Response sent"
                );
                Ok(())
            }
            Outcome::SnapshotPoll { quality, scale } => {
                self.state.classify(ConnectionRole::HttpLongPoll);
                write_half
                    .write_all(keep_alive_head(IMAGE_JPEG).as_bytes())
                    .await?;
                write_half.flush().await?;

                let (client_id, removed) = self
                    .registry
                    .subscribe_snapshots(Box::new(write_half), quality, scale)
                    .await;
                self.state.registered(client_id);
                park(&mut reader, removed).await
            }
            Outcome::VideoStream => {
                self.state.classify(ConnectionRole::HttpLongPoll);
                self.start_stream(&request, &mut write_half).await?;

                let (client_id, removed) =
                    self.registry.subscribe_stream(Box::new(write_half)).await;
                self.state.registered(client_id);
                park(&mut reader, removed).await
            }
        }
    }

    async fn start_stream<W>(&self, request: &Request, writer: &mut W) -> Result<()>
    where
        W: tokio::io::AsyncWrite + Unpin,
    {
        tracing::info!(
            connection_id = self.state.id,
            path = %request.target(),
            "Video stream requested"
        );
        writer.write_all(chunked_head(VIDEO_AVC).as_bytes()).await?;
        let header = self.capture.stream_header();
        if !header.is_empty() {
            writer.write_all(&encode_chunk(&header)).await?;
        }
        writer.flush().await?;
        Ok(())
    }

    async fn websocket_loop(
        &self,
        client_id: ClientId,
        mut reader: Reader,
        mut removed: RemovalSignal,
    ) -> Result<()> {
        loop {
            let frame = tokio::select! {
                _ = &mut removed => {
                    tracing::debug!(client_id = client_id, "Client removed by registry");
                    return Ok(());
                }
                frame = read_frame(&mut reader) => frame?,
            };

            let Some(payload) = frame else {
                return Ok(());
            };
            self.handle_command(client_id, &payload).await;
        }
    }

    /// Decode and inject one control command received over WebSocket
    async fn handle_command(&self, client_id: ClientId, payload: &[u8]) {
        let text = String::from_utf8_lossy(payload);
        let command = match control::decode(&text) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(client_id = client_id, error = %e, "Rejected control command");
                return;
            }
        };

        let kind = command.command_type();
        tracing::trace!(client_id = client_id, command = %kind, "Injecting command");
        match self.controller.inject(command) {
            Ok(InjectOutcome::Done) => {}
            Ok(InjectOutcome::Reply(data)) => {
                self.registry.send_to(client_id, &data).await;
            }
            Ok(InjectOutcome::Unsupported) => {
                tracing::debug!(client_id = client_id, command = %kind, "Command not supported");
            }
            Err(e) => {
                tracing::warn!(client_id = client_id, command = %kind, error = %e, "Injection failed");
            }
        }
    }
}

/// Wait until the registry drops the subscription or the peer disconnects
///
/// Anything the peer sends while parked is discarded.
async fn park<R>(reader: &mut R, mut removed: RemovalSignal) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut discard = [0u8; 512];
    loop {
        tokio::select! {
            _ = &mut removed => return Ok(()),
            read = reader.read(&mut discard) => {
                if read? == 0 {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::duplex;

    use super::*;
    use crate::device::mock::MockCapture;

    #[tokio::test]
    async fn test_park_returns_on_removal() {
        let registry = ClientRegistry::new(Arc::new(MockCapture::new()));
        let (sink, _peer) = duplex(64);
        let (id, removed) = registry.register(Box::new(sink)).await;

        let (mut reader, _writer) = duplex(64);
        let parked = tokio::spawn(async move { park(&mut reader, removed).await });

        registry.unregister(id).await;
        let result = tokio::time::timeout(Duration::from_secs(1), parked)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_park_returns_on_peer_eof() {
        let registry = ClientRegistry::new(Arc::new(MockCapture::new()));
        let (sink, _peer) = duplex(64);
        let (_id, removed) = registry.register(Box::new(sink)).await;

        let (mut reader, mut writer) = duplex(64);
        writer.write_all(b"ignored").await.unwrap();
        drop(writer);

        let result = tokio::time::timeout(Duration::from_secs(1), park(&mut reader, removed))
            .await
            .unwrap();
        assert!(result.is_ok());
    }
}
