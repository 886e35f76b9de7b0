//! Registry entries
//!
//! Each registered client owns the write side of its connection. The
//! connection task keeps the read side and a [`RemovalSignal`] that resolves
//! once the registry drops the entry.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::oneshot;

/// Identifier of a registered connection, unique for the registry's lifetime
pub type ClientId = u64;

/// Write side of a registered connection
pub type ClientSink = Box<dyn AsyncWrite + Send + Unpin>;

/// Kind of HTTP subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// `/screen.jpeg`: re-encoded snapshot per frame
    SnapshotPoll,
    /// `/stream.avc`: raw encoder output
    BinaryStream,
}

/// Immutable parameters of a subscription
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Subscription {
    pub kind: SubscriptionKind,
    /// Image quality, 0-100
    pub quality: u32,
    /// Scale factor applied before encoding
    pub scale: f32,
}

impl Subscription {
    pub fn snapshot(quality: u32, scale: f32) -> Self {
        Self {
            kind: SubscriptionKind::SnapshotPoll,
            quality,
            scale,
        }
    }

    pub fn stream() -> Self {
        Self {
            kind: SubscriptionKind::BinaryStream,
            quality: 100,
            scale: 1.0,
        }
    }
}

/// A registered connection
pub struct ClientEntry {
    pub(super) sink: ClientSink,
    pub(super) subscription: Option<Subscription>,
    /// Dropped together with the entry, which wakes the connection task
    _removed: oneshot::Sender<()>,
}

impl ClientEntry {
    pub(super) fn new(sink: ClientSink, subscription: Option<Subscription>) -> (Self, RemovalSignal) {
        let (tx, rx) = oneshot::channel();
        let entry = Self {
            sink,
            subscription,
            _removed: tx,
        };
        (entry, RemovalSignal(rx))
    }

    /// Write `data` and flush, bounded by `timeout`
    pub(super) async fn write(&mut self, data: &[u8], timeout: Duration) -> std::io::Result<()> {
        let sink = &mut self.sink;
        let write = async {
            sink.write_all(data).await?;
            sink.flush().await
        };
        match tokio::time::timeout(timeout, write).await {
            Ok(result) => result,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                "client write timed out",
            )),
        }
    }

    /// Shut the write side down and drop the entry
    pub(super) async fn close(mut self, timeout: Duration) {
        let _ = tokio::time::timeout(timeout, self.sink.shutdown()).await;
    }
}

/// Resolves once the owning entry has been removed from the registry
///
/// Replaces polling the registry for membership: the connection task awaits
/// this alongside its socket read.
#[derive(Debug)]
pub struct RemovalSignal(oneshot::Receiver<()>);

impl Future for RemovalSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        Pin::new(&mut self.0).poll(cx).map(|_| ())
    }
}

/// Counts per registered set
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub websocket_clients: usize,
    pub snapshot_subscribers: usize,
    pub stream_subscribers: usize,
}
