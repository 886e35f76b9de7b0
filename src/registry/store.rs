//! Client registry implementation
//!
//! Tracks every connection the server pushes data to and fans payloads out
//! to them. Three independent sets, each behind its own lock:
//!
//! - WebSocket clients: receive binary frames from [`broadcast_binary`]
//! - Snapshot subscribers: receive a re-encoded image per captured frame
//! - Stream subscribers: receive raw encoder output, chunk framed
//!
//! A fan-out holds the set's lock for the whole write pass, so concurrent
//! register/unregister calls are serialized against it. Snapshot encoding
//! happens before that pass, outside the lock. A client whose write
//! fails or exceeds the configured timeout is removed in the same critical
//! section and closed afterwards; the remaining clients are still served.
//!
//! [`broadcast_binary`]: ClientRegistry::broadcast_binary

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;

use super::config::RegistryConfig;
use super::entry::{
    ClientEntry, ClientId, ClientSink, RegistryStats, RemovalSignal, Subscription,
};
use super::frame::{snapshot_record, Frame};
use crate::device::{encode_blocking, Capture};
use crate::http::response::encode_chunk;
use crate::protocol::frame::encode_frame;

type ClientSet = Mutex<HashMap<ClientId, ClientEntry>>;

/// Registry of connected viewers and subscribers
pub struct ClientRegistry {
    websocket_clients: ClientSet,
    snapshot_subscribers: ClientSet,
    stream_subscribers: ClientSet,

    /// Activation gate target for the stream set
    capture: Arc<dyn Capture>,

    next_client_id: AtomicU64,

    config: RegistryConfig,
}

impl ClientRegistry {
    /// Create a registry with default configuration
    pub fn new(capture: Arc<dyn Capture>) -> Self {
        Self::with_config(capture, RegistryConfig::default())
    }

    /// Create a registry with custom configuration
    pub fn with_config(capture: Arc<dyn Capture>, config: RegistryConfig) -> Self {
        Self {
            websocket_clients: Mutex::new(HashMap::new()),
            snapshot_subscribers: Mutex::new(HashMap::new()),
            stream_subscribers: Mutex::new(HashMap::new()),
            capture,
            next_client_id: AtomicU64::new(1),
            config,
        }
    }

    /// Get the registry configuration
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn allocate_id(&self) -> ClientId {
        self.next_client_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a WebSocket client in the broadcast set
    pub async fn register(&self, sink: ClientSink) -> (ClientId, RemovalSignal) {
        let id = self.allocate_id();
        let (entry, removed) = ClientEntry::new(sink, None);

        let mut clients = self.websocket_clients.lock().await;
        clients.insert(id, entry);
        tracing::info!(client_id = id, total = clients.len(), "Client connected");

        (id, removed)
    }

    /// Register a snapshot long-poll subscriber
    pub async fn subscribe_snapshots(
        &self,
        sink: ClientSink,
        quality: u32,
        scale: f32,
    ) -> (ClientId, RemovalSignal) {
        let id = self.allocate_id();
        let (entry, removed) = ClientEntry::new(sink, Some(Subscription::snapshot(quality, scale)));

        let mut subs = self.snapshot_subscribers.lock().await;
        subs.insert(id, entry);
        tracing::info!(
            client_id = id,
            quality = quality,
            scale = scale,
            total = subs.len(),
            "Snapshot subscriber added"
        );

        (id, removed)
    }

    /// Register a raw stream subscriber
    ///
    /// The first subscriber switches the video encoder on.
    pub async fn subscribe_stream(&self, sink: ClientSink) -> (ClientId, RemovalSignal) {
        let id = self.allocate_id();
        let (entry, removed) = ClientEntry::new(sink, Some(Subscription::stream()));

        let mut subs = self.stream_subscribers.lock().await;
        subs.insert(id, entry);
        if subs.len() == 1 {
            tracing::info!("First stream subscriber, starting encoder");
            self.capture.set_streaming(true);
        }
        tracing::info!(client_id = id, total = subs.len(), "Stream subscriber added");

        (id, removed)
    }

    /// Remove a client from whichever set holds it and close its connection
    ///
    /// Unknown ids are ignored, so calling this twice is harmless.
    pub async fn unregister(&self, id: ClientId) {
        let removed = self.websocket_clients.lock().await.remove(&id);
        if let Some(entry) = removed {
            tracing::info!(client_id = id, "Client disconnected");
            entry.close(self.config.write_timeout).await;
            return;
        }

        let removed = self.snapshot_subscribers.lock().await.remove(&id);
        if let Some(entry) = removed {
            tracing::info!(client_id = id, "Snapshot subscriber removed");
            entry.close(self.config.write_timeout).await;
            return;
        }

        let removed = {
            let mut subs = self.stream_subscribers.lock().await;
            let removed = subs.remove(&id);
            if removed.is_some() {
                tracing::info!(client_id = id, total = subs.len(), "Stream subscriber removed");
                self.deactivate_if_empty(subs.len());
            }
            removed
        };
        if let Some(entry) = removed {
            entry.close(self.config.write_timeout).await;
        }
    }

    /// Send `payload` as a binary frame to every WebSocket client
    ///
    /// Returns the number of clients that received it.
    pub async fn broadcast_binary(&self, payload: &[u8]) -> usize {
        let frame = encode_frame(payload);
        let timeout = self.config.write_timeout;

        let failed = {
            let mut clients = self.websocket_clients.lock().await;
            tracing::trace!(clients = clients.len(), bytes = payload.len(), "Broadcast");

            let mut failed = Vec::new();
            for (id, entry) in clients.iter_mut() {
                if let Err(e) = entry.write(&frame, timeout).await {
                    tracing::warn!(client_id = *id, error = %e, "Error sending frame");
                    failed.push(*id);
                }
            }
            prune(&mut clients, failed)
        };

        self.close_entries(failed).await
    }

    /// Send `payload` as a binary frame to one WebSocket client
    ///
    /// A failed write unregisters the client. Returns whether it was sent.
    pub async fn send_to(&self, id: ClientId, payload: &[u8]) -> bool {
        let frame = encode_frame(payload);
        let timeout = self.config.write_timeout;

        let failed = {
            let mut clients = self.websocket_clients.lock().await;
            let Some(entry) = clients.get_mut(&id) else {
                return false;
            };
            match entry.write(&frame, timeout).await {
                Ok(()) => return true,
                Err(e) => {
                    tracing::warn!(client_id = id, error = %e, "Error sending reply");
                    prune(&mut clients, vec![id])
                }
            }
        };

        self.close_entries(failed).await;
        false
    }

    /// Encode `frame` per subscription and push it to every snapshot subscriber
    ///
    /// Each distinct (quality, scale) pair is encoded once, on the blocking
    /// pool and without holding the set's lock. Subscribers that leave while
    /// encoding runs are not written to. Encoder failures skip the affected
    /// subscribers for this frame; write failures remove them. Returns the
    /// number of subscribers served.
    pub async fn push_to_snapshot_subscribers(&self, frame: &Frame) -> usize {
        let timeout = self.config.write_timeout;

        let targets: Vec<(ClientId, Subscription)> = {
            let subs = self.snapshot_subscribers.lock().await;
            subs.iter()
                .filter_map(|(id, entry)| entry.subscription.map(|sub| (*id, sub)))
                .collect()
        };
        if targets.is_empty() {
            return 0;
        }

        // f32 is not hashable, key the scale by its bit pattern
        let mut records: HashMap<(u32, u32), Option<Bytes>> = HashMap::new();
        for (_, sub) in &targets {
            let key = (sub.quality, sub.scale.to_bits());
            if records.contains_key(&key) {
                continue;
            }
            let encoded = encode_blocking(&self.capture, frame, sub.quality, sub.scale).await;
            let record = match encoded {
                Ok(image) => Some(snapshot_record(&image, frame, sub.quality, sub.scale)),
                Err(e) => {
                    tracing::error!(
                        quality = sub.quality,
                        scale = sub.scale,
                        error = %e,
                        "Snapshot encode failed"
                    );
                    None
                }
            };
            records.insert(key, record);
        }

        let (failed, served) = {
            let mut subs = self.snapshot_subscribers.lock().await;
            let mut failed = Vec::new();
            let mut served = 0;

            for (id, sub) in &targets {
                let Some(Some(record)) = records.get(&(sub.quality, sub.scale.to_bits())) else {
                    continue;
                };
                let Some(entry) = subs.get_mut(id) else {
                    continue;
                };
                match entry.write(record, timeout).await {
                    Ok(()) => served += 1,
                    Err(e) => {
                        tracing::warn!(client_id = *id, error = %e, "Error writing snapshot");
                        failed.push(*id);
                    }
                }
            }
            (prune(&mut subs, failed), served)
        };

        self.close_entries(failed).await;
        served
    }

    /// Forward raw encoder output to every stream subscriber
    ///
    /// Write failures remove the subscriber; removing the last one switches
    /// the encoder off. Returns the number of subscribers served.
    pub async fn push_to_stream_subscribers(&self, data: &[u8]) -> usize {
        if data.is_empty() {
            // An empty chunk would terminate the chunked body
            return self.stream_subscribers.lock().await.len();
        }
        let chunk = encode_chunk(data);
        let timeout = self.config.write_timeout;

        let failed = {
            let mut subs = self.stream_subscribers.lock().await;
            let mut failed = Vec::new();
            for (id, entry) in subs.iter_mut() {
                if let Err(e) = entry.write(&chunk, timeout).await {
                    tracing::warn!(client_id = *id, error = %e, "Error writing video");
                    failed.push(*id);
                }
            }
            let had_failures = !failed.is_empty();
            let failed = prune(&mut subs, failed);
            if had_failures {
                self.deactivate_if_empty(subs.len());
            }
            failed
        };

        self.close_entries(failed).await
    }

    /// Whether `id` is registered in any set
    pub async fn contains(&self, id: ClientId) -> bool {
        self.websocket_clients.lock().await.contains_key(&id)
            || self.snapshot_subscribers.lock().await.contains_key(&id)
            || self.stream_subscribers.lock().await.contains_key(&id)
    }

    /// Current set sizes
    pub async fn stats(&self) -> RegistryStats {
        RegistryStats {
            websocket_clients: self.websocket_clients.lock().await.len(),
            snapshot_subscribers: self.snapshot_subscribers.lock().await.len(),
            stream_subscribers: self.stream_subscribers.lock().await.len(),
        }
    }

    /// Remove and close every registered connection
    ///
    /// Every waiting connection task observes its removal signal and exits.
    pub async fn close_all(&self) {
        let mut entries: Vec<ClientEntry> = Vec::new();
        entries.extend(self.websocket_clients.lock().await.drain().map(|(_, e)| e));
        entries.extend(self.snapshot_subscribers.lock().await.drain().map(|(_, e)| e));
        {
            let mut subs = self.stream_subscribers.lock().await;
            let had_subscribers = !subs.is_empty();
            entries.extend(subs.drain().map(|(_, e)| e));
            if had_subscribers {
                self.capture.set_streaming(false);
            }
        }

        tracing::info!(closed = entries.len(), "Closing all clients");
        for entry in entries {
            entry.close(self.config.write_timeout).await;
        }
    }

    /// Switch the encoder off once the stream set is empty
    ///
    /// Must be called with the stream set's lock held.
    fn deactivate_if_empty(&self, remaining: usize) {
        if remaining == 0 {
            tracing::info!("Last stream subscriber gone, stopping encoder");
            self.capture.set_streaming(false);
        }
    }

    /// Close pruned entries; returns `served` for chaining
    async fn close_entries(&self, pruned: Pruned) -> usize {
        for entry in pruned.entries {
            entry.close(self.config.write_timeout).await;
        }
        pruned.served
    }
}

/// Outcome of one fan-out after failed members were removed
struct Pruned {
    served: usize,
    entries: Vec<ClientEntry>,
}

fn prune(set: &mut HashMap<ClientId, ClientEntry>, failed: Vec<ClientId>) -> Pruned {
    let entries: Vec<ClientEntry> = failed.iter().filter_map(|id| set.remove(id)).collect();
    Pruned {
        served: set.len(),
        entries,
    }
}
