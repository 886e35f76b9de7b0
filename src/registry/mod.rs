//! Client registry for frame fan-out
//!
//! The registry tracks every connection the server pushes data to and owns
//! the write half of each one. Connection tasks keep the read half and wait
//! on a [`RemovalSignal`] that resolves when the registry drops their entry.
//!
//! # Architecture
//!
//! ```text
//!                         Arc<ClientRegistry>
//!              ┌─────────────────────────────────────┐
//!              │ websocket_clients:    id -> sink    │
//!              │ snapshot_subscribers: id -> sink,q,s│
//!              │ stream_subscribers:   id -> sink    │
//!              └──────────────────┬──────────────────┘
//!                                 │
//!      ┌──────────────────────────┼──────────────────────────┐
//!      │                          │                          │
//!      ▼                          ▼                          ▼
//! broadcast_binary()   push_to_snapshot_subscribers()  push_to_stream_subscribers()
//! WS binary frame      encode + snapshot record        chunk-framed raw video
//!      │                          │                          │
//!      └───────► write under timeout, prune failures ◄───────┘
//! ```
//!
//! # Stream activation gate
//!
//! The capture encoder runs only while at least one stream subscriber is
//! registered. The registry flips it on the 0→1 and 1→0 transitions while
//! holding the stream set's lock, so the two calls always alternate.

pub mod config;
pub mod entry;
pub mod frame;
pub mod store;

pub use config::RegistryConfig;
pub use entry::{
    ClientId, ClientSink, RegistryStats, RemovalSignal, Subscription, SubscriptionKind,
};
pub use frame::{snapshot_record, Frame, FrameSlot};
pub use store::ClientRegistry;
