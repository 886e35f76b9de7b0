//! Connection state machine
//!
//! Tracks a connection from accept to close. The role is decided once, from
//! the first request, and only ever moves forward.

use std::net::SocketAddr;
use std::time::Instant;

use crate::registry::ClientId;

/// What a connection turned out to be
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionRole {
    /// Accepted, first request not read yet
    Unclassified,
    /// Completed the WebSocket handshake
    WebSocketClient,
    /// Plain request answered with one response
    HttpOneShot,
    /// Snapshot or stream subscription parked in the registry
    HttpLongPoll,
    /// Connection closed
    Closed,
}

/// Per-connection state
#[derive(Debug)]
pub struct ConnectionState {
    /// Connection sequence number
    pub id: u64,

    /// Remote peer address
    pub peer_addr: SocketAddr,

    role: ConnectionRole,

    /// Registry id while registered
    pub client_id: Option<ClientId>,

    /// Accept time
    pub connected_at: Instant,
}

impl ConnectionState {
    pub fn new(id: u64, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            role: ConnectionRole::Unclassified,
            client_id: None,
            connected_at: Instant::now(),
        }
    }

    pub fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Assign the connection's role
    ///
    /// Only valid once, from [`ConnectionRole::Unclassified`]; returns
    /// whether the transition happened.
    pub fn classify(&mut self, role: ConnectionRole) -> bool {
        if self.role != ConnectionRole::Unclassified
            || matches!(role, ConnectionRole::Unclassified | ConnectionRole::Closed)
        {
            return false;
        }
        self.role = role;
        true
    }

    /// Record the registry id of a registered connection
    pub fn registered(&mut self, client_id: ClientId) {
        self.client_id = Some(client_id);
    }

    /// Mark the connection closed; returns the role it had
    pub fn close(&mut self) -> ConnectionRole {
        std::mem::replace(&mut self.role, ConnectionRole::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.role == ConnectionRole::Closed
    }

    /// Time since accept
    pub fn duration(&self) -> std::time::Duration {
        self.connected_at.elapsed()
    }
}
