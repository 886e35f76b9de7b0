//! Per-connection state

pub mod state;

pub use state::{ConnectionRole, ConnectionState};
