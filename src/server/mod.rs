//! Server implementation
//!
//! The accept loop, per-connection tasks and server configuration.

pub mod config;
pub mod connection;
pub mod listener;

pub use config::{ProxyConfig, ServerConfig};
pub use listener::DeviceServer;
