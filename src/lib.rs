//! Screen streaming and remote control server
//!
//! Serves a live screen feed and accepts input commands for a single device,
//! over a hand-rolled HTTP/1.1 subset and RFC 6455 WebSocket on one port.
//!
//! Capture, image encoding and input injection are supplied by the host
//! through the [`device::Capture`] and [`device::Controller`] traits.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use screen_relay::device::mock::{MockCapture, MockController};
//! use screen_relay::{DeviceServer, ServerConfig};
//!
//! # async fn run() -> screen_relay::Result<()> {
//! let server = DeviceServer::new(
//!     ServerConfig::default(),
//!     Arc::new(MockCapture::new()),
//!     Arc::new(MockController::new()),
//! );
//! server.run_until(async { let _ = tokio::signal::ctrl_c().await; }).await
//! # }
//! ```

pub mod control;
pub mod device;
pub mod error;
pub mod http;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;

pub use control::{decode, ControlCommand};
pub use device::{Capture, Controller, InjectOutcome};
pub use error::{Error, Result};
pub use registry::{ClientRegistry, Frame, RegistryConfig};
pub use server::{DeviceServer, ProxyConfig, ServerConfig};
