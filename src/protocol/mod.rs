//! Wire protocol implementation
//!
//! This module provides:
//! - HTTP request reading and WebSocket/HTTP classification
//! - The RFC 6455 opening handshake
//! - WebSocket frame encoding and decoding

pub mod constants;
pub mod frame;
pub mod handshake;
pub mod request;

pub use frame::{apply_mask, encode_frame, read_frame};
pub use handshake::{accept_key, perform_handshake};
pub use request::{read_request, Request};
