//! WebSocket opening handshake
//!
//! The server side of the RFC 6455 upgrade:
//!
//! ```text
//! Client                                          Server
//!   |                                               |
//!   |-- GET /ws-api HTTP/1.1 ---------------------->|
//!   |   Sec-WebSocket-Key: <base64 nonce>           |
//!   |                                               |
//!   |<-- HTTP/1.1 101 Switching Protocols ----------|
//!   |    Sec-WebSocket-Accept: base64(sha1(key+GUID))
//!   |                                               |
//!   |          [binary frames both ways]            |
//! ```
//!
//! No subprotocol or extension negotiation is performed.
//!
//! Reference: RFC 6455 Section 4.2

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{ProtocolError, Result};
use crate::protocol::constants::WEBSOCKET_GUID;
use crate::protocol::request::Request;

/// Compute the `Sec-WebSocket-Accept` token for a client key
pub fn accept_key(client_key: &str) -> String {
    let mut sha1 = Sha1::new();
    sha1.update(client_key.as_bytes());
    sha1.update(WEBSOCKET_GUID.as_bytes());
    BASE64.encode(sha1.finalize())
}

/// Build the `101 Switching Protocols` response for a request
///
/// Fails with [`ProtocolError::MissingWebSocketKey`] if the request carries
/// no `Sec-WebSocket-Key`.
pub fn upgrade_response(request: &Request) -> std::result::Result<String, ProtocolError> {
    let key = request
        .header("Sec-WebSocket-Key")
        .filter(|k| !k.is_empty())
        .ok_or(ProtocolError::MissingWebSocketKey)?;

    Ok(format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        accept_key(key)
    ))
}

/// Write the upgrade response and flush
pub async fn perform_handshake<W>(request: &Request, writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let response = upgrade_response(request)?;
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}
