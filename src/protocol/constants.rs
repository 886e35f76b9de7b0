//! Wire constants shared by the HTTP and WebSocket layers

/// GUID appended to the client key when computing `Sec-WebSocket-Accept` (RFC 6455 §1.3)
pub const WEBSOCKET_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Request-line prefix that selects the WebSocket upgrade path
pub const WS_UPGRADE_PREFIX: &str = "GET /ws-api";

/// End of an HTTP header block
pub const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Body length header, matched case-sensitively
pub const CONTENT_LENGTH_HEADER: &str = "Content-Length:";

/// FIN bit set, binary opcode
pub const FIN_BINARY: u8 = 0x82;

/// Mask bit in the second header byte
pub const MASK_BIT: u8 = 0x80;

/// Low seven bits of the second header byte
pub const PAYLOAD_LEN_MASK: u8 = 0x7F;

/// Largest length that fits in the base header
pub const MAX_INLINE_PAYLOAD: usize = 125;

/// Length code announcing a 16-bit extended length
pub const EXTENDED_LEN_16: u8 = 126;

/// Length code announcing a 64-bit extended length
pub const EXTENDED_LEN_64: u8 = 127;
