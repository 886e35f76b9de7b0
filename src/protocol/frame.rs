//! WebSocket frame codec
//!
//! Frame layout (RFC 6455 §5.2):
//!
//! ```text
//!  0               1               2               3
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |  Masking-key (0 or 4 bytes)   |          Payload Data         |
//! +-------------------------------+-------------------------------+
//! ```
//!
//! The server only ever sends unmasked FIN+binary frames and accepts any
//! length up to 64 bits on the way out. Inbound frames are limited to a
//! 16-bit extended length: a `127` length code is rejected with
//! [`ProtocolError::PayloadTooLarge`]. Fragmentation, ping/pong and the
//! close handshake are not implemented.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::{ProtocolError, Result};
use crate::protocol::constants::*;

/// Close opcode; treated as end of stream
const OPCODE_CLOSE: u8 = 0x8;

/// Encode `payload` as a single unmasked binary frame
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let len = payload.len();
    let mut buf = BytesMut::with_capacity(10 + len);

    buf.put_u8(FIN_BINARY);
    if len <= MAX_INLINE_PAYLOAD {
        buf.put_u8(len as u8);
    } else if len <= u16::MAX as usize {
        buf.put_u8(EXTENDED_LEN_16);
        buf.put_u16(len as u16);
    } else {
        buf.put_u8(EXTENDED_LEN_64);
        buf.put_u64(len as u64);
    }
    buf.put_slice(payload);

    buf.freeze()
}

/// XOR `payload` in place with the cyclic 4-byte masking key
pub fn apply_mask(payload: &mut [u8], key: [u8; 4]) {
    for (i, byte) in payload.iter_mut().enumerate() {
        *byte ^= key[i % 4];
    }
}

/// Read and unmask one client frame
///
/// Returns `Ok(None)` if the stream ends partway through any field, or the
/// peer sends a close frame.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 2];
    if !read_full(reader, &mut header).await? {
        return Ok(None);
    }

    let opcode = header[0] & 0x0F;
    let masked = header[1] & MASK_BIT != 0;

    let len = match header[1] & PAYLOAD_LEN_MASK {
        EXTENDED_LEN_16 => {
            let mut ext = [0u8; 2];
            if !read_full(reader, &mut ext).await? {
                return Ok(None);
            }
            u16::from_be_bytes(ext) as usize
        }
        EXTENDED_LEN_64 => return Err(ProtocolError::PayloadTooLarge(EXTENDED_LEN_64).into()),
        n => n as usize,
    };

    let mut key = [0u8; 4];
    if masked && !read_full(reader, &mut key).await? {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload).await? {
        return Ok(None);
    }

    if opcode == OPCODE_CLOSE {
        return Ok(None);
    }

    if masked {
        apply_mask(&mut payload, key);
    }

    Ok(Some(Bytes::from(payload)))
}

/// Fill `buf` completely; `false` on a short read
async fn read_full<R>(reader: &mut R, buf: &mut [u8]) -> Result<bool>
where
    R: AsyncRead + Unpin,
{
    match reader.read_exact(buf).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e.into()),
    }
}
