//! HTTP response heads
//!
//! Every response carries the same CORS header set. Bodies are written by
//! the caller after the head.

use bytes::{BufMut, Bytes, BytesMut};

const CORS_HEADERS: &str = "Access-Control-Allow-Origin: *\r\n\
                            Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
                            Access-Control-Allow-Headers: Content-Type\r\n";

pub const TEXT_PLAIN: &str = "text/plain";
pub const APPLICATION_JSON: &str = "application/json";
pub const IMAGE_JPEG: &str = "image/jpeg";
pub const VIDEO_AVC: &str = "video/avc";

/// A complete HTTP response with a `Content-Length` body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub reason: String,
    pub content_type: String,
    pub body: Bytes,
}

impl Response {
    /// `200 OK` with the given body
    pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status: 200,
            reason: "OK".into(),
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// `200 OK` plain text
    pub fn text(body: impl Into<String>) -> Self {
        Self::ok(TEXT_PLAIN, Bytes::from(body.into()))
    }

    /// `200 OK` with no body
    pub fn empty(content_type: &str) -> Self {
        Self::ok(content_type, Bytes::new())
    }

    pub fn with_status(status: u16, reason: &str, content_type: &str, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            reason: reason.into(),
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::with_status(400, "Bad Request", TEXT_PLAIN, Bytes::from(message.into()))
    }

    pub fn internal_error() -> Self {
        Self::with_status(500, "Internal Server Error", TEXT_PLAIN, Bytes::new())
    }

    /// Serialize head and body; the connection is closed after it
    pub fn to_bytes(&self) -> Bytes {
        let head = response_head(
            self.status,
            &self.reason,
            self.body.len(),
            &self.content_type,
            "close",
        );
        let mut out = BytesMut::with_capacity(head.len() + self.body.len());
        out.put_slice(head.as_bytes());
        out.put_slice(&self.body);
        out.freeze()
    }
}

/// Head of a response with a fixed-length body
pub fn response_head(
    status: u16,
    reason: &str,
    content_length: usize,
    content_type: &str,
    connection: &str,
) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Length: {}\r\n\
         Connection: {}\r\n\
         Content-Type: {}\r\n\
         {}\r\n",
        status, reason, content_length, connection, content_type, CORS_HEADERS
    )
}

/// Head of an open-ended long-poll response
pub fn keep_alive_head(content_type: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Connection: keep-alive\r\n\
         Content-Type: {}\r\n\
         {}\r\n",
        content_type, CORS_HEADERS
    )
}

/// Head of a chunked response
pub fn chunked_head(content_type: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\n\
         Connection: keep-alive\r\n\
         {}\
         Transfer-Encoding: chunked\r\n\
         Content-Type: {}\r\n\r\n",
        CORS_HEADERS, content_type
    )
}

/// Frame `data` as one HTTP chunk: `<hex len>\r\n<data>\r\n`
///
/// `data` must not be empty; an empty chunk ends the body.
pub fn encode_chunk(data: &[u8]) -> Bytes {
    let size = format!("{:x}\r\n", data.len());
    let mut out = BytesMut::with_capacity(size.len() + data.len() + 2);
    out.put_slice(size.as_bytes());
    out.put_slice(data);
    out.put_slice(b"\r\n");
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_head_headers() {
        let head = response_head(200, "OK", 5, TEXT_PLAIN, "close");

        assert!(head.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(head.contains("Content-Length: 5\r\n"));
        assert!(head.contains("Connection: close\r\n"));
        assert!(head.contains("Content-Type: text/plain\r\n"));
        assert!(head.contains("Access-Control-Allow-Origin: *\r\n"));
        assert!(head.contains("Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n"));
        assert!(head.contains("Access-Control-Allow-Headers: Content-Type\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_response_to_bytes() {
        let bytes = Response::text("hello").to_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();

        let (head, body) = text.split_once("\r\n\r\n").unwrap();
        assert!(head.contains("Content-Length: 5"));
        assert_eq!(body, "hello");
    }

    #[test]
    fn test_internal_error() {
        let bytes = Response::internal_error().to_bytes();
        let text = std::str::from_utf8(&bytes).unwrap();

        assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
        assert!(text.contains("Content-Length: 0\r\n"));
    }

    #[test]
    fn test_keep_alive_head_has_no_length() {
        let head = keep_alive_head(IMAGE_JPEG);

        assert!(head.contains("Connection: keep-alive\r\n"));
        assert!(head.contains("Content-Type: image/jpeg\r\n"));
        assert!(!head.contains("Content-Length"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_chunked_head() {
        let head = chunked_head(VIDEO_AVC);

        assert!(head.contains("Transfer-Encoding: chunked\r\n"));
        assert!(head.contains("Content-Type: video/avc\r\n"));
        assert!(head.ends_with("\r\n\r\n"));
    }

    #[test]
    fn test_encode_chunk() {
        assert_eq!(&encode_chunk(b"abc")[..], b"3\r\nabc\r\n");
        assert_eq!(&encode_chunk(&[0u8; 255])[..4], b"ff\r\n");
    }
}
