//! HTTP request reader and classifier
//!
//! Reads a raw request off the socket: the header block up to the blank
//! line, then exactly `Content-Length` body bytes if that header is present.
//! The reader consumes no bytes past the request, so a WebSocket client can
//! keep reading frames from the same buffered reader afterwards.
//!
//! There is no upper bound on the header size.

use std::borrow::Cow;

use bytes::Bytes;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::Result;
use crate::protocol::constants::{CONTENT_LENGTH_HEADER, HEADER_TERMINATOR, WS_UPGRADE_PREFIX};

/// A request as read from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Header block including the request line and trailing blank line
    pub head: String,
    /// Body bytes (empty without `Content-Length`)
    pub body: Bytes,
}

impl Request {
    /// Parse a request from an in-memory buffer
    ///
    /// Returns `None` when the buffer does not hold a complete header block.
    pub fn from_bytes(raw: &[u8]) -> Option<Self> {
        let end = raw
            .windows(HEADER_TERMINATOR.len())
            .position(|w| w == HEADER_TERMINATOR)?
            + HEADER_TERMINATOR.len();
        let head = String::from_utf8_lossy(&raw[..end]).into_owned();
        let len = content_length(&head).min(raw.len() - end);
        Some(Self {
            head,
            body: Bytes::copy_from_slice(&raw[end..end + len]),
        })
    }

    /// First line of the header block
    pub fn request_line(&self) -> &str {
        self.head.split("\r\n").next().unwrap_or_default()
    }

    /// Request method (`GET`, `POST`, ...)
    pub fn method(&self) -> &str {
        self.request_line()
            .split_whitespace()
            .next()
            .unwrap_or_default()
    }

    /// Request target including the query string
    pub fn target(&self) -> &str {
        self.request_line()
            .split_whitespace()
            .nth(1)
            .unwrap_or_default()
    }

    /// Request path without the query string
    pub fn path(&self) -> &str {
        let target = self.target();
        target.split_once('?').map_or(target, |(path, _)| path)
    }

    /// Look up a query parameter by name
    pub fn query(&self, key: &str) -> Option<&str> {
        let (_, query) = self.target().split_once('?')?;
        query.split('&').find_map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (k == key).then_some(v)
        })
    }

    /// Look up a header value by name (case-insensitive), trimmed
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.split("\r\n").skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }

    /// Body decoded as UTF-8 (lossy)
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// Whether this request asks for the WebSocket upgrade path
    ///
    /// Anything else, malformed requests included, is served as HTTP.
    pub fn is_websocket_upgrade(&self) -> bool {
        self.request_line().starts_with(WS_UPGRADE_PREFIX)
    }
}

/// Read one request from `reader`
///
/// Returns `Ok(None)` if the stream closes before the header block (or the
/// announced body) is complete.
pub async fn read_request<R>(reader: &mut R) -> Result<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    let mut head = Vec::with_capacity(1024);

    loop {
        let n = reader.read_until(b'\n', &mut head).await?;
        if n == 0 {
            return Ok(None);
        }
        if head.ends_with(HEADER_TERMINATOR) {
            break;
        }
    }

    let head = String::from_utf8_lossy(&head).into_owned();
    let len = content_length(&head);

    // Grows with the bytes actually received, never with the announced length
    let mut body = Vec::new();
    let read = (&mut *reader).take(len as u64).read_to_end(&mut body).await?;
    if read < len {
        return Ok(None);
    }

    Ok(Some(Request {
        head,
        body: Bytes::from(body),
    }))
}

/// Value of the case-sensitive `Content-Length` header, 0 if absent or invalid
fn content_length(head: &str) -> usize {
    head.split("\r\n")
        .find_map(|line| line.strip_prefix(CONTENT_LENGTH_HEADER))
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn test_read_request_without_body() {
        let raw = b"GET /screen/size HTTP/1.1\r\nHost: device\r\n\r\n";
        let mut reader = BufReader::new(&raw[..]);

        let request = read_request(&mut reader).await.unwrap().unwrap();
        assert_eq!(request.method(), "GET");
        assert_eq!(request.path(), "/screen/size");
        assert_eq!(request.header("host"), Some("device"));
        assert!(request.body.is_empty());
    }

    #[tokio::test]
    async fn test_read_request_with_body() {
        let raw = b"POST /shell/exec HTTP/1.1\r\nContent-Length: 5\r\n\r\nls -lEXTRA";
        let mut reader = BufReader::new(&raw[..]);

        let request = read_request(&mut reader).await.unwrap().unwrap();
        assert_eq!(request.body_text(), "ls -l");

        // Bytes after the body stay in the reader
        let mut rest = Vec::new();
        reader.read_to_end(&mut rest).await.unwrap();
        assert_eq!(rest, b"EXTRA");
    }

    #[tokio::test]
    async fn test_read_request_fragmented() {
        let mut mock = tokio_test::io::Builder::new()
            .read(b"POST /controller HT")
            .read(b"TP/1.1\r\nContent-Le")
            .read(b"ngth: 10\r\n\r")
            .read(b"\n0|1|66")
            .read(b"|1|0")
            .build();
        let mut reader = BufReader::new(&mut mock);

        let request = read_request(&mut reader).await.unwrap().unwrap();
        assert_eq!(request.path(), "/controller");
        assert_eq!(request.body_text(), "0|1|66|1|0");
    }

    #[tokio::test]
    async fn test_read_request_closed_before_terminator() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n";
        let mut reader = BufReader::new(&raw[..]);

        assert!(read_request(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_request_closed_mid_body() {
        let raw = b"POST /x HTTP/1.1\r\nContent-Length: 20\r\n\r\nshort";
        let mut reader = BufReader::new(&raw[..]);

        assert!(read_request(&mut reader).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_huge_content_length_with_short_body() {
        let raw = b"POST /controller HTTP/1.1\r\nContent-Length: 9223372036854775807\r\n\r\n0|1";
        let mut reader = BufReader::new(&raw[..]);

        assert!(read_request(&mut reader).await.unwrap().is_none());
    }

    #[test]
    fn test_content_length_is_case_sensitive() {
        assert_eq!(content_length("POST / HTTP/1.1\r\nContent-Length: 12\r\n\r\n"), 12);
        assert_eq!(content_length("POST / HTTP/1.1\r\ncontent-length: 12\r\n\r\n"), 0);
        assert_eq!(content_length("POST / HTTP/1.1\r\nContent-Length: abc\r\n\r\n"), 0);
    }

    #[test]
    fn test_query_params() {
        let request = Request::from_bytes(b"GET /screen.jpeg?q=60&s=0.25&flag HTTP/1.1\r\n\r\n").unwrap();

        assert_eq!(request.path(), "/screen.jpeg");
        assert_eq!(request.query("q"), Some("60"));
        assert_eq!(request.query("s"), Some("0.25"));
        assert_eq!(request.query("flag"), Some(""));
        assert_eq!(request.query("m"), None);
    }

    #[test]
    fn test_classifier() {
        let ws = Request::from_bytes(b"GET /ws-api?id=1 HTTP/1.1\r\nUpgrade: websocket\r\n\r\n").unwrap();
        let http = Request::from_bytes(b"GET /screen.jpeg HTTP/1.1\r\n\r\n").unwrap();
        let post = Request::from_bytes(b"POST /ws-api HTTP/1.1\r\n\r\n").unwrap();
        let garbage = Request::from_bytes(b"\x00\x01\x02\r\n\r\n").unwrap();

        assert!(ws.is_websocket_upgrade());
        assert!(!http.is_websocket_upgrade());
        assert!(!post.is_websocket_upgrade());
        assert!(!garbage.is_websocket_upgrade());
    }

    #[test]
    fn test_from_bytes_incomplete() {
        assert!(Request::from_bytes(b"GET / HTTP/1.1\r\n").is_none());
    }
}
