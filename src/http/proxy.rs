//! Reverse proxy to local helper services
//!
//! Requests are relayed with their method and body; the upstream status,
//! content type and body come back verbatim. The reason phrase is the
//! canonical one for the status code. Any failure turns into an empty `500`
//! response.

use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Method;

use super::response::{Response, TEXT_PLAIN};
use crate::error::{Error, Result};
use crate::server::config::ProxyConfig;

/// Upstream selected by the request path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// JSON-RPC endpoint, always POSTed to a fixed URL
    JsonRpc,
    /// Agent service, request target appended to the base URL
    Agent,
    /// Proxy-manager service, request target appended to the base URL
    Clash,
}

/// HTTP client for the proxied upstreams
#[derive(Debug, Clone)]
pub struct Proxy {
    client: reqwest::Client,
    config: ProxyConfig,
}

impl Proxy {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Upstream URL and method for a request
    pub fn target(&self, upstream: Upstream, method: &str, request_target: &str) -> (String, String) {
        match upstream {
            Upstream::JsonRpc => (self.config.jsonrpc_url.clone(), "POST".to_string()),
            Upstream::Agent => (
                format!("{}{}", self.config.agent_base, request_target),
                method.to_ascii_uppercase(),
            ),
            Upstream::Clash => (
                format!("{}{}", self.config.clash_base, request_target),
                method.to_ascii_uppercase(),
            ),
        }
    }

    /// Relay a request, mapping every failure to `500`
    pub async fn relay(&self, upstream: Upstream, method: &str, request_target: &str, body: &str) -> Response {
        let (url, method) = self.target(upstream, method, request_target);
        tracing::info!(method = %method, url = %url, "Proxying request");

        match self.forward(&method, &url, body).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(url = %url, error = %e, "Proxy request failed");
                Response::internal_error()
            }
        }
    }

    async fn forward(&self, method: &str, url: &str, body: &str) -> Result<Response> {
        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| Error::InvalidMethod(method.to_string()))?;

        let mut request = self.client.request(method, url).timeout(self.config.timeout);
        if !body.is_empty() {
            request = request
                .header(ACCEPT, "application/json")
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string());
        }

        let upstream = request.send().await?;
        let status = upstream.status();
        let content_type = upstream
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(TEXT_PLAIN)
            .to_string();
        let body: Bytes = upstream.bytes().await?;

        tracing::debug!(
            status = status.as_u16(),
            content_type = %content_type,
            bytes = body.len(),
            "Upstream response"
        );

        Ok(Response::with_status(
            status.as_u16(),
            status.canonical_reason().unwrap_or(""),
            &content_type,
            body,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    fn proxy_to(base: &str) -> Proxy {
        Proxy::new(
            ProxyConfig::default()
                .jsonrpc_url(format!("{}/jsonrpc/0", base))
                .agent_base(base)
                .clash_base(base)
                .timeout(Duration::from_secs(2)),
        )
    }

    #[test]
    fn test_targets() {
        let proxy = Proxy::new(ProxyConfig::default());

        assert_eq!(
            proxy.target(Upstream::JsonRpc, "GET", "/jsonrpc/x"),
            ("http://127.0.0.1:9008/jsonrpc/0".to_string(), "POST".to_string())
        );
        assert_eq!(
            proxy.target(Upstream::Agent, "get", "/agent/status?x=1"),
            ("http://127.0.0.1:9012/agent/status?x=1".to_string(), "GET".to_string())
        );
        assert_eq!(
            proxy.target(Upstream::Clash, "PUT", "/clash/configs"),
            ("http://127.0.0.1:9011/clash/configs".to_string(), "PUT".to_string())
        );
    }

    #[tokio::test]
    async fn test_relay_upstream_response() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let upstream = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            socket
                .write_all(b"HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}")
                .await
                .unwrap();
            request
        });

        let proxy = proxy_to(&format!("http://{}", addr));
        let response = proxy.relay(Upstream::Agent, "GET", "/agent/ping", "").await;

        assert_eq!(response.status, 404);
        assert_eq!(response.reason, "Not Found");
        assert_eq!(response.content_type, "application/json");
        assert_eq!(&response.body[..], b"{}");

        let request = upstream.await.unwrap();
        assert!(request.starts_with("GET /agent/ping HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_relay_uses_canonical_reason() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            for reply in [&b"HTTP/1.1 200 Fine\r\n"[..], &b"HTTP/1.1 599 Whatever\r\n"[..]] {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut buf = vec![0u8; 4096];
                let _ = socket.read(&mut buf).await.unwrap();
                socket.write_all(reply).await.unwrap();
                socket
                    .write_all(b"Content-Length: 0\r\nConnection: close\r\n\r\n")
                    .await
                    .unwrap();
            }
        });

        let proxy = proxy_to(&format!("http://{}", addr));

        let response = proxy.relay(Upstream::Clash, "GET", "/clash/a", "").await;
        assert_eq!(response.status, 200);
        assert_eq!(response.reason, "OK");
        assert_eq!(response.content_type, TEXT_PLAIN);

        let response = proxy.relay(Upstream::Clash, "GET", "/clash/b", "").await;
        assert_eq!(response.status, 599);
        assert_eq!(response.reason, "");
    }

    #[tokio::test]
    async fn test_relay_failure_is_500() {
        // Bind then drop so the port refuses connections
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let proxy = proxy_to(&format!("http://{}", addr));
        let response = proxy.relay(Upstream::JsonRpc, "GET", "/jsonrpc", "{}").await;

        assert_eq!(response.status, 500);
        assert!(response.body.is_empty());
    }
}
