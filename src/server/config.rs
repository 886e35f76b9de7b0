//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Default listening port
pub const DEFAULT_PORT: u16 = 8098;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to
    pub bind_addr: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Body of `/` and of every unmatched path
    pub identity: String,

    /// Snapshot quality when `q` is absent or invalid
    pub snapshot_quality: u32,

    /// Snapshot scale when `s` is absent or invalid
    pub snapshot_scale: f32,

    /// Capture buffer depth for `/screen/reset` without `m`
    pub default_max_buffered: u32,

    /// Program line run by `/deviceInfo`
    pub device_info_command: String,

    /// Upstreams for the proxy routes
    pub proxy: ProxyConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            max_connections: 0, // Unlimited
            tcp_nodelay: true,  // Frames are latency sensitive
            identity: env!("CARGO_PKG_VERSION").to_string(),
            snapshot_quality: 80,
            snapshot_scale: 0.5,
            default_max_buffered: 2,
            device_info_command: "sh /data/local/tmp/device.sh deviceInfo".to_string(),
            proxy: ProxyConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new config with custom bind address
    pub fn with_addr(addr: SocketAddr) -> Self {
        Self {
            bind_addr: addr,
            ..Default::default()
        }
    }

    /// Set the bind address
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the identification string
    pub fn identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Set default snapshot quality and scale
    pub fn snapshot_defaults(mut self, quality: u32, scale: f32) -> Self {
        self.snapshot_quality = quality.min(100);
        self.snapshot_scale = scale;
        self
    }

    /// Set the `/deviceInfo` program line
    pub fn device_info_command(mut self, command: impl Into<String>) -> Self {
        self.device_info_command = command.into();
        self
    }

    /// Set proxy upstreams
    pub fn proxy(mut self, proxy: ProxyConfig) -> Self {
        self.proxy = proxy;
        self
    }
}

/// Local upstream services behind the proxy routes
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Fixed JSON-RPC endpoint, always POSTed
    pub jsonrpc_url: String,
    /// Base URL for `/agent` requests
    pub agent_base: String,
    /// Base URL for `/clash` requests
    pub clash_base: String,
    /// Whole-request timeout
    pub timeout: Duration,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            jsonrpc_url: "http://127.0.0.1:9008/jsonrpc/0".to_string(),
            agent_base: "http://127.0.0.1:9012".to_string(),
            clash_base: "http://127.0.0.1:9011".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ProxyConfig {
    pub fn jsonrpc_url(mut self, url: impl Into<String>) -> Self {
        self.jsonrpc_url = url.into();
        self
    }

    pub fn agent_base(mut self, base: impl Into<String>) -> Self {
        self.agent_base = base.into();
        self
    }

    pub fn clash_base(mut self, base: impl Into<String>) -> Self {
        self.clash_base = base.into();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
