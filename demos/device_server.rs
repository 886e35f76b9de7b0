//! Device server demo with a synthetic screen
//!
//! Run with: cargo run --example device_server -- [OPTIONS]
//!
//! Examples:
//!   cargo run --example device_server                      # binds to 0.0.0.0:8098
//!   cargo run --example device_server -- --bind 127.0.0.1:9000
//!   RELAY_FPS=30 cargo run --example device_server
//!
//! ## Try it
//!
//!   curl http://localhost:8098/screen/size
//!   curl -o frame.bin http://localhost:8098/screenImg.jpeg
//!   curl -N http://localhost:8098/stream.avc | xxd | head
//!   curl -d '0|1|66|1|0' http://localhost:8098/controller
//!
//! The mock capture "encodes" frames by prefixing the quality and scale, so
//! responses are readable without an image viewer.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use clap::Parser;

use screen_relay::device::mock::{MockCapture, MockController};
use screen_relay::device::AppInfo;
use screen_relay::{Capture, DeviceServer, Frame, ServerConfig};

#[derive(Debug, Parser)]
#[command(
    name = "device_server",
    about = "Screen streaming and remote control demo server",
    version
)]
struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "0.0.0.0:8098", env = "RELAY_BIND")]
    bind: SocketAddr,

    /// Maximum concurrent connections (0 = unlimited)
    #[arg(long, default_value_t = 0, env = "RELAY_MAX_CONNECTIONS")]
    max_connections: usize,

    /// Synthetic frames per second
    #[arg(long, default_value_t = 5, env = "RELAY_FPS")]
    fps: u32,

    /// Body of the identification route
    #[arg(long, env = "RELAY_IDENTITY")]
    identity: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("screen_relay=debug".parse()?)
                .add_directive("device_server=debug".parse()?),
        )
        .init();

    let mut config = ServerConfig::default()
        .bind(cli.bind)
        .max_connections(cli.max_connections);
    if let Some(identity) = cli.identity {
        config = config.identity(identity);
    }

    let capture = Arc::new(MockCapture::new());
    let controller = Arc::new(MockController::with_apps(vec![
        AppInfo::new("com.android.settings", "Settings", true),
        AppInfo::new("org.example.notes", "Notes", false),
    ]));
    let server = Arc::new(DeviceServer::new(config, capture.clone(), controller));

    println!("Starting device server on {}", server.bind_addr());

    // Synthetic capture loop
    let publisher = {
        let server = Arc::clone(&server);
        let capture = Arc::clone(&capture);
        let period = Duration::from_millis(1000 / u64::from(cli.fps.max(1)));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut sequence: u64 = 0;
            loop {
                ticker.tick().await;
                sequence += 1;

                let (width, height) = capture.screen_size().unwrap_or((0, 0));
                let pixels = Bytes::from(format!("frame-{}", sequence));
                let served = server
                    .publish_frame(Frame::new(pixels.clone(), width, height))
                    .await;
                server.publish_video(&pixels).await;
                server.broadcast(&pixels).await;

                if sequence % 50 == 0 {
                    let stats = server.registry().stats().await;
                    tracing::info!(
                        sequence = sequence,
                        snapshot_served = served,
                        websocket = stats.websocket_clients,
                        snapshot = stats.snapshot_subscribers,
                        stream = stats.stream_subscribers,
                        "Publisher stats"
                    );
                }
            }
        })
    };

    let result = server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
            println!("\nShutting down...");
        })
        .await;

    publisher.abort();
    if let Err(e) = result {
        eprintln!("Server error: {}", e);
    }

    Ok(())
}
