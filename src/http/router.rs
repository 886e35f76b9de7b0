//! HTTP routing
//!
//! Routes are path prefixes tested in a fixed order; the first match wins
//! and unmatched paths get the identification string with `200`.
//! `HEAD` and `OPTIONS` are answered before routing.
//!
//! One-shot routes produce a complete [`Response`]. The two long-poll routes
//! ([`Route::SnapshotPoll`] and [`Route::VideoStream`]) are handed back to
//! the connection task, which registers the subscription and parks.

use std::sync::Arc;

use super::proxy::{Proxy, Upstream};
use super::response::{Response, APPLICATION_JSON, IMAGE_JPEG, TEXT_PLAIN};
use super::shell;
use crate::control;
use crate::device::{encode_blocking, format_app_list, Capture, Controller, InjectOutcome};
use crate::protocol::Request;
use crate::registry::{snapshot_record, FrameSlot};
use crate::server::config::ServerConfig;

/// Named handlers, in match order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Root,
    Proxy(Upstream),
    AppList,
    ScreenReset,
    ScreenSize,
    DeviceInfo,
    ShellExec,
    ShellBackend,
    SnapshotPoll,
    Snapshot,
    VideoStream,
    Controller,
    Fallback,
}

const PREFIXES: &[(&str, Route)] = &[
    ("/jsonrpc", Route::Proxy(Upstream::JsonRpc)),
    ("/agent", Route::Proxy(Upstream::Agent)),
    ("/clash", Route::Proxy(Upstream::Clash)),
    ("/apps/list", Route::AppList),
    ("/screen/reset", Route::ScreenReset),
    ("/screen/size", Route::ScreenSize),
    ("/deviceInfo", Route::DeviceInfo),
    ("/shell/exec", Route::ShellExec),
    ("/shell/cmd", Route::ShellExec),
    ("/shell/backend", Route::ShellBackend),
    ("/screen.jpeg", Route::SnapshotPoll),
    ("/screenImg.jpeg", Route::Snapshot),
    ("/stream.avc", Route::VideoStream),
    ("/controller", Route::Controller),
];

impl Route {
    /// Resolve a request target (path plus optional query)
    pub fn resolve(target: &str) -> Route {
        if target == "/" {
            return Route::Root;
        }
        PREFIXES
            .iter()
            .find(|(prefix, _)| target.starts_with(prefix))
            .map_or(Route::Fallback, |(_, route)| *route)
    }
}

/// What the connection task should do with a request
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Write the response and close
    Respond(Response),
    /// Register a snapshot subscription and wait
    SnapshotPoll { quality: u32, scale: f32 },
    /// Register a stream subscription and wait
    VideoStream,
}

/// Dispatches plain HTTP requests to their handlers
pub struct Router {
    config: ServerConfig,
    capture: Arc<dyn Capture>,
    controller: Arc<dyn Controller>,
    frames: Arc<FrameSlot>,
    proxy: Proxy,
}

impl Router {
    pub fn new(
        config: ServerConfig,
        capture: Arc<dyn Capture>,
        controller: Arc<dyn Controller>,
        frames: Arc<FrameSlot>,
    ) -> Self {
        let proxy = Proxy::new(config.proxy.clone());
        Self {
            config,
            capture,
            controller,
            frames,
            proxy,
        }
    }

    /// Handle one request
    pub async fn handle(&self, request: &Request) -> Outcome {
        let method = request.method();
        let target = request.target();
        tracing::debug!(
            method = %method,
            path = %target,
            host = request.header("Host").unwrap_or_default(),
            "HTTP request"
        );

        if method == "HEAD" || method == "OPTIONS" {
            return Outcome::Respond(Response::empty(TEXT_PLAIN));
        }

        let route = Route::resolve(target);
        let body = request.body_text();
        let body = body.trim();

        let response = match route {
            Route::Root | Route::Fallback => Response::text(self.config.identity.clone()),
            Route::Proxy(upstream) => self.proxy.relay(upstream, method, target, body).await,
            Route::AppList => {
                let apps = self.controller.list_apps();
                Response::text(format_app_list("List of apps:", &apps))
            }
            Route::ScreenReset => self.screen_reset(request),
            Route::ScreenSize => self.screen_size(),
            Route::DeviceInfo => {
                Response::text(shell::run_program(&self.config.device_info_command).await)
            }
            Route::ShellExec => Response::text(shell::exec(body).await),
            Route::ShellBackend => {
                shell::spawn_background(body.to_string());
                Response::text("OK")
            }
            Route::SnapshotPoll => {
                let (quality, scale) = self.snapshot_params(request);
                return Outcome::SnapshotPoll { quality, scale };
            }
            Route::Snapshot => self.snapshot(request).await,
            Route::VideoStream => return Outcome::VideoStream,
            Route::Controller => self.control(body),
        };

        Outcome::Respond(response)
    }

    /// Quality and scale query parameters, with configured defaults
    pub fn snapshot_params(&self, request: &Request) -> (u32, f32) {
        let quality = request
            .query("q")
            .and_then(|q| q.trim().parse().ok())
            .unwrap_or(self.config.snapshot_quality);
        let scale = request
            .query("s")
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(self.config.snapshot_scale);
        (quality, scale)
    }

    fn screen_reset(&self, request: &Request) -> Response {
        let max_buffered = request
            .query("m")
            .and_then(|m| m.trim().parse().ok())
            .unwrap_or(self.config.default_max_buffered);

        match self.capture.configure(max_buffered) {
            Ok(()) => {
                tracing::info!(max_buffered = max_buffered, "Capture reconfigured");
                Response::empty(TEXT_PLAIN)
            }
            Err(e) => {
                tracing::error!(error = %e, "Capture reconfigure failed");
                Response::internal_error()
            }
        }
    }

    fn screen_size(&self) -> Response {
        let (width, height) = self.capture.screen_size().unwrap_or((0, 0));
        let body = serde_json::json!({ "size": format!("{}/{}", width, height) });
        Response::ok(APPLICATION_JSON, body.to_string())
    }

    async fn snapshot(&self, request: &Request) -> Response {
        let Some(frame) = self.frames.current().await.filter(|f| !f.is_empty()) else {
            return Response::empty(IMAGE_JPEG);
        };

        let (quality, scale) = self.snapshot_params(request);
        match encode_blocking(&self.capture, &frame, quality, scale).await {
            Ok(image) => Response::ok(IMAGE_JPEG, snapshot_record(&image, &frame, quality, scale)),
            Err(e) => {
                tracing::warn!(error = %e, "Snapshot encode failed");
                Response::empty(IMAGE_JPEG)
            }
        }
    }

    fn control(&self, body: &str) -> Response {
        let command = match control::decode(body) {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(error = %e, "Rejected control command");
                return Response::bad_request(e.to_string());
            }
        };

        let kind = command.command_type();
        match self.controller.inject(command) {
            Ok(InjectOutcome::Done) => Response::text("OK"),
            Ok(InjectOutcome::Reply(data)) => Response::ok(TEXT_PLAIN, data),
            Ok(InjectOutcome::Unsupported) => Response::with_status(
                501,
                "Not Implemented",
                TEXT_PLAIN,
                format!("unsupported command: {}", kind),
            ),
            Err(e) => {
                tracing::error!(command = %kind, error = %e, "Injection failed");
                Response::internal_error()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use super::*;
    use crate::device::mock::{MockCapture, MockController};
    use crate::device::AppInfo;
    use crate::registry::Frame;

    struct Fixture {
        router: Router,
        capture: Arc<MockCapture>,
        controller: Arc<MockController>,
        frames: Arc<FrameSlot>,
    }

    fn fixture() -> Fixture {
        let capture = Arc::new(MockCapture::new());
        let controller = Arc::new(MockController::with_apps(vec![
            AppInfo::new("com.android.settings", "Settings", true),
            AppInfo::new("org.example.notes", "Notes", false),
        ]));
        let frames = Arc::new(FrameSlot::new());
        let router = Router::new(
            ServerConfig::default().identity("relay-test"),
            capture.clone(),
            controller.clone(),
            Arc::clone(&frames),
        );
        Fixture {
            router,
            capture,
            controller,
            frames,
        }
    }

    fn request(raw: &str) -> Request {
        Request::from_bytes(raw.as_bytes()).unwrap()
    }

    fn get(target: &str) -> Request {
        request(&format!("GET {} HTTP/1.1\r\nHost: device\r\n\r\n", target))
    }

    fn post(target: &str, body: &str) -> Request {
        request(&format!(
            "POST {} HTTP/1.1\r\nContent-Length: {}\r\n\r\n{}",
            target,
            body.len(),
            body
        ))
    }

    async fn respond(f: &Fixture, request: Request) -> Response {
        match f.router.handle(&request).await {
            Outcome::Respond(response) => response,
            other => panic!("expected a response, got {:?}", other),
        }
    }

    #[test]
    fn test_route_order() {
        assert_eq!(Route::resolve("/"), Route::Root);
        assert_eq!(Route::resolve("/jsonrpc/0"), Route::Proxy(Upstream::JsonRpc));
        assert_eq!(Route::resolve("/agent/x"), Route::Proxy(Upstream::Agent));
        assert_eq!(Route::resolve("/clash"), Route::Proxy(Upstream::Clash));
        assert_eq!(Route::resolve("/screen/reset?m=3"), Route::ScreenReset);
        assert_eq!(Route::resolve("/shell/cmd"), Route::ShellExec);
        assert_eq!(Route::resolve("/screen.jpeg?q=50"), Route::SnapshotPoll);
        assert_eq!(Route::resolve("/screenImg.jpeg"), Route::Snapshot);
        assert_eq!(Route::resolve("/stream.avc"), Route::VideoStream);
        assert_eq!(Route::resolve("/controller"), Route::Controller);
        assert_eq!(Route::resolve("/nope"), Route::Fallback);
        assert_eq!(Route::resolve(""), Route::Fallback);
    }

    #[tokio::test]
    async fn test_default_route_is_identity() {
        let f = fixture();

        let response = respond(&f, get("/does/not/exist")).await;
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"relay-test");

        let response = respond(&f, get("/")).await;
        assert_eq!(response.status, 200);
        assert_eq!(&response.body[..], b"relay-test");
    }

    #[tokio::test]
    async fn test_head_and_options_fast_path() {
        let f = fixture();

        for method in ["HEAD", "OPTIONS"] {
            let raw = format!("{} /stream.avc HTTP/1.1\r\n\r\n", method);
            let response = respond(&f, request(&raw)).await;
            assert_eq!(response.status, 200);
            assert!(response.body.is_empty());
        }
        assert!(f.capture.streaming_calls().is_empty());
    }

    #[tokio::test]
    async fn test_app_list() {
        let f = fixture();
        let response = respond(&f, get("/apps/list")).await;

        assert_eq!(
            std::str::from_utf8(&response.body).unwrap(),
            "List of apps:\n    Settings - com.android.settings\n *  Notes - org.example.notes"
        );
    }

    #[tokio::test]
    async fn test_screen_reset() {
        let f = fixture();

        respond(&f, get("/screen/reset?m=4")).await;
        respond(&f, get("/screen/reset")).await;
        respond(&f, get("/screen/reset?m=bogus")).await;

        assert_eq!(f.capture.configure_calls(), vec![4, 2, 2]);
    }

    #[tokio::test]
    async fn test_screen_size() {
        let f = fixture();

        let response = respond(&f, get("/screen/size")).await;
        assert_eq!(response.content_type, APPLICATION_JSON);
        assert_eq!(&response.body[..], br#"{"size":"1080/2400"}"#);

        f.capture.set_size(None);
        let response = respond(&f, get("/screen/size")).await;
        assert_eq!(&response.body[..], br#"{"size":"0/0"}"#);
    }

    #[tokio::test]
    async fn test_snapshot_without_frame_is_empty() {
        let f = fixture();
        let response = respond(&f, get("/screenImg.jpeg")).await;

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, IMAGE_JPEG);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_record() {
        let f = fixture();
        f.frames
            .store(Frame::new(Bytes::from_static(b"px"), 8, 6))
            .await;

        let response = respond(&f, get("/screenImg.jpeg?q=40&s=0.25")).await;
        let image = b"q40s25:px";
        assert_eq!(response.body.len(), 4 + image.len() + 24);
        assert_eq!(&response.body[..4], &(image.len() as i32).to_be_bytes());
        assert_eq!(&response.body[4..4 + image.len()], image);
    }

    #[tokio::test]
    async fn test_snapshot_encode_failure_is_empty() {
        let f = fixture();
        f.frames
            .store(Frame::new(Bytes::from_static(b"px"), 8, 6))
            .await;
        f.capture
            .fail_encode
            .store(true, std::sync::atomic::Ordering::Relaxed);

        let response = respond(&f, get("/screenImg.jpeg")).await;
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
    }

    #[tokio::test]
    async fn test_long_poll_outcomes() {
        let f = fixture();

        assert_eq!(
            f.router.handle(&get("/screen.jpeg?q=30&s=1.0")).await,
            Outcome::SnapshotPoll {
                quality: 30,
                scale: 1.0
            }
        );
        assert_eq!(
            f.router.handle(&get("/screen.jpeg?q=x")).await,
            Outcome::SnapshotPoll {
                quality: 80,
                scale: 0.5
            }
        );
        assert_eq!(f.router.handle(&get("/stream.avc")).await, Outcome::VideoStream);
    }

    #[tokio::test]
    async fn test_controller_route() {
        let f = fixture();

        let response = respond(&f, post("/controller", "0|1|66|1|0")).await;
        assert_eq!(response.status, 200);
        assert_eq!(f.controller.injected().len(), 1);

        let response = respond(&f, post("/controller", "0|1|66")).await;
        assert_eq!(response.status, 400);
        assert_eq!(f.controller.injected().len(), 1);

        respond(&f, post("/controller", "6|1|false|a|b")).await;
        let response = respond(&f, post("/controller", "5|0")).await;
        assert_eq!(&response.body[..], b"a|b");

        let response = respond(&f, post("/controller", "16|3")).await;
        assert_eq!(response.status, 501);
    }

    #[tokio::test]
    async fn test_shell_routes() {
        let f = fixture();

        let response = respond(&f, post("/shell/exec", "echo hi")).await;
        assert_eq!(&response.body[..], b"hi");

        let response = respond(&f, post("/shell/backend", "true")).await;
        assert_eq!(&response.body[..], b"OK");
    }
}
