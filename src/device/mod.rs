//! Device collaborators
//!
//! The server never touches platform capture, encoding or input APIs
//! directly. The host application supplies them through two traits:
//!
//! - [`Capture`]: screen capture configuration, snapshot encoding, the raw
//!   video stream header and the streaming activation gate.
//! - [`Controller`]: input injection and installed-app listing.
//!
//! Frames flow the other way: the capture side pushes each new frame into
//! [`DeviceServer::publish_frame`](crate::DeviceServer::publish_frame) and
//! encoded video into
//! [`DeviceServer::publish_video`](crate::DeviceServer::publish_video).

pub mod mock;

use std::sync::Arc;

use bytes::Bytes;

use crate::control::ControlCommand;
use crate::error::{Error, Result};
use crate::registry::Frame;

/// Screen capture and image encoding
pub trait Capture: Send + Sync + 'static {
    /// Reconfigure the capture buffer depth
    fn configure(&self, max_buffered: u32) -> Result<()>;

    /// Current capture size in pixels, if known
    fn screen_size(&self) -> Option<(u32, u32)>;

    /// Encode a frame as a still image at `quality` (0-100), scaled by `scale`
    fn encode(&self, frame: &Frame, quality: u32, scale: f32) -> Result<Bytes>;

    /// Header blob written before the raw video stream
    fn stream_header(&self) -> Bytes;

    /// Start or stop the video encoder
    ///
    /// Called with `true` when the first stream subscriber arrives and with
    /// `false` when the last one leaves.
    fn set_streaming(&self, active: bool);
}

/// Run [`Capture::encode`] on the blocking thread pool
///
/// Encoders are CPU-bound and must not run on the runtime's worker threads.
/// A panicking encoder is reported as a capture error.
pub async fn encode_blocking(
    capture: &Arc<dyn Capture>,
    frame: &Frame,
    quality: u32,
    scale: f32,
) -> Result<Bytes> {
    let capture = Arc::clone(capture);
    let frame = frame.clone();
    tokio::task::spawn_blocking(move || capture.encode(&frame, quality, scale))
        .await
        .map_err(|e| Error::Capture(format!("encoder task failed: {}", e)))?
}

/// Result of injecting a control command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InjectOutcome {
    /// Command executed, nothing to send back
    Done,
    /// Command produced data for the issuing client (e.g. clipboard text)
    Reply(Bytes),
    /// Command is recognised but not supported by this device
    Unsupported,
}

/// An installed application
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppInfo {
    pub package_name: String,
    pub label: String,
    pub system: bool,
}

impl AppInfo {
    pub fn new(package_name: impl Into<String>, label: impl Into<String>, system: bool) -> Self {
        Self {
            package_name: package_name.into(),
            label: label.into(),
            system,
        }
    }
}

/// Input injection and app inventory
pub trait Controller: Send + Sync + 'static {
    /// Execute a decoded control command
    fn inject(&self, command: ControlCommand) -> Result<InjectOutcome>;

    /// Installed applications
    fn list_apps(&self) -> Vec<AppInfo>;
}

/// Render the app list as plain text
///
/// User apps are marked with `*`, system apps are only indented.
pub fn format_app_list(title: &str, apps: &[AppInfo]) -> String {
    let mut out = String::from(title);
    for app in apps {
        let marker = if app.system { "    " } else { " *  " };
        out.push('\n');
        out.push_str(marker);
        out.push_str(&app.label);
        out.push_str(" - ");
        out.push_str(&app.package_name);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_app_list() {
        let apps = vec![
            AppInfo::new("com.android.settings", "Settings", true),
            AppInfo::new("org.example.notes", "Notes", false),
        ];

        assert_eq!(
            format_app_list("List of apps:", &apps),
            "List of apps:\n    Settings - com.android.settings\n *  Notes - org.example.notes"
        );
        assert_eq!(format_app_list("List of apps:", &[]), "List of apps:");
    }
}
