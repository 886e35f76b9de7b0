//! In-memory device collaborators
//!
//! [`MockCapture`] and [`MockController`] perform no platform calls. They
//! record what the server asked of them so tests can assert on it, and they
//! let the demo server run on a machine without a screen to capture.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;

use crate::control::ControlCommand;
use crate::error::{Error, Result};
use crate::registry::Frame;

use super::{AppInfo, Capture, Controller, InjectOutcome};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Capture stand-in
///
/// `encode` returns the frame data prefixed with `q<quality>s<scale*100>:`
/// so tests can tell which parameters were used.
#[derive(Debug)]
pub struct MockCapture {
    /// Screen size reported by `screen_size`
    pub size: Mutex<Option<(u32, u32)>>,
    /// Every `configure` call
    pub configured: Mutex<Vec<u32>>,
    /// Every `set_streaming` call, in order
    pub streaming: Mutex<Vec<bool>>,
    /// Header returned by `stream_header`
    pub header: Bytes,
    /// Make `encode` fail
    pub fail_encode: AtomicBool,
    /// Number of `encode` calls
    pub encodes: AtomicUsize,
    /// Time each `encode` call blocks its thread
    pub encode_delay: Mutex<Duration>,
}

impl MockCapture {
    pub fn new() -> Self {
        Self {
            size: Mutex::new(Some((1080, 2400))),
            configured: Mutex::new(Vec::new()),
            streaming: Mutex::new(Vec::new()),
            header: Bytes::from_static(b"AVCHDR"),
            fail_encode: AtomicBool::new(false),
            encodes: AtomicUsize::new(0),
            encode_delay: Mutex::new(Duration::ZERO),
        }
    }

    /// Recorded activation gate transitions
    pub fn streaming_calls(&self) -> Vec<bool> {
        lock(&self.streaming).clone()
    }

    /// Recorded buffer reconfigurations
    pub fn configure_calls(&self) -> Vec<u32> {
        lock(&self.configured).clone()
    }

    pub fn set_size(&self, size: Option<(u32, u32)>) {
        *lock(&self.size) = size;
    }

    pub fn set_encode_delay(&self, delay: Duration) {
        *lock(&self.encode_delay) = delay;
    }

    pub fn encode_count(&self) -> usize {
        self.encodes.load(Ordering::Relaxed)
    }
}

impl Default for MockCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl Capture for MockCapture {
    fn configure(&self, max_buffered: u32) -> Result<()> {
        lock(&self.configured).push(max_buffered);
        Ok(())
    }

    fn screen_size(&self) -> Option<(u32, u32)> {
        *lock(&self.size)
    }

    fn encode(&self, frame: &Frame, quality: u32, scale: f32) -> Result<Bytes> {
        self.encodes.fetch_add(1, Ordering::Relaxed);
        let delay = *lock(&self.encode_delay);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        if self.fail_encode.load(Ordering::Relaxed) {
            return Err(Error::Capture("mock encoder failure".into()));
        }
        let mut out = format!("q{}s{}:", quality, (scale * 100.0) as u32).into_bytes();
        out.extend_from_slice(&frame.data);
        Ok(Bytes::from(out))
    }

    fn stream_header(&self) -> Bytes {
        self.header.clone()
    }

    fn set_streaming(&self, active: bool) {
        lock(&self.streaming).push(active);
    }
}

/// Controller stand-in
///
/// Keeps a clipboard so `SetClipboard`/`GetClipboard` behave like a device;
/// UHID commands report [`InjectOutcome::Unsupported`].
#[derive(Debug, Default)]
pub struct MockController {
    /// Every injected command, in order
    pub injected: Mutex<Vec<ControlCommand>>,
    /// Apps returned by `list_apps`
    pub apps: Vec<AppInfo>,
    clipboard: Mutex<String>,
}

impl MockController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_apps(apps: Vec<AppInfo>) -> Self {
        Self {
            apps,
            ..Self::default()
        }
    }

    /// Recorded commands
    pub fn injected(&self) -> Vec<ControlCommand> {
        lock(&self.injected).clone()
    }
}

impl Controller for MockController {
    fn inject(&self, command: ControlCommand) -> Result<InjectOutcome> {
        let outcome = match &command {
            ControlCommand::SetClipboard { text, .. } => {
                *lock(&self.clipboard) = text.clone();
                InjectOutcome::Done
            }
            ControlCommand::GetClipboard { .. } => {
                InjectOutcome::Reply(Bytes::from(lock(&self.clipboard).clone()))
            }
            ControlCommand::UhidCreate { .. }
            | ControlCommand::UhidInput { .. }
            | ControlCommand::UhidDestroy { .. } => InjectOutcome::Unsupported,
            _ => InjectOutcome::Done,
        };
        lock(&self.injected).push(command);
        Ok(outcome)
    }

    fn list_apps(&self) -> Vec<AppInfo> {
        self.apps.clone()
    }
}
