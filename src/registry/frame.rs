//! Captured frames and the snapshot wire record
//!
//! A [`Frame`] is produced by the capture collaborator. The server keeps
//! only the most recent one in a [`FrameSlot`]; there are no per-subscriber
//! queues, so slow subscribers skip frames instead of falling behind.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::RwLock;

/// One captured screen image
///
/// Cheap to clone: `data` is reference counted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Opaque image buffer, interpreted only by the capture collaborator
    pub data: Bytes,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Capture time in milliseconds since the Unix epoch
    pub captured_at_millis: u64,
}

impl Frame {
    /// Create a frame stamped with the current time
    pub fn new(data: Bytes, width: u32, height: u32) -> Self {
        Self {
            data,
            width,
            height,
            captured_at_millis: now_millis(),
        }
    }

    /// Whether the frame carries any image data
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Single current-frame slot
///
/// Each new frame replaces the previous one atomically; readers see either
/// the old or the new frame, never a mix.
#[derive(Debug, Default)]
pub struct FrameSlot {
    current: RwLock<Option<Frame>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current frame
    pub async fn store(&self, frame: Frame) {
        *self.current.write().await = Some(frame);
    }

    /// The most recent frame, if any
    pub async fn current(&self) -> Option<Frame> {
        self.current.read().await.clone()
    }

    /// Forget the current frame
    pub async fn clear(&self) {
        *self.current.write().await = None;
    }
}

/// Build the length-prefixed snapshot record
///
/// ```text
/// [i32 len][image bytes][i32 width][i32 height][i32 quality]
/// [i32 scale*100][i32 epoch seconds][i32 millis of second]
/// ```
///
/// All integers are big-endian. Width and height are those of the source
/// frame, not the scaled image.
pub fn snapshot_record(image: &[u8], frame: &Frame, quality: u32, scale: f32) -> Bytes {
    snapshot_record_at(image, frame, quality, scale, now_millis())
}

pub(crate) fn snapshot_record_at(
    image: &[u8],
    frame: &Frame,
    quality: u32,
    scale: f32,
    timestamp_millis: u64,
) -> Bytes {
    let mut buf = BytesMut::with_capacity(4 + image.len() + 24);

    buf.put_i32(image.len() as i32);
    buf.put_slice(image);
    buf.put_i32(frame.width as i32);
    buf.put_i32(frame.height as i32);
    buf.put_i32(quality as i32);
    buf.put_i32((scale * 100.0) as i32);
    buf.put_i32((timestamp_millis / 1000) as i32);
    buf.put_i32((timestamp_millis % 1000) as i32);

    buf.freeze()
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use bytes::Buf;

    use super::*;

    #[test]
    fn test_snapshot_record_layout() {
        let frame = Frame {
            data: Bytes::from_static(b"raw"),
            width: 1080,
            height: 2400,
            captured_at_millis: 0,
        };

        let mut record = snapshot_record_at(b"JPEG", &frame, 80, 0.5, 1_700_000_000_123);

        assert_eq!(record.len(), 4 + 4 + 6 * 4);
        assert_eq!(record.get_i32(), 4);
        assert_eq!(&record.split_to(4)[..], b"JPEG");
        assert_eq!(record.get_i32(), 1080);
        assert_eq!(record.get_i32(), 2400);
        assert_eq!(record.get_i32(), 80);
        assert_eq!(record.get_i32(), 50);
        assert_eq!(record.get_i32(), 1_700_000_000);
        assert_eq!(record.get_i32(), 123);
        assert!(record.is_empty());
    }

    #[tokio::test]
    async fn test_frame_slot_overwrites() {
        let slot = FrameSlot::new();
        assert!(slot.current().await.is_none());

        slot.store(Frame::new(Bytes::from_static(b"one"), 1, 1)).await;
        slot.store(Frame::new(Bytes::from_static(b"two"), 2, 2)).await;

        let current = slot.current().await.unwrap();
        assert_eq!(&current.data[..], b"two");
        assert_eq!(current.width, 2);

        slot.clear().await;
        assert!(slot.current().await.is_none());
    }

    #[test]
    fn test_frame_new_stamps_time() {
        let frame = Frame::new(Bytes::new(), 0, 0);
        assert!(frame.captured_at_millis > 0);
        assert!(frame.is_empty());
    }
}
