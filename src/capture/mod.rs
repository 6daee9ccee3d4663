/// Camera capture module
///
/// This module handles:
/// - Acquiring a live camera stream (ffmpeg.rs)
/// - Snapshotting a frame onto the raster surface and encoding it (frame.rs)
///
/// The panel only talks to the `CameraSource`/`CameraStream` traits, so the
/// state machine can be exercised without a real device.
use async_trait::async_trait;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::info;

use crate::error::Result;

pub mod ffmpeg;
pub mod frame;

pub use ffmpeg::FfmpegCamera;
pub use frame::{Frame, FrameCapture, PngDataUriEncoder, RasterSurface};

/// Something that can open a live video stream
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Open the camera and resolve once the first frame is available
    async fn open(&self) -> Result<Box<dyn CameraStream>>;
}

/// A running video stream
pub trait CameraStream: Send + Sync {
    /// Most recent frame, if any has arrived
    fn latest_frame(&self) -> Option<Frame>;

    /// Stop the stream and release the device
    fn stop(&self);
}

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Shared owner of one camera stream
///
/// Clones share the same stream. `release()` stops it exactly once no matter
/// how many clones call it; the last clone dropping also releases it.
#[derive(Clone)]
pub struct StreamHandle {
    inner: Arc<StreamInner>,
}

struct StreamInner {
    id: u64,
    stream: Box<dyn CameraStream>,
    released: AtomicBool,
}

impl StreamHandle {
    pub fn new(stream: Box<dyn CameraStream>) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed),
                stream,
                released: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Latest frame; always None after release
    pub fn latest_frame(&self) -> Option<Frame> {
        if self.is_released() {
            return None;
        }
        self.inner.stream.latest_frame()
    }

    /// Stop the underlying stream (idempotent)
    pub fn release(&self) {
        if !self.inner.released.swap(true, Ordering::SeqCst) {
            self.inner.stream.stop();
            info!("📷 Released camera stream #{}", self.inner.id);
        }
    }

    pub fn is_released(&self) -> bool {
        self.inner.released.load(Ordering::SeqCst)
    }
}

impl Drop for StreamInner {
    fn drop(&mut self) {
        if !*self.released.get_mut() {
            self.stream.stop();
            info!("📷 Released camera stream #{} on drop", self.id);
        }
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("id", &self.inner.id)
            .field("released", &self.is_released())
            .finish()
    }
}
