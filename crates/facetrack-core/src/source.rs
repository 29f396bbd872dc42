//! Frame source capability: open a camera, read frames, release it.

use crate::types::{CameraConfig, Frame};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to open source: {0}")]
    OpenFailed(String),
    #[error("unsupported source: {0}")]
    Unsupported(String),
    #[error("no frame available: {0}")]
    NoFrame(String),
    #[error("source disconnected: {0}")]
    Disconnected(String),
}

impl CaptureError {
    /// Whether the source is gone for good. Everything else on the read path
    /// is retried after a backoff.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, CaptureError::NoFrame(_))
    }
}

/// An open capture handle for one camera.
///
/// Implementations must make [`release`](FrameSource::release) idempotent.
pub trait FrameSource: Send {
    /// Apply the descriptor's resolution and frame rate. Best effort: a
    /// source that cannot honour a setting keeps what it negotiated.
    fn configure(&mut self, camera: &CameraConfig) -> Result<(), CaptureError>;

    /// Read the next frame.
    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Release the underlying device or connection.
    fn release(&mut self);
}

/// Opens frame sources from camera descriptors.
pub trait FrameSourceOpener: Send + Sync {
    fn open(&self, camera: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError>;
}

/// Owns an open source and releases it when dropped, including on unwind.
pub struct ReleaseOnDrop(Box<dyn FrameSource>);

impl ReleaseOnDrop {
    pub fn new(source: Box<dyn FrameSource>) -> Self {
        Self(source)
    }

    pub fn source(&mut self) -> &mut dyn FrameSource {
        self.0.as_mut()
    }
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        self.0.release();
    }
}
