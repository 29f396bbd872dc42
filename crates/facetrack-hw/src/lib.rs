//! facetrack-hw: frame sources for facetrack.
//!
//! V4L2 capture devices via the `v4l` crate and HTTP multipart JPEG
//! streams, both behind the `FrameSource` capability from facetrack-core.

pub mod camera;
pub mod frame;
pub mod mjpeg;
pub mod opener;

pub use camera::{DeviceCamera, DeviceInfo, PixelFormat};
pub use mjpeg::{MjpegError, MjpegStream, PartReader};
pub use opener::CaptureOpener;
