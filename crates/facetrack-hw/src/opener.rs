//! Chooses a frame source implementation from a camera descriptor.

use crate::camera::DeviceCamera;
use crate::mjpeg::MjpegStream;
use facetrack_core::{CameraConfig, CaptureError, FrameSource, FrameSourceOpener, StreamSource};

/// Opens V4L2 devices for device indices and `/dev/...` paths, and HTTP
/// multipart streams for `http(s)://` URLs.
#[derive(Debug, Default, Clone, Copy)]
pub struct CaptureOpener;

impl FrameSourceOpener for CaptureOpener {
    fn open(&self, camera: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        match &camera.source {
            StreamSource::Device(index) => {
                Ok(Box::new(DeviceCamera::open(&format!("/dev/video{index}"))?))
            }
            StreamSource::Url(path) if path.starts_with("/dev/") => {
                Ok(Box::new(DeviceCamera::open(path)?))
            }
            StreamSource::Url(url) if url.starts_with("http://") || url.starts_with("https://") => {
                Ok(Box::new(MjpegStream::connect(url)?))
            }
            StreamSource::Url(url) => Err(CaptureError::Unsupported(format!(
                "{url}: only device indices, /dev paths and http(s) multipart streams are supported"
            ))),
        }
    }
}
