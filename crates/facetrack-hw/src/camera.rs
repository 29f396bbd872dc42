//! V4L2 camera capture via the `v4l` crate.

use crate::frame;
use chrono::Utc;
use facetrack_core::{CameraConfig, CaptureError, Frame, FrameSource, PixelLayout};
use std::path::Path;
use std::time::Duration;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::capture::Parameters;
use v4l::video::Capture;
use v4l::FourCC;

/// `ENODEV`: the device went away (unplugged, driver unbound).
const ENODEV: i32 = 19;

const STREAM_BUFFERS: u32 = 4;
/// Longest wait for a buffer. A device that stalls without going away then
/// reports a transient miss and the worker gets back to its stop signal.
pub const DEQUEUE_TIMEOUT: Duration = Duration::from_secs(2);
const DEFAULT_WIDTH: u32 = 640;
const DEFAULT_HEIGHT: u32 = 480;

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel, extract Y channel).
    Yuyv,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

/// V4L2 capture device producing grayscale frames.
///
/// The mmap stream is created on the first read, after `configure` has had a
/// chance to renegotiate the format.
pub struct DeviceCamera {
    device: Device,
    stream: Option<MmapStream<'static>>,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
}

impl DeviceCamera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0").
    pub fn open(device_path: &str) -> Result<Self, CaptureError> {
        if !Path::new(device_path).exists() {
            return Err(CaptureError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CaptureError::OpenFailed(format!("{device_path}: device busy"))
            } else {
                CaptureError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device.query_caps().map_err(|e| {
            CaptureError::OpenFailed(format!("failed to query capabilities: {e}"))
        })?;

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened capture device"
        );

        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CaptureError::Unsupported(format!(
                "{device_path}: not a video capture device"
            )));
        }

        let mut camera = Self {
            device,
            stream: None,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            device_path: device_path.to_string(),
            fourcc: FourCC::new(b"YUYV"),
            pixel_format: PixelFormat::Yuyv,
        };
        camera.negotiate(DEFAULT_WIDTH, DEFAULT_HEIGHT)?;
        Ok(camera)
    }

    /// Request YUYV at the given size; accept GREY or Y16 if the driver
    /// insists on them.
    fn negotiate(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        let mut fmt = self.device.format().map_err(|e| {
            CaptureError::OpenFailed(format!("failed to get format: {e}"))
        })?;

        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = width;
        fmt.height = height;

        let negotiated = self.device.set_format(&fmt).map_err(|e| {
            CaptureError::OpenFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        self.pixel_format = if fourcc == FourCC::new(b"GREY") {
            PixelFormat::Grey
        } else if fourcc == FourCC::new(b"YUYV") {
            PixelFormat::Yuyv
        } else if fourcc == FourCC::new(b"Y16 ") || fourcc == FourCC::new(b"Y16\0") {
            PixelFormat::Y16
        } else {
            return Err(CaptureError::Unsupported(format!(
                "pixel format {fourcc:?} (need YUYV, GREY, or Y16)"
            )));
        };
        self.fourcc = fourcc;
        self.width = negotiated.width;
        self.height = negotiated.height;

        tracing::debug!(
            device = %self.device_path,
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );
        Ok(())
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        let mut devices = Vec::new();

        for i in 0..16 {
            let path = format!("/dev/video{i}");
            if !Path::new(&path).exists() {
                continue;
            }
            let Ok(dev) = Device::with_path(&path) else {
                continue;
            };
            let Ok(caps) = dev.query_caps() else {
                continue;
            };
            if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
                continue;
            }
            devices.push(DeviceInfo {
                path,
                name: caps.card.clone(),
                driver: caps.driver.clone(),
                bus: caps.bus.clone(),
            });
        }

        devices
    }
}

impl FrameSource for DeviceCamera {
    fn configure(&mut self, camera: &CameraConfig) -> Result<(), CaptureError> {
        // Formats cannot change while buffers are mapped.
        self.stream = None;

        let wanted = camera.resolution;
        self.negotiate(wanted.width, wanted.height)?;
        if (self.width, self.height) != (wanted.width, wanted.height) {
            tracing::warn!(
                device = %self.device_path,
                requested = ?(wanted.width, wanted.height),
                negotiated = ?(self.width, self.height),
                "driver adjusted resolution"
            );
        }

        let params = self
            .device
            .set_params(&Parameters::with_fps(camera.fps))
            .map_err(|e| CaptureError::OpenFailed(format!("failed to set frame rate: {e}")))?;
        let interval = params.interval;
        if interval.numerator > 0 && interval.denominator / interval.numerator != camera.fps {
            tracing::warn!(
                device = %self.device_path,
                requested = camera.fps,
                negotiated = interval.denominator / interval.numerator,
                "driver adjusted frame rate"
            );
        }
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        if self.stream.is_none() {
            let mut stream =
                MmapStream::with_buffers(&self.device, BufType::VideoCapture, STREAM_BUFFERS)
                    .map_err(|e| classify(e, "failed to create mmap stream"))?;
            stream.set_timeout(DEQUEUE_TIMEOUT);
            self.stream = Some(stream);
        }
        let Some(stream) = self.stream.as_mut() else {
            return Err(CaptureError::Disconnected("stream released".into()));
        };

        let (buf, meta) = stream
            .next()
            .map_err(|e| classify(e, "failed to dequeue buffer"))?;

        let gray = match self.pixel_format {
            PixelFormat::Grey => frame::grey_to_grayscale(buf, self.width, self.height),
            PixelFormat::Y16 => frame::y16_to_grayscale(buf, self.width, self.height),
            PixelFormat::Yuyv => frame::yuyv_to_grayscale(buf, self.width, self.height),
        }
        .map_err(|e| CaptureError::NoFrame(e.to_string()))?;

        Ok(Frame {
            data: gray,
            width: self.width,
            height: self.height,
            layout: PixelLayout::Gray8,
            sequence: meta.sequence,
            captured_at: Utc::now(),
        })
    }

    fn release(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(device = %self.device_path, "released capture stream");
        }
    }
}

/// A vanished device is fatal; anything else is worth another try.
fn classify(err: std::io::Error, context: &str) -> CaptureError {
    if err.raw_os_error() == Some(ENODEV) {
        CaptureError::Disconnected(format!("{context}: {err}"))
    } else {
        CaptureError::NoFrame(format!("{context}: {err}"))
    }
}
