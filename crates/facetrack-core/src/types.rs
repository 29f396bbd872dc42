use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a camera's frames come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamSource {
    /// Network stream URL (e.g. an MJPEG endpoint) or a device path.
    Url(String),
    /// Local capture device index (`/dev/videoN`).
    Device(u32),
}

impl fmt::Display for StreamSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamSource::Url(url) => f.write_str(url),
            StreamSource::Device(index) => write!(f, "/dev/video{index}"),
        }
    }
}

/// Requested capture resolution in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

/// Camera descriptor. Immutable for the lifetime of the worker that owns it;
/// a reload fetches a fresh set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub camera_id: u32,
    pub source: StreamSource,
    pub resolution: Resolution,
    /// Target frame rate requested from the source.
    pub fps: u32,
}

/// Memory layout of [`Frame::data`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    /// 8-bit grayscale, `width * height` bytes.
    Gray8,
    /// One encoded JPEG image, as framed by the transport. Not decoded.
    Jpeg,
}

/// A single captured frame.
#[derive(Clone)]
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub sequence: u32,
    pub captured_at: DateTime<Utc>,
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("bytes", &self.data.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("layout", &self.layout)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Face bounding region in frame pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// A recognized face reported by the detection capability for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedFace {
    /// Stable identity of the recognized person (employee id).
    pub employee_id: String,
    /// Recognition confidence in [0, 1].
    pub confidence: f32,
    pub bbox: BoundingBox,
    pub timestamp: DateTime<Utc>,
}

/// Kind of attendance event. Only entries are produced automatically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Entry,
    Exit,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Entry => "entry",
            EventType::Exit => "exit",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "entry" => Some(EventType::Entry),
            "exit" => Some(EventType::Exit),
            _ => None,
        }
    }
}

/// A persisted attendance record. Never mutated once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceEvent {
    pub id: String,
    pub employee_id: String,
    pub camera_id: u32,
    pub event_type: EventType,
    pub confidence: f32,
    pub work_status: String,
    pub notes: String,
    pub timestamp: DateTime<Utc>,
}

/// Point-in-time view of the tracking system, computed on demand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    pub is_running: bool,
    /// Seconds since the current generation started; 0 when stopped.
    pub uptime: f64,
    pub cam_count: usize,
    pub faces_detected: u64,
    pub attendance_count: u64,
    /// Fraction of worker wall time spent in detection and recording.
    pub load: f64,
}

/// Display record handed out by the live face feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveFace {
    pub employee_id: String,
    pub confidence: f32,
    /// `[x, y, width, height]`
    pub bbox: [i64; 4],
    /// RFC 3339 / ISO 8601 detection time.
    pub timestamp: String,
}

impl From<DetectedFace> for LiveFace {
    fn from(face: DetectedFace) -> Self {
        Self {
            employee_id: face.employee_id,
            confidence: face.confidence,
            bbox: [
                face.bbox.x as i64,
                face.bbox.y as i64,
                face.bbox.width as i64,
                face.bbox.height as i64,
            ],
            timestamp: face.timestamp.to_rfc3339(),
        }
    }
}
