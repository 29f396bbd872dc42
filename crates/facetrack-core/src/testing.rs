//! Scripted capability fakes shared by the unit tests.

use crate::detector::{DetectorError, FaceDetector};
use crate::source::{CaptureError, FrameSource, FrameSourceOpener};
use crate::store::{AttendanceStore, StoreError};
use crate::types::{
    AttendanceEvent, BoundingBox, CameraConfig, DetectedFace, EventType, Frame, PixelLayout,
    Resolution, StreamSource,
};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn camera(id: u32) -> CameraConfig {
    CameraConfig {
        camera_id: id,
        source: StreamSource::Device(id),
        resolution: Resolution { width: 64, height: 48 },
        fps: 30,
    }
}

pub fn gray_frame(sequence: u32) -> Frame {
    Frame {
        data: vec![128; 64 * 48],
        width: 64,
        height: 48,
        layout: PixelLayout::Gray8,
        sequence,
        captured_at: Utc::now(),
    }
}

pub fn face(employee_id: &str) -> DetectedFace {
    face_at(employee_id, Utc::now())
}

pub fn face_at(employee_id: &str, timestamp: DateTime<Utc>) -> DetectedFace {
    DetectedFace {
        employee_id: employee_id.to_string(),
        confidence: 0.9,
        bbox: BoundingBox { x: 100, y: 100, width: 200, height: 200 },
        timestamp,
    }
}

pub fn event_at(employee_id: &str, timestamp: DateTime<Utc>) -> AttendanceEvent {
    AttendanceEvent {
        id: uuid::Uuid::new_v4().to_string(),
        employee_id: employee_id.to_string(),
        camera_id: 1,
        event_type: EventType::Entry,
        confidence: 0.9,
        work_status: "working".into(),
        notes: String::new(),
        timestamp,
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Step {
    Frame,
    Miss,
}

/// Frame source that plays a script of reads, then either disconnects or
/// keeps producing frames forever.
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    endless: bool,
    sequence: u32,
    released: Arc<AtomicBool>,
    configured: Arc<AtomicBool>,
}

impl ScriptedSource {
    pub fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: steps.into(),
            endless: false,
            sequence: 0,
            released: Arc::new(AtomicBool::new(false)),
            configured: Arc::new(AtomicBool::new(false)),
        }
    }

    /// `count` good frames, then a disconnect.
    pub fn frames(count: usize) -> Self {
        Self::new(vec![Step::Frame; count])
    }

    pub fn endless() -> Self {
        Self {
            endless: true,
            ..Self::new(Vec::new())
        }
    }

    pub fn released_flag(&self) -> Arc<AtomicBool> {
        self.released.clone()
    }

    pub fn configured_flag(&self) -> Arc<AtomicBool> {
        self.configured.clone()
    }
}

impl FrameSource for ScriptedSource {
    fn configure(&mut self, _camera: &CameraConfig) -> Result<(), CaptureError> {
        self.configured.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn read(&mut self) -> Result<Frame, CaptureError> {
        let step = match self.steps.pop_front() {
            Some(step) => step,
            None if self.endless => Step::Frame,
            None => return Err(CaptureError::Disconnected("script exhausted".into())),
        };
        match step {
            Step::Frame => {
                self.sequence += 1;
                Ok(gray_frame(self.sequence))
            }
            Step::Miss => Err(CaptureError::NoFrame("scripted miss".into())),
        }
    }

    fn release(&mut self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

/// Opens a [`ScriptedSource`] per camera, failing for chosen ids. Sources
/// are endless unless a frame budget is set.
#[derive(Default)]
pub struct ScriptedOpener {
    failing: HashSet<u32>,
    frames: Option<usize>,
    opened: AtomicUsize,
    released: Mutex<Vec<Arc<AtomicBool>>>,
}

impl ScriptedOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(ids: &[u32]) -> Self {
        Self {
            failing: ids.iter().copied().collect(),
            ..Self::default()
        }
    }

    /// Every source disconnects after `frames` good frames.
    pub fn disconnecting(frames: usize) -> Self {
        Self {
            frames: Some(frames),
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Whether every source opened so far has been released.
    pub fn all_released(&self) -> bool {
        self.released
            .lock()
            .iter()
            .all(|flag| flag.load(Ordering::SeqCst))
    }
}

impl FrameSourceOpener for ScriptedOpener {
    fn open(&self, camera: &CameraConfig) -> Result<Box<dyn FrameSource>, CaptureError> {
        if self.failing.contains(&camera.camera_id) {
            return Err(CaptureError::DeviceNotFound(camera.source.to_string()));
        }
        let source = match self.frames {
            Some(count) => ScriptedSource::frames(count),
            None => ScriptedSource::endless(),
        };
        self.released.lock().push(source.released_flag());
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(source))
    }
}

/// Detector that reports the same identities on every call.
#[derive(Default)]
pub struct ScriptedDetector {
    identities: Vec<String>,
    fail: bool,
    panic_first: bool,
    calls: AtomicUsize,
}

impl ScriptedDetector {
    pub fn reporting(identities: &[&str]) -> Self {
        Self {
            identities: identities.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Panics on the first call, then reports `identities`.
    pub fn panicking_once(identities: &[&str]) -> Self {
        Self {
            panic_first: true,
            ..Self::reporting(identities)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FaceDetector for ScriptedDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, DetectorError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.panic_first && call == 0 {
            panic!("scripted detector panic");
        }
        if self.fail {
            return Err(DetectorError::InferenceFailed("scripted failure".into()));
        }
        Ok(self.identities.iter().map(|id| face(id)).collect())
    }
}

/// Store whose operations fail in a chosen way.
pub struct FailingStore {
    lookup_fails: bool,
    write_fails: bool,
}

impl FailingStore {
    pub fn on_lookup() -> Self {
        Self { lookup_fails: true, write_fails: false }
    }

    pub fn on_write() -> Self {
        Self { lookup_fails: false, write_fails: true }
    }

    /// Lookups succeed, writes return `Ok(false)`.
    pub fn rejecting() -> Self {
        Self { lookup_fails: false, write_fails: false }
    }
}

impl AttendanceStore for FailingStore {
    fn latest_event(
        &self,
        _employee_id: &str,
        _since: DateTime<Utc>,
    ) -> Result<Option<AttendanceEvent>, StoreError> {
        if self.lookup_fails {
            return Err(StoreError::Unavailable("scripted lookup failure".into()));
        }
        Ok(None)
    }

    fn write_event(&self, _event: &AttendanceEvent) -> Result<bool, StoreError> {
        if self.write_fails {
            return Err(StoreError::Query("scripted write failure".into()));
        }
        Ok(false)
    }

    fn list_events(&self, _limit: usize) -> Result<Vec<AttendanceEvent>, StoreError> {
        Ok(Vec::new())
    }
}
