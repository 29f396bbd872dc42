//! facetrack-core: multi-camera face tracking and attendance recording.
//!
//! One worker thread per camera samples frames, runs them through a
//! pluggable detector, publishes faces to a bounded drop-on-full queue, and
//! records deduplicated attendance events through a pluggable store.

pub mod detector;
pub mod provider;
pub mod queue;
pub mod recorder;
pub mod settings;
pub mod source;
pub mod stats;
pub mod store;
pub mod supervisor;
pub mod types;
pub mod worker;

#[cfg(test)]
mod testing;

pub use detector::{DetectorError, FaceDetector, NoopDetector};
pub use provider::{
    parse_cameras, CameraFileProvider, CameraProvider, ProviderError, StaticCameras,
};
pub use queue::{FaceProducer, FaceQueue};
pub use recorder::{AttendanceRecorder, RecordOutcome};
pub use settings::TrackingSettings;
pub use source::{CaptureError, FrameSource, FrameSourceOpener};
pub use store::{AttendanceStore, MemoryStore, StoreError};
pub use supervisor::TrackingSupervisor;
pub use types::{
    AttendanceEvent, BoundingBox, CameraConfig, DetectedFace, EventType, Frame, LiveFace,
    PixelLayout, Resolution, StreamSource, SystemStatus,
};
pub use worker::{StopSignal, WorkerError};
