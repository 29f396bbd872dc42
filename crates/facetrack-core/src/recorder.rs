//! Attendance recording with a rolling per-identity dedup window.

use crate::stats::TrackingStats;
use crate::store::AttendanceStore;
use crate::types::{AttendanceEvent, CameraConfig, DetectedFace, EventType};
use std::sync::Arc;
use std::time::Duration;

/// Work status stamped on automatically recorded entries.
pub const AUTO_WORK_STATUS: &str = "working";

/// What [`AttendanceRecorder::record`] did with a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// An event for this identity already exists inside the window.
    Suppressed,
    /// The store declined the write.
    Rejected,
    /// The store returned an error; the detection is dropped.
    Failed,
}

/// Turns detections into attendance events, at most one per identity per
/// window.
///
/// The window trails the detection timestamp and is measured from the last
/// recorded event, not from a clock boundary.
///
/// Known limitation: the lookup and the write are separate store calls.
/// Two cameras seeing the same person at the same instant can both pass the
/// lookup and both write. Suppression is advisory.
pub struct AttendanceRecorder {
    store: Arc<dyn AttendanceStore>,
    stats: Arc<TrackingStats>,
    window: chrono::Duration,
}

impl AttendanceRecorder {
    pub fn new(
        store: Arc<dyn AttendanceStore>,
        stats: Arc<TrackingStats>,
        window: Duration,
    ) -> Self {
        let window = chrono::Duration::from_std(window).unwrap_or(chrono::Duration::MAX);
        Self {
            store,
            stats,
            window,
        }
    }

    /// Record `face` as seen by `camera`, unless suppressed by the window.
    ///
    /// Store errors are logged and swallowed; a failed write is not retried.
    pub fn record(&self, face: &DetectedFace, camera: &CameraConfig) -> RecordOutcome {
        let since = face
            .timestamp
            .checked_sub_signed(self.window)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC);

        match self.store.latest_event(&face.employee_id, since) {
            Ok(Some(previous)) => {
                tracing::debug!(
                    employee_id = %face.employee_id,
                    previous = %previous.timestamp,
                    "attendance already recorded inside window"
                );
                return RecordOutcome::Suppressed;
            }
            Ok(None) => {}
            Err(err) => {
                tracing::error!(
                    employee_id = %face.employee_id,
                    error = %err,
                    "attendance lookup failed"
                );
                return RecordOutcome::Failed;
            }
        }

        let event = AttendanceEvent {
            id: uuid::Uuid::new_v4().to_string(),
            employee_id: face.employee_id.clone(),
            camera_id: camera.camera_id,
            event_type: EventType::Entry,
            confidence: face.confidence,
            work_status: AUTO_WORK_STATUS.to_string(),
            notes: format!("Auto-detected via camera {}", camera.camera_id),
            timestamp: face.timestamp,
        };

        match self.store.write_event(&event) {
            Ok(true) => {
                self.stats.add_attendance();
                tracing::info!(
                    employee_id = %face.employee_id,
                    camera_id = camera.camera_id,
                    confidence = format_args!("{:.3}", face.confidence),
                    "recorded attendance"
                );
                RecordOutcome::Recorded
            }
            Ok(false) => {
                tracing::warn!(employee_id = %face.employee_id, "store rejected attendance event");
                RecordOutcome::Rejected
            }
            Err(err) => {
                tracing::error!(
                    employee_id = %face.employee_id,
                    error = %err,
                    "failed to write attendance event"
                );
                RecordOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::testing::{camera, face_at, FailingStore};
    use chrono::{Duration as ChronoDuration, Utc};

    const HOUR: Duration = Duration::from_secs(3600);

    fn recorder(store: Arc<dyn AttendanceStore>) -> (AttendanceRecorder, Arc<TrackingStats>) {
        let stats = Arc::new(TrackingStats::new());
        (AttendanceRecorder::new(store, stats.clone(), HOUR), stats)
    }

    #[test]
    fn test_repeat_within_window_is_suppressed() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, stats) = recorder(store.clone());
        let cam = camera(1);
        let t0 = Utc::now();

        let first = recorder.record(&face_at("EMP001", t0), &cam);
        let second = recorder.record(&face_at("EMP001", t0 + ChronoDuration::minutes(5)), &cam);

        assert_eq!(first, RecordOutcome::Recorded);
        assert_eq!(second, RecordOutcome::Suppressed);
        assert_eq!(store.len(), 1);
        assert_eq!(stats.attendance_recorded(), 1);
    }

    #[test]
    fn test_repeat_after_window_is_recorded() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, stats) = recorder(store.clone());
        let cam = camera(1);
        let t0 = Utc::now();

        recorder.record(&face_at("EMP001", t0), &cam);
        let later = recorder.record(&face_at("EMP001", t0 + ChronoDuration::minutes(61)), &cam);

        assert_eq!(later, RecordOutcome::Recorded);
        assert_eq!(store.len(), 2);
        assert_eq!(stats.attendance_recorded(), 2);
    }

    #[test]
    fn test_window_rolls_from_last_recorded_event() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _) = recorder(store.clone());
        let cam = camera(1);
        let t0 = Utc::now();

        recorder.record(&face_at("EMP001", t0), &cam);
        // Suppressed detections do not extend the window.
        recorder.record(&face_at("EMP001", t0 + ChronoDuration::minutes(50)), &cam);
        let outcome = recorder.record(&face_at("EMP001", t0 + ChronoDuration::minutes(70)), &cam);

        assert_eq!(outcome, RecordOutcome::Recorded);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_identities_are_independent() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _) = recorder(store.clone());
        let cam = camera(1);
        let t0 = Utc::now();

        recorder.record(&face_at("EMP001", t0), &cam);
        let other = recorder.record(&face_at("EMP002", t0), &cam);

        assert_eq!(other, RecordOutcome::Recorded);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_event_fields() {
        let store = Arc::new(MemoryStore::new());
        let (recorder, _) = recorder(store.clone());
        let t0 = Utc::now();

        recorder.record(&face_at("EMP003", t0), &camera(7));

        let events = store.list_events(10).unwrap();
        let event = &events[0];
        assert_eq!(event.employee_id, "EMP003");
        assert_eq!(event.camera_id, 7);
        assert_eq!(event.event_type, EventType::Entry);
        assert_eq!(event.work_status, "working");
        assert_eq!(event.notes, "Auto-detected via camera 7");
        assert_eq!(event.timestamp, t0);
        assert!(!event.id.is_empty());
    }

    #[test]
    fn test_store_errors_are_swallowed() {
        let (recorder, stats) = recorder(Arc::new(FailingStore::on_lookup()));
        let outcome = recorder.record(&face_at("EMP001", Utc::now()), &camera(1));
        assert_eq!(outcome, RecordOutcome::Failed);
        assert_eq!(stats.attendance_recorded(), 0);

        let (recorder, stats) = recorder_with_write_error();
        let outcome = recorder.record(&face_at("EMP001", Utc::now()), &camera(1));
        assert_eq!(outcome, RecordOutcome::Failed);
        assert_eq!(stats.attendance_recorded(), 0);
    }

    #[test]
    fn test_rejected_write_does_not_count() {
        let (recorder, stats) = recorder(Arc::new(FailingStore::rejecting()));
        let outcome = recorder.record(&face_at("EMP001", Utc::now()), &camera(1));
        assert_eq!(outcome, RecordOutcome::Rejected);
        assert_eq!(stats.attendance_recorded(), 0);
    }

    fn recorder_with_write_error() -> (AttendanceRecorder, Arc<TrackingStats>) {
        recorder(Arc::new(FailingStore::on_write()))
    }
}
