//! Attendance persistence capability.

use crate::types::AttendanceEvent;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("query failed: {0}")]
    Query(String),
    #[error("corrupt record: {0}")]
    Corrupt(String),
}

/// The two operations the tracker needs from storage, plus a listing for
/// the control surface.
pub trait AttendanceStore: Send + Sync {
    /// Most recent event for `employee_id` with a timestamp at or after `since`.
    fn latest_event(
        &self,
        employee_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AttendanceEvent>, StoreError>;

    /// Persist an event. `Ok(false)` means the store declined the write.
    fn write_event(&self, event: &AttendanceEvent) -> Result<bool, StoreError>;

    /// Up to `limit` events, newest first.
    fn list_events(&self, limit: usize) -> Result<Vec<AttendanceEvent>, StoreError>;
}

/// In-process store. Events are kept in insertion order.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<AttendanceEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl AttendanceStore for MemoryStore {
    fn latest_event(
        &self,
        employee_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AttendanceEvent>, StoreError> {
        let events = self.events.lock();
        Ok(events
            .iter()
            .filter(|e| e.employee_id == employee_id && e.timestamp >= since)
            .max_by_key(|e| e.timestamp)
            .cloned())
    }

    fn write_event(&self, event: &AttendanceEvent) -> Result<bool, StoreError> {
        self.events.lock().push(event.clone());
        Ok(true)
    }

    fn list_events(&self, limit: usize) -> Result<Vec<AttendanceEvent>, StoreError> {
        let events = self.events.lock();
        let mut out: Vec<AttendanceEvent> = events.iter().cloned().collect();
        out.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        out.truncate(limit);
        Ok(out)
    }
}
