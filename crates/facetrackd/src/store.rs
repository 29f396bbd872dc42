//! SQLite-backed attendance store.

use chrono::{DateTime, Utc};
use facetrack_core::{AttendanceEvent, AttendanceStore, EventType, StoreError};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS attendance_events (
        id          TEXT PRIMARY KEY,
        employee_id TEXT NOT NULL,
        camera_id   INTEGER NOT NULL,
        event_type  TEXT NOT NULL,
        confidence  REAL NOT NULL,
        work_status TEXT NOT NULL,
        notes       TEXT NOT NULL,
        timestamp   TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_attendance_employee_time
        ON attendance_events (employee_id, timestamp);
";

const COLUMNS: &str =
    "id, employee_id, camera_id, event_type, confidence, work_status, notes, timestamp";

/// Attendance events in a single SQLite file.
///
/// Timestamps are stored as fixed-width RFC 3339 UTC strings so text order
/// matches time order.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database, creating parent directories and the
    /// schema as needed.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Unavailable(format!("{}: {e}", parent.display()))
            })?;
        }
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {e}", path.display())))?;
        Self::with_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)
            .map_err(|e| StoreError::Unavailable(format!("schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn encode_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Row as stored, before the text columns are validated.
struct RawEvent {
    event: AttendanceEvent,
    event_type: String,
    timestamp: String,
}

fn decode_row(row: &Row<'_>) -> rusqlite::Result<RawEvent> {
    Ok(RawEvent {
        event: AttendanceEvent {
            id: row.get(0)?,
            employee_id: row.get(1)?,
            camera_id: row.get(2)?,
            event_type: EventType::Entry,
            confidence: row.get::<_, f64>(4)? as f32,
            work_status: row.get(5)?,
            notes: row.get(6)?,
            timestamp: DateTime::<Utc>::MIN_UTC,
        },
        event_type: row.get(3)?,
        timestamp: row.get(7)?,
    })
}

fn finish(raw: RawEvent) -> Result<AttendanceEvent, StoreError> {
    let RawEvent {
        mut event,
        event_type,
        timestamp,
    } = raw;
    event.event_type = EventType::parse(&event_type)
        .ok_or_else(|| StoreError::Corrupt(format!("{}: event type {event_type:?}", event.id)))?;
    event.timestamp = DateTime::parse_from_rfc3339(&timestamp)
        .map_err(|e| StoreError::Corrupt(format!("{}: timestamp {timestamp:?}: {e}", event.id)))?
        .with_timezone(&Utc);
    Ok(event)
}

fn query_err(e: rusqlite::Error) -> StoreError {
    StoreError::Query(e.to_string())
}

impl AttendanceStore for SqliteStore {
    fn latest_event(
        &self,
        employee_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AttendanceEvent>, StoreError> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM attendance_events
                     WHERE employee_id = ?1 AND timestamp >= ?2
                     ORDER BY timestamp DESC LIMIT 1"
                ),
                params![employee_id, encode_time(&since)],
                decode_row,
            )
            .optional()
            .map_err(query_err)?;
        raw.map(finish).transpose()
    }

    fn write_event(&self, event: &AttendanceEvent) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO attendance_events
                 (id, employee_id, camera_id, event_type, confidence, work_status, notes, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    event.id,
                    event.employee_id,
                    event.camera_id,
                    event.event_type.as_str(),
                    event.confidence as f64,
                    event.work_status,
                    event.notes,
                    encode_time(&event.timestamp),
                ],
            )
            .map_err(query_err)?;
        // Zero rows means the id already exists.
        Ok(inserted == 1)
    }

    fn list_events(&self, limit: usize) -> Result<Vec<AttendanceEvent>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {COLUMNS} FROM attendance_events ORDER BY timestamp DESC LIMIT ?1"
            ))
            .map_err(query_err)?;
        let rows = stmt
            .query_map(params![limit as i64], decode_row)
            .map_err(query_err)?;

        let mut events = Vec::new();
        for raw in rows {
            events.push(finish(raw.map_err(query_err)?)?);
        }
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn event(id: &str, employee: &str, at: DateTime<Utc>) -> AttendanceEvent {
        AttendanceEvent {
            id: id.into(),
            employee_id: employee.into(),
            camera_id: 2,
            event_type: EventType::Entry,
            confidence: 0.875,
            work_status: "working".into(),
            notes: "Auto-detected via camera 2".into(),
            timestamp: at,
        }
    }

    #[test]
    fn test_write_then_latest() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        assert!(store.write_event(&event("a", "EMP001", now - Duration::minutes(30))).unwrap());
        assert!(store.write_event(&event("b", "EMP001", now - Duration::minutes(10))).unwrap());

        let latest = store
            .latest_event("EMP001", now - Duration::hours(1))
            .unwrap()
            .unwrap();
        assert_eq!(latest.id, "b");
        assert_eq!(latest.camera_id, 2);
        assert_eq!(latest.event_type, EventType::Entry);
        assert_eq!(latest.notes, "Auto-detected via camera 2");
        assert!((latest.confidence - 0.875).abs() < f32::EPSILON);
    }

    #[test]
    fn test_latest_respects_since() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        store.write_event(&event("a", "EMP001", now - Duration::minutes(61))).unwrap();
        assert!(store.latest_event("EMP001", now - Duration::hours(1)).unwrap().is_none());
        assert!(store.latest_event("EMP002", now - Duration::days(1)).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_id_is_declined() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        assert!(store.write_event(&event("a", "EMP001", now)).unwrap());
        assert!(!store.write_event(&event("a", "EMP002", now)).unwrap());
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let store = SqliteStore::open_in_memory().unwrap();
        let now = Utc::now();
        for (i, id) in ["a", "b", "c"].iter().enumerate() {
            store
                .write_event(&event(id, "EMP001", now - Duration::minutes(i as i64)))
                .unwrap();
        }
        let ids: Vec<String> = store.list_events(2).unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_reopen_keeps_events() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/attendance.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.write_event(&event("a", "EMP003", Utc::now())).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.list_events(10).unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_row_is_reported() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .conn
            .lock()
            .execute(
                "INSERT INTO attendance_events VALUES ('x', 'EMP001', 1, 'lunch', 0.9, 'working', '', '2026-01-01T00:00:00.000000Z')",
                [],
            )
            .unwrap();
        assert!(matches!(store.list_events(10), Err(StoreError::Corrupt(_))));
    }
}
