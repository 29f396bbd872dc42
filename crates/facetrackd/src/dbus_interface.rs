use facetrack_core::{AttendanceStore, TrackingSupervisor};
use std::sync::Arc;
use zbus::interface;

/// Largest page `ListEvents` hands out.
pub const MAX_EVENTS: u32 = 500;

/// D-Bus interface for the face tracking daemon.
///
/// Bus name: org.facetrack.Tracker1
/// Object path: /org/facetrack/Tracker1
pub struct TrackerService {
    pub supervisor: Arc<TrackingSupervisor>,
    pub store: Arc<dyn AttendanceStore>,
}

/// Run a blocking supervisor call off the D-Bus executor.
async fn blocking<T, F>(f: F) -> zbus::fdo::Result<T>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| zbus::fdo::Error::Failed(format!("task failed: {e}")))
}

fn to_json<T: serde::Serialize>(value: &T) -> zbus::fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| zbus::fdo::Error::Failed(e.to_string()))
}

#[interface(name = "org.facetrack.Tracker1")]
impl TrackerService {
    /// Start tracking. False if already running or no camera could be opened.
    async fn start(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("start requested");
        let supervisor = self.supervisor.clone();
        blocking(move || supervisor.start()).await
    }

    /// Stop tracking. False if not running.
    async fn stop(&self) -> zbus::fdo::Result<bool> {
        tracing::info!("stop requested");
        let supervisor = self.supervisor.clone();
        blocking(move || supervisor.stop()).await
    }

    /// Restart with freshly loaded camera descriptors.
    async fn reload(&self) -> zbus::fdo::Result<()> {
        tracing::info!("reload requested");
        let supervisor = self.supervisor.clone();
        blocking(move || supervisor.reload()).await
    }

    /// Current status as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        to_json(&self.supervisor.status())
    }

    /// Drain pending live faces as a JSON array.
    async fn live_faces(&self) -> zbus::fdo::Result<String> {
        to_json(&self.supervisor.live_faces())
    }

    /// Most recent attendance events as a JSON array, newest first.
    async fn list_events(&self, limit: u32) -> zbus::fdo::Result<String> {
        let limit = limit.min(MAX_EVENTS) as usize;
        let store = self.store.clone();
        let events = blocking(move || store.list_events(limit))
            .await?
            .map_err(|e| zbus::fdo::Error::Failed(e.to_string()))?;
        to_json(&events)
    }
}
