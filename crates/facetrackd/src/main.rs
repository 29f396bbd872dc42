use anyhow::{Context, Result};
use facetrack_core::{
    AttendanceStore, CameraFileProvider, FaceDetector, NoopDetector, TrackingSupervisor,
};
use facetrack_hw::CaptureOpener;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod detector;
mod store;

use config::{Config, DetectorKind};

const BUS_NAME: &str = "org.facetrack.Tracker1";
const OBJECT_PATH: &str = "/org/facetrack/Tracker1";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("facetrackd starting");

    let config = Config::from_env();
    tracing::info!(
        cameras = %config.cameras_path.display(),
        db = %config.db_path.display(),
        detector = ?config.detector,
        sample_every = config.tracking.sample_every,
        "configuration loaded"
    );

    let store: Arc<dyn AttendanceStore> = Arc::new(
        store::SqliteStore::open(&config.db_path)
            .with_context(|| format!("failed to open {}", config.db_path.display()))?,
    );

    let detector: Arc<dyn FaceDetector> = match config.detector {
        DetectorKind::None => {
            tracing::warn!("no face detector configured; attendance will not be recorded");
            Arc::new(NoopDetector)
        }
        DetectorKind::Simulated => {
            tracing::warn!("using simulated detector; identities are random");
            Arc::new(detector::SimulatedDetector)
        }
    };

    let supervisor = Arc::new(TrackingSupervisor::new(
        Arc::new(CameraFileProvider::new(&config.cameras_path)),
        Arc::new(CaptureOpener),
        detector,
        store.clone(),
        config.tracking.clone(),
    ));

    let service = dbus_interface::TrackerService {
        supervisor: supervisor.clone(),
        store,
    };
    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, service)?
        .build()
        .await
        .context("failed to register on D-Bus")?;

    tracing::info!(bus = BUS_NAME, system = config.system_bus, "facetrackd ready");

    // SIGHUP re-reads the camera file.
    let mut hangup = signal(SignalKind::hangup())?;
    let reloader = supervisor.clone();
    tokio::spawn(async move {
        while hangup.recv().await.is_some() {
            tracing::info!("SIGHUP received; reloading cameras");
            let supervisor = reloader.clone();
            if let Err(err) = tokio::task::spawn_blocking(move || supervisor.reload()).await {
                tracing::error!(error = %err, "reload task failed");
            }
        }
    });

    let mut terminate = signal(SignalKind::terminate())?;
    let shutdown = async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    };

    supervisor.run(config.autostart, shutdown).await;
    tracing::info!("facetrackd stopped");

    Ok(())
}
