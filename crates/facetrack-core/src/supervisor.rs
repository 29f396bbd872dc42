//! Tracking supervisor: owns the camera workers of the current generation.

use crate::detector::FaceDetector;
use crate::provider::CameraProvider;
use crate::queue::FaceQueue;
use crate::recorder::AttendanceRecorder;
use crate::settings::TrackingSettings;
use crate::source::FrameSourceOpener;
use crate::stats::{load_fraction, TrackingStats};
use crate::store::AttendanceStore;
use crate::types::{CameraConfig, LiveFace, SystemStatus};
use crate::worker::{spawn_worker, StopSignal, WorkerContext, WorkerHandle};
use parking_lot::{Mutex, RwLock};
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::RuntimeFlavor;

/// One set of workers sharing one stop signal.
struct Generation {
    stop: StopSignal,
    workers: Vec<WorkerHandle>,
    /// Workers of this generation whose thread has not finished.
    live: Arc<AtomicUsize>,
}

/// Published lifecycle state. Written as a whole so readers never see a
/// half-applied transition.
#[derive(Debug, Default, Clone)]
struct Lifecycle {
    running: bool,
    started_at: Option<Instant>,
    live: Option<Arc<AtomicUsize>>,
}

impl Lifecycle {
    fn running(generation: &Generation) -> Self {
        Self {
            running: true,
            started_at: Some(Instant::now()),
            live: Some(generation.live.clone()),
        }
    }

    /// Workers still capturing; a camera whose source was lost drops out.
    fn active_cameras(&self) -> usize {
        self.live
            .as_ref()
            .map_or(0, |live| live.load(Ordering::SeqCst))
    }
}

/// Runs one worker per camera and exposes start/stop/reload/status.
///
/// `start`, `stop` and `reload` are serialised by a single lock, so at most
/// one generation exists at any time. `status` and `live_faces` never take
/// that lock and stay responsive while a stop is waiting on workers.
///
/// All control methods block (stop waits up to the join timeout per worker);
/// call them from a blocking context.
pub struct TrackingSupervisor {
    cameras: Arc<dyn CameraProvider>,
    opener: Arc<dyn FrameSourceOpener>,
    detector: Arc<dyn FaceDetector>,
    recorder: Arc<AttendanceRecorder>,
    stats: Arc<TrackingStats>,
    queue: FaceQueue,
    settings: TrackingSettings,
    control: Mutex<Option<Generation>>,
    lifecycle: RwLock<Lifecycle>,
}

impl TrackingSupervisor {
    pub fn new(
        cameras: Arc<dyn CameraProvider>,
        opener: Arc<dyn FrameSourceOpener>,
        detector: Arc<dyn FaceDetector>,
        store: Arc<dyn AttendanceStore>,
        settings: TrackingSettings,
    ) -> Self {
        let stats = Arc::new(TrackingStats::new());
        let recorder = AttendanceRecorder::new(store, stats.clone(), settings.dedup_window);
        Self {
            cameras,
            opener,
            detector,
            recorder: Arc::new(recorder),
            stats,
            queue: FaceQueue::new(settings.queue_capacity),
            settings,
            control: Mutex::new(None),
            lifecycle: RwLock::new(Lifecycle::default()),
        }
    }

    /// Fetch cameras and start a worker for each.
    ///
    /// Returns `false` without side effects if already running, if no
    /// cameras are configured, or if none of them could be opened. Cameras
    /// that fail to open are logged and left out.
    pub fn start(&self) -> bool {
        let mut control = self.control.lock();
        if control.is_some() {
            tracing::warn!("face tracking is already running");
            return false;
        }

        let cameras = self.fetch_cameras();
        if cameras.is_empty() {
            return false;
        }

        tracing::info!(cameras = cameras.len(), "starting face tracking");
        self.stats.reset_busy();
        let generation = self.launch(cameras);
        if generation.workers.is_empty() {
            generation.stop.set();
            tracing::error!("no camera could be opened; face tracking not started");
            return false;
        }

        let active = generation.workers.len();
        *self.lifecycle.write() = Lifecycle::running(&generation);
        *control = Some(generation);
        tracing::info!(active_cameras = active, "face tracking started");
        true
    }

    /// Signal every worker to stop and wait for each, up to the join timeout.
    ///
    /// Returns `false` if not running.
    pub fn stop(&self) -> bool {
        let mut control = self.control.lock();
        let Some(generation) = control.take() else {
            tracing::warn!("face tracking is not running");
            return false;
        };

        tracing::info!("stopping face tracking");
        generation.stop.set();
        self.lifecycle.write().running = false;
        self.shutdown(generation);
        *self.lifecycle.write() = Lifecycle::default();
        tracing::info!("face tracking stopped");
        true
    }

    /// Replace the running workers with a fresh set built from newly
    /// fetched descriptors. Does nothing when not running; the next start
    /// picks up the new descriptors anyway.
    pub fn reload(&self) {
        let mut control = self.control.lock();
        let Some(generation) = control.take() else {
            tracing::info!("face tracking not running; cameras will be loaded on next start");
            return;
        };

        tracing::info!("reloading camera configurations");
        self.shutdown(generation);

        // Uptime and load describe the new generation only.
        self.stats.reset_busy();
        let generation = self.launch(self.fetch_cameras());
        let active = generation.workers.len();
        if active == 0 {
            tracing::warn!("reload left no active cameras; tracking stays up and idle");
        }
        *self.lifecycle.write() = Lifecycle::running(&generation);
        *control = Some(generation);
        tracing::info!(active_cameras = active, "reloaded camera configurations");
    }

    /// Current counters. Never blocks on control operations.
    pub fn status(&self) -> SystemStatus {
        let lifecycle = self.lifecycle.read().clone();
        let elapsed = match (lifecycle.running, lifecycle.started_at) {
            (true, Some(started)) => started.elapsed(),
            _ => Default::default(),
        };
        let active = lifecycle.active_cameras();
        SystemStatus {
            is_running: lifecycle.running,
            uptime: elapsed.as_secs_f64(),
            cam_count: active,
            faces_detected: self.stats.faces_detected(),
            attendance_count: self.stats.attendance_recorded(),
            load: load_fraction(self.stats.busy(), elapsed, active),
        }
    }

    /// Drain the detected-face queue. Each face is handed out once.
    pub fn live_faces(&self) -> Vec<LiveFace> {
        self.queue.drain().into_iter().map(LiveFace::from).collect()
    }

    pub fn is_running(&self) -> bool {
        self.lifecycle.read().running
    }

    pub fn stats(&self) -> &TrackingStats {
        &self.stats
    }

    /// Start tracking (when `autostart`), wait for `shutdown`, then stop.
    ///
    /// Teardown also runs if this future is dropped before completion, so a
    /// host that cancels the task still gets its cameras released. In that
    /// case the stop happens synchronously inside the drop, through
    /// `block_in_place` on a multi-threaded runtime.
    pub async fn run<F>(self: Arc<Self>, autostart: bool, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut guard = StopOnDrop(Some(self.clone()));

        if autostart {
            let supervisor = self.clone();
            match tokio::task::spawn_blocking(move || supervisor.start()).await {
                Ok(true) => {}
                Ok(false) => tracing::warn!("face tracking did not start; waiting for control requests"),
                Err(err) => tracing::error!(error = %err, "start task failed"),
            }
        }

        shutdown.await;
        tracing::info!("shutdown requested");

        if let Some(supervisor) = guard.0.take() {
            match tokio::task::spawn_blocking(move || supervisor.stop()).await {
                Ok(_) => {}
                Err(err) => tracing::error!(error = %err, "stop task failed"),
            }
        }
    }

    fn fetch_cameras(&self) -> Vec<CameraConfig> {
        match self.cameras.list_active() {
            Ok(cameras) if cameras.is_empty() => {
                tracing::warn!("no active cameras configured");
                cameras
            }
            Ok(cameras) => cameras,
            Err(err) => {
                tracing::error!(error = %err, "failed to load camera configurations");
                Vec::new()
            }
        }
    }

    fn launch(&self, cameras: Vec<CameraConfig>) -> Generation {
        let stop = StopSignal::new();
        let live = Arc::new(AtomicUsize::new(0));
        let mut workers = Vec::with_capacity(cameras.len());

        for camera in cameras {
            let camera_id = camera.camera_id;
            let ctx = WorkerContext {
                camera,
                detector: self.detector.clone(),
                recorder: self.recorder.clone(),
                faces: self.queue.producer(),
                stats: self.stats.clone(),
                stop: stop.clone(),
                live: live.clone(),
                sample_every: self.settings.sample_every,
                frame_interval: self.settings.frame_interval,
                read_backoff: self.settings.read_backoff,
            };
            match spawn_worker(ctx, self.opener.as_ref()) {
                Ok(handle) => workers.push(handle),
                Err(err) => {
                    tracing::error!(camera_id, error = %err, "failed to start camera worker");
                }
            }
        }

        Generation {
            stop,
            workers,
            live,
        }
    }

    fn shutdown(&self, generation: Generation) {
        generation.stop.set();
        let total = generation.workers.len();
        let mut detached = Vec::new();
        for worker in generation.workers {
            let camera_id = worker.camera_id();
            if !worker.join(self.settings.join_timeout) {
                detached.push(camera_id);
            }
        }
        if !detached.is_empty() {
            tracing::warn!(?detached, total, "camera workers still running after stop");
        }
    }
}

struct StopOnDrop(Option<Arc<TrackingSupervisor>>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        let Some(supervisor) = self.0.take() else {
            return;
        };
        tracing::info!("tracking task cancelled; stopping");
        // On a multi-threaded runtime, hand this worker's other tasks off
        // while the joins block. A current-thread runtime has nowhere to
        // hand them, so it blocks.
        let multi_thread = tokio::runtime::Handle::try_current()
            .map(|handle| handle.runtime_flavor() == RuntimeFlavor::MultiThread)
            .unwrap_or(false);
        if multi_thread {
            tokio::task::block_in_place(|| supervisor.stop());
        } else {
            tracing::debug!("stopping on the current thread");
            supervisor.stop();
        }
    }
}
