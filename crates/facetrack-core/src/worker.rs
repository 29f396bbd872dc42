//! Per-camera worker: one OS thread running capture → sample → detect → record.

use crate::detector::FaceDetector;
use crate::queue::FaceProducer;
use crate::recorder::AttendanceRecorder;
use crate::source::{CaptureError, FrameSource, FrameSourceOpener, ReleaseOnDrop};
use crate::stats::TrackingStats;
use crate::types::{CameraConfig, Frame};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("camera error: {0}")]
    Capture(#[from] CaptureError),
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),
}

/// Cooperative, level-triggered cancellation flag.
///
/// One instance is shared by every worker of a generation. Once set it stays
/// set; a new generation gets a new signal, so stragglers from an old one can
/// never be revived. Workers poll it once per loop iteration, so cancellation
/// latency is bounded by one read plus one pacing (or backoff) sleep.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why a capture loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Stopped,
    SourceLost,
}

/// Everything a worker thread needs, moved into it at spawn.
pub(crate) struct WorkerContext {
    pub camera: CameraConfig,
    pub detector: Arc<dyn FaceDetector>,
    pub recorder: Arc<AttendanceRecorder>,
    pub faces: FaceProducer,
    pub stats: Arc<TrackingStats>,
    pub stop: StopSignal,
    /// Workers of this generation whose thread is still running.
    pub live: Arc<AtomicUsize>,
    pub sample_every: u64,
    pub frame_interval: Duration,
    pub read_backoff: Duration,
}

/// Supervisor-side handle to a running worker.
pub(crate) struct WorkerHandle {
    camera_id: u32,
    thread: JoinHandle<LoopExit>,
    /// Disconnects when the worker thread has finished, source released.
    exited: Receiver<()>,
}

impl WorkerHandle {
    pub fn camera_id(&self) -> u32 {
        self.camera_id
    }

    /// Wait up to `timeout` for the worker to exit.
    ///
    /// Returns `false` if it is still running; the thread is then detached,
    /// not killed.
    pub fn join(self, timeout: Duration) -> bool {
        let camera_id = self.camera_id;
        if let Err(RecvTimeoutError::Timeout) = self.exited.recv_timeout(timeout) {
            tracing::warn!(
                camera_id,
                timeout_ms = timeout.as_millis() as u64,
                "camera worker did not exit in time; detaching"
            );
            return false;
        }
        match self.thread.join() {
            Ok(exit) => tracing::info!(camera_id, ?exit, "stopped camera worker"),
            Err(_) => tracing::error!(camera_id, "camera worker panicked"),
        }
        true
    }
}

/// Counts a worker as live from spawn until its thread finishes, however it
/// finishes.
struct LiveWorker(Arc<AtomicUsize>);

impl LiveWorker {
    fn enter(live: Arc<AtomicUsize>) -> Self {
        live.fetch_add(1, Ordering::SeqCst);
        Self(live)
    }
}

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Open the camera and start its worker thread.
///
/// The source is opened and configured on the calling thread so that a
/// camera that cannot be opened is reported to the caller instead of dying
/// quietly in the background.
pub(crate) fn spawn_worker(
    ctx: WorkerContext,
    opener: &dyn FrameSourceOpener,
) -> Result<WorkerHandle, WorkerError> {
    let camera_id = ctx.camera.camera_id;
    let mut source = opener.open(&ctx.camera)?;
    if let Err(err) = source.configure(&ctx.camera) {
        tracing::warn!(camera_id, error = %err, "could not apply capture settings; using negotiated values");
    }
    tracing::info!(
        camera_id,
        source = %ctx.camera.source,
        width = ctx.camera.resolution.width,
        height = ctx.camera.resolution.height,
        fps = ctx.camera.fps,
        "camera opened"
    );

    let source = ReleaseOnDrop::new(source);
    let (exit_tx, exit_rx) = crossbeam_channel::bounded::<()>(0);
    // Dropped with the closure if the spawn fails.
    let live = LiveWorker::enter(ctx.live.clone());

    let thread = std::thread::Builder::new()
        .name(format!("camera-{camera_id}"))
        .spawn(move || {
            // Declared first so it drops last, after the source is released.
            let _exit_tx = exit_tx;
            let _live = live;
            let mut source = source;
            tracing::info!(camera_id, "camera worker started");
            run_capture_loop(&ctx, source.source())
        })?;

    Ok(WorkerHandle {
        camera_id,
        thread,
        exited: exit_rx,
    })
}

/// Read frames until the stop signal is set or the source is gone.
///
/// Frames are handled in capture order. Only every `sample_every`-th good
/// frame reaches the detector; failed reads are not counted.
pub(crate) fn run_capture_loop(ctx: &WorkerContext, source: &mut dyn FrameSource) -> LoopExit {
    let camera_id = ctx.camera.camera_id;
    let sample_every = ctx.sample_every.max(1);
    let mut frame_count: u64 = 0;
    let mut miss_streak: u64 = 0;

    while !ctx.stop.is_set() {
        let frame = match source.read() {
            Ok(frame) => frame,
            Err(err) if !err.is_fatal() => {
                miss_streak += 1;
                if miss_streak == 1 {
                    tracing::warn!(camera_id, error = %err, "failed to read frame; retrying");
                } else {
                    tracing::trace!(camera_id, miss_streak, "still no frame");
                }
                std::thread::sleep(ctx.read_backoff);
                continue;
            }
            Err(err) => {
                tracing::error!(camera_id, error = %err, "frame source lost");
                return LoopExit::SourceLost;
            }
        };

        if miss_streak > 0 {
            tracing::info!(camera_id, missed = miss_streak, "frames resumed");
            miss_streak = 0;
        }

        frame_count += 1;
        if frame_count % sample_every == 0 {
            process_frame(ctx, &frame);
        }

        if !ctx.frame_interval.is_zero() {
            std::thread::sleep(ctx.frame_interval);
        }
    }

    LoopExit::Stopped
}

/// Detect faces in one sampled frame, publish them, and record attendance.
/// Detection errors and panics in the detector or store drop the frame and
/// nothing else.
fn process_frame(ctx: &WorkerContext, frame: &Frame) {
    let started = Instant::now();

    if panic::catch_unwind(AssertUnwindSafe(|| handle_detections(ctx, frame))).is_err() {
        tracing::error!(
            camera_id = ctx.camera.camera_id,
            sequence = frame.sequence,
            "frame processing panicked; frame dropped"
        );
    }

    ctx.stats.add_busy(started.elapsed());
}

fn handle_detections(ctx: &WorkerContext, frame: &Frame) {
    let camera_id = ctx.camera.camera_id;
    match ctx.detector.detect(frame) {
        Ok(faces) => {
            tracing::debug!(camera_id, sequence = frame.sequence, faces = faces.len(), "frame processed");
            ctx.stats.add_faces(faces.len() as u64);
            for face in faces {
                ctx.faces.offer(face.clone());
                ctx.recorder.record(&face, &ctx.camera);
            }
        }
        Err(err) => {
            tracing::warn!(camera_id, sequence = frame.sequence, error = %err, "detection failed; frame dropped");
        }
    }
}
