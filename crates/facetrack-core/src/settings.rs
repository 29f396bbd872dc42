use std::time::Duration;

/// Tuning knobs for the tracking pipeline. `Default` gives production values.
#[derive(Debug, Clone)]
pub struct TrackingSettings {
    /// Forward every Nth captured frame to detection.
    pub sample_every: u64,
    /// Fixed sleep between reads, independent of the source frame rate.
    pub frame_interval: Duration,
    /// Sleep after a failed read before retrying.
    pub read_backoff: Duration,
    /// How long stop waits for each worker before giving up on it.
    pub join_timeout: Duration,
    /// Capacity of the detected-face queue.
    pub queue_capacity: usize,
    /// Trailing window within which repeat detections are not recorded.
    pub dedup_window: Duration,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            sample_every: 10,
            frame_interval: Duration::from_millis(33),
            read_backoff: Duration::from_millis(100),
            join_timeout: Duration::from_secs(5),
            queue_capacity: crate::queue::DEFAULT_QUEUE_CAPACITY,
            dedup_window: Duration::from_secs(60 * 60),
        }
    }
}
