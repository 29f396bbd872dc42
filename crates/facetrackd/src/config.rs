use facetrack_core::TrackingSettings;
use std::path::PathBuf;
use std::time::Duration;

/// Which detection capability the daemon plugs into the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    /// Report nothing. Tracking runs, but no attendance is recorded.
    None,
    /// Random placeholder identities, for demos.
    Simulated,
}

/// Daemon configuration, loaded from environment variables.
pub struct Config {
    /// TOML file listing the cameras to track.
    pub cameras_path: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    pub detector: DetectorKind,
    /// Start tracking as soon as the daemon is up.
    pub autostart: bool,
    /// Serve on the system bus instead of the session bus.
    pub system_bus: bool,
    pub tracking: TrackingSettings,
}

impl Config {
    /// Load configuration from `FACETRACK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());

        let config_dir = std::env::var("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(&home).join(".config"))
            .join("facetrack");

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(&home).join(".local/share"))
            .join("facetrack");

        let defaults = TrackingSettings::default();

        Self {
            cameras_path: std::env::var("FACETRACK_CAMERAS_FILE")
                .map(PathBuf::from)
                .unwrap_or_else(|_| config_dir.join("cameras.toml")),
            db_path: std::env::var("FACETRACK_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("attendance.db")),
            detector: parse_detector(std::env::var("FACETRACK_DETECTOR").ok().as_deref()),
            autostart: env_flag("FACETRACK_AUTOSTART", true),
            system_bus: env_flag("FACETRACK_SYSTEM_BUS", false),
            tracking: TrackingSettings {
                sample_every: env_u64("FACETRACK_SAMPLE_EVERY", defaults.sample_every).max(1),
                frame_interval: Duration::from_millis(env_u64(
                    "FACETRACK_FRAME_INTERVAL_MS",
                    defaults.frame_interval.as_millis() as u64,
                )),
                read_backoff: Duration::from_millis(env_u64(
                    "FACETRACK_READ_BACKOFF_MS",
                    defaults.read_backoff.as_millis() as u64,
                )),
                join_timeout: Duration::from_secs(env_u64(
                    "FACETRACK_JOIN_TIMEOUT_SECS",
                    defaults.join_timeout.as_secs(),
                )),
                queue_capacity: env_usize("FACETRACK_QUEUE_CAPACITY", defaults.queue_capacity),
                dedup_window: Duration::from_secs(env_u64(
                    "FACETRACK_DEDUP_WINDOW_SECS",
                    defaults.dedup_window.as_secs(),
                )),
            },
        }
    }
}

fn parse_detector(value: Option<&str>) -> DetectorKind {
    match value.map(str::trim) {
        None | Some("") | Some("none") => DetectorKind::None,
        Some("simulated") => DetectorKind::Simulated,
        Some(other) => {
            tracing::warn!(value = other, "unknown FACETRACK_DETECTOR; using none");
            DetectorKind::None
        }
    }
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key).map(|v| v != "0").unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_detector() {
        assert_eq!(parse_detector(None), DetectorKind::None);
        assert_eq!(parse_detector(Some("simulated")), DetectorKind::Simulated);
        assert_eq!(parse_detector(Some(" none ")), DetectorKind::None);
        assert_eq!(parse_detector(Some("onnx")), DetectorKind::None);
    }
}
