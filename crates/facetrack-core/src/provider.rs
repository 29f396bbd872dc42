//! Camera descriptor capability and its implementations.

use crate::types::{CameraConfig, Resolution, StreamSource};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("failed to read camera descriptors: {0}")]
    Read(String),
    #[error("invalid camera descriptors: {0}")]
    Invalid(String),
}

/// Supplies the set of cameras that should be tracked right now.
///
/// Called on every start and reload; implementations should return fresh data.
pub trait CameraProvider: Send + Sync {
    fn list_active(&self) -> Result<Vec<CameraConfig>, ProviderError>;
}

/// Fixed, replaceable list of cameras for embedders that manage descriptors
/// themselves.
#[derive(Default)]
pub struct StaticCameras {
    cameras: Mutex<Vec<CameraConfig>>,
}

impl StaticCameras {
    pub fn new(cameras: Vec<CameraConfig>) -> Self {
        Self {
            cameras: Mutex::new(cameras),
        }
    }

    /// Replace the list. Takes effect on the next start or reload.
    pub fn set(&self, cameras: Vec<CameraConfig>) {
        *self.cameras.lock() = cameras;
    }

    pub fn push(&self, camera: CameraConfig) {
        self.cameras.lock().push(camera);
    }
}

impl CameraProvider for StaticCameras {
    fn list_active(&self) -> Result<Vec<CameraConfig>, ProviderError> {
        Ok(self.cameras.lock().clone())
    }
}

/// Top-level camera file structure: a list of `[[camera]]` tables.
#[derive(Debug, Deserialize)]
struct CameraFile {
    #[serde(default, rename = "camera")]
    cameras: Vec<CameraEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CameraEntry {
    id: u32,
    /// Network stream URL or device path. Wins over `device`.
    url: Option<String>,
    /// Local device index. Defaults to `id` when neither source is given.
    device: Option<u32>,
    #[serde(default = "default_width")]
    width: u32,
    #[serde(default = "default_height")]
    height: u32,
    #[serde(default = "default_fps")]
    fps: u32,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_fps() -> u32 {
    30
}

fn default_enabled() -> bool {
    true
}

impl From<CameraEntry> for CameraConfig {
    fn from(entry: CameraEntry) -> Self {
        let source = match (entry.url, entry.device) {
            (Some(url), _) => StreamSource::Url(url),
            (None, Some(index)) => StreamSource::Device(index),
            (None, None) => StreamSource::Device(entry.id),
        };
        CameraConfig {
            camera_id: entry.id,
            source,
            resolution: Resolution {
                width: entry.width,
                height: entry.height,
            },
            fps: entry.fps,
        }
    }
}

/// Parse a camera file, keeping only enabled cameras.
pub fn parse_cameras(src: &str) -> Result<Vec<CameraConfig>, ProviderError> {
    let file: CameraFile =
        toml::from_str(src).map_err(|e| ProviderError::Invalid(e.to_string()))?;

    let mut seen = HashSet::new();
    for entry in &file.cameras {
        if !seen.insert(entry.id) {
            return Err(ProviderError::Invalid(format!("duplicate camera id {}", entry.id)));
        }
        if entry.width == 0 || entry.height == 0 || entry.fps == 0 {
            return Err(ProviderError::Invalid(format!(
                "camera {}: width, height and fps must be positive",
                entry.id
            )));
        }
    }

    Ok(file
        .cameras
        .into_iter()
        .filter(|entry| entry.enabled)
        .map(CameraConfig::from)
        .collect())
}

/// Cameras listed in a TOML file, re-read on every call so edits are picked
/// up by the next reload.
pub struct CameraFileProvider {
    path: PathBuf,
}

impl CameraFileProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CameraProvider for CameraFileProvider {
    fn list_active(&self) -> Result<Vec<CameraConfig>, ProviderError> {
        match std::fs::read_to_string(&self.path) {
            Ok(src) => parse_cameras(&src),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %self.path.display(), "camera file not found");
                Ok(Vec::new())
            }
            Err(e) => Err(ProviderError::Read(format!("{}: {e}", self.path.display()))),
        }
    }
}
