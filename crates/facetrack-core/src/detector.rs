//! Face detection and recognition capability.
//!
//! The model itself lives outside this crate. Anything that can turn a frame
//! into a list of recognized faces plugs in through [`FaceDetector`].

use crate::types::{DetectedFace, Frame};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model not loaded: {0}")]
    ModelNotLoaded(String),
    #[error("unsupported frame layout: {0}")]
    UnsupportedFrame(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
}

/// Detects and identifies faces in a frame.
///
/// Shared by every camera worker, so implementations with mutable state
/// must synchronise internally.
pub trait FaceDetector: Send + Sync {
    fn detect(&self, frame: &Frame) -> Result<Vec<DetectedFace>, DetectorError>;
}

/// Detector that never reports a face.
pub struct NoopDetector;

impl FaceDetector for NoopDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, DetectorError> {
        Ok(Vec::new())
    }
}
