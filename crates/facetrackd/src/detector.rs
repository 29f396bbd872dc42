use chrono::Utc;
use facetrack_core::{BoundingBox, DetectedFace, DetectorError, FaceDetector, Frame};
use rand::Rng;

const IDENTITIES: [&str; 3] = ["EMP001", "EMP002", "EMP003"];
const HIT_PROBABILITY: f64 = 0.1;

/// Stand-in detector for demos: reports a random known identity on roughly
/// one frame in ten.
pub struct SimulatedDetector;

impl FaceDetector for SimulatedDetector {
    fn detect(&self, _frame: &Frame) -> Result<Vec<DetectedFace>, DetectorError> {
        let mut rng = rand::thread_rng();
        if !rng.gen_bool(HIT_PROBABILITY) {
            return Ok(Vec::new());
        }
        let employee_id = IDENTITIES[rng.gen_range(0..IDENTITIES.len())];
        Ok(vec![DetectedFace {
            employee_id: employee_id.to_string(),
            confidence: rng.gen_range(0.70..0.95),
            bbox: BoundingBox {
                x: 100,
                y: 100,
                width: 200,
                height: 200,
            },
            timestamp: Utc::now(),
        }])
    }
}
