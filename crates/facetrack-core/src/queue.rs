//! Detected-face queue: bounded, multi-producer, single-consumer, drop-on-full.
//!
//! Workers never block on it. When the reader falls behind, new faces are
//! discarded; the queue is a display aid, not a durability guarantee.

use crate::types::DetectedFace;
use crossbeam_channel::{Receiver, Sender, TrySendError};

/// Default number of faces held between drains.
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

pub struct FaceQueue {
    tx: Sender<DetectedFace>,
    rx: Receiver<DetectedFace>,
    capacity: usize,
}

impl FaceQueue {
    /// Create a queue. Capacities below 1 are raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx, capacity }
    }

    /// Handle for a worker to push faces with.
    pub fn producer(&self) -> FaceProducer {
        FaceProducer {
            tx: self.tx.clone(),
        }
    }

    /// Take everything currently queued without blocking.
    ///
    /// Takes at most `capacity` faces so the call terminates even while
    /// producers keep pushing.
    pub fn drain(&self) -> Vec<DetectedFace> {
        self.rx.try_iter().take(self.capacity).collect()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for FaceQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}

/// Producer side of a [`FaceQueue`].
#[derive(Clone)]
pub struct FaceProducer {
    tx: Sender<DetectedFace>,
}

impl FaceProducer {
    /// Enqueue without blocking. Returns `false` if the face was dropped.
    pub fn offer(&self, face: DetectedFace) -> bool {
        match self.tx.try_send(face) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::trace!("face queue full; dropping face");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}
