//! Detection results and their delivery to the controller
//!
//! - **types**: detected objects, labels and the per-frame outcome
//! - **replay**: a session factory that plays back recorded detection batches

pub mod replay;
pub mod types;

pub use replay::{ReplayCamera, ReplayConfig, ReplayFrame, ReplayProgress, ReplayRecording, ReplaySessionFactory};
pub use types::{names_to_json, object_names, BoundingBox, DetectedObject, DetectionOutcome, Label};

use crossbeam_channel::{Sender, TrySendError};
use tracing::debug;

/// A detection outcome tagged with the session generation that produced it
#[derive(Debug, Clone)]
pub struct DetectionEvent {
    pub generation: u64,
    pub outcome: DetectionOutcome,
}

/// Hands detection outcomes from a camera session to the controller thread
///
/// Each session gets its own sink; the generation lets the controller drop
/// outcomes that arrive after the session was replaced.
#[derive(Debug, Clone)]
pub struct DetectionSink {
    generation: u64,
    tx: Sender<DetectionEvent>,
}

impl DetectionSink {
    pub fn new(generation: u64, tx: Sender<DetectionEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Deliver an outcome without blocking the camera thread
    ///
    /// Returns false when the frame was dropped.
    pub fn deliver(&self, outcome: DetectionOutcome) -> bool {
        let event = DetectionEvent {
            generation: self.generation,
            outcome,
        };

        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!("Detection queue full, dropping frame");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}
