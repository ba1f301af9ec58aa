use crate::camera::{CameraFacing, Orientation};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What gets spoken for a labeled batch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrationMode {
    /// Ask the remote service for a scene description
    #[default]
    Describe,
    /// Speak the object names directly, no network call
    Labels,
}

/// Configuration for the session controller
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Lens used for the first session
    pub initial_facing: CameraFacing,
    /// Display orientation, used for overlay geometry
    pub orientation: Orientation,
    pub narration_mode: NarrationMode,
    /// Upper bound on waiting for speech to finish (None waits forever)
    pub completion_timeout: Option<Duration>,
    /// Command and event channel capacity
    pub channel_buffer_size: usize,
    /// Detection outcomes queued before the camera starts dropping frames
    pub detection_buffer_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            initial_facing: CameraFacing::Back,
            orientation: Orientation::Portrait,
            narration_mode: NarrationMode::Describe,
            completion_timeout: Some(Duration::from_secs(60)),
            channel_buffer_size: 100,
            detection_buffer_size: 4,
        }
    }
}

impl ControllerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_facing(mut self, facing: CameraFacing) -> Self {
        self.initial_facing = facing;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_narration_mode(mut self, mode: NarrationMode) -> Self {
        self.narration_mode = mode;
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.completion_timeout = timeout;
        self
    }

    pub fn with_channel_buffer_size(mut self, size: usize) -> Self {
        self.channel_buffer_size = size.max(1);
        self
    }

    pub fn with_detection_buffer_size(mut self, size: usize) -> Self {
        self.detection_buffer_size = size.max(1);
        self
    }
}
