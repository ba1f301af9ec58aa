//! Camera session contract
//!
//! The camera binding and the detector runtime are external. The controller
//! only sees them through [`SessionFactory`] and [`CameraSession`], built from an
//! immutable [`SessionConfig`].

use crate::detection::DetectionSink;
use crate::{OpticaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which camera lens a session binds to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    /// The other lens
    pub fn opposite(self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }

    /// Front camera frames are mirrored on screen
    pub fn is_front(self) -> bool {
        matches!(self, CameraFacing::Front)
    }
}

impl fmt::Display for CameraFacing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraFacing::Back => write!(f, "back"),
            CameraFacing::Front => write!(f, "front"),
        }
    }
}

/// Device orientation, used to map sensor axes onto display axes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    pub fn is_portrait(self) -> bool {
        matches!(self, Orientation::Portrait)
    }
}

/// A width x height pair in pixels
///
/// Parsed from and written as `"1280x720"`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Resolution {
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Same size with the axes exchanged
    pub fn swapped(self) -> Self {
        Self {
            width: self.height,
            height: self.width,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Resolution {
    type Err = OpticaError;

    fn from_str(s: &str) -> Result<Self> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| OpticaError::ConfigError(format!("Invalid resolution: {}", s)))?;

        let width = w
            .trim()
            .parse::<u32>()
            .map_err(|e| OpticaError::ConfigError(format!("Invalid width in {}: {}", s, e)))?;
        let height = h
            .trim()
            .parse::<u32>()
            .map_err(|e| OpticaError::ConfigError(format!("Invalid height in {}: {}", s, e)))?;

        if width == 0 || height == 0 {
            return Err(OpticaError::ConfigError(format!(
                "Resolution must be non-zero: {}",
                s
            )));
        }

        Ok(Self { width, height })
    }
}

impl TryFrom<String> for Resolution {
    type Error = OpticaError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Resolution> for String {
    fn from(value: Resolution) -> Self {
        value.to_string()
    }
}

/// How the detector processes frames
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMode {
    /// Low-latency mode with object tracking across frames
    #[default]
    Stream,
    /// Each frame is processed independently
    SingleImage,
}

/// Options handed to the object detector when a session is built
///
/// Compared by equality against the live session to decide whether a
/// resume can reuse it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorOptions {
    /// Path of the labeling model bundled with the detector
    pub model_path: String,

    /// Processing mode
    pub mode: DetectorMode,

    /// Report every object in frame rather than only the most prominent
    pub multiple_objects: bool,

    /// Attach classification labels to detected objects
    pub classification: bool,

    /// Labels below this confidence are discarded by the detector
    pub confidence_threshold: f32,

    /// Upper bound on labels reported per object
    pub max_labels_per_object: u32,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            model_path: "custom_models/object_labeler.tflite".to_string(),
            mode: DetectorMode::Stream,
            multiple_objects: true,
            classification: true,
            confidence_threshold: 0.5,
            max_labels_per_object: 1,
        }
    }
}

impl DetectorOptions {
    pub fn with_model(mut self, model_path: impl Into<String>) -> Self {
        self.model_path = model_path.into();
        self
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_max_labels(mut self, max_labels: u32) -> Self {
        self.max_labels_per_object = max_labels.max(1);
        self
    }
}

/// Everything needed to build a camera session
#[derive(Clone, Debug, PartialEq)]
pub struct SessionConfig {
    pub facing: CameraFacing,
    /// Fixed preview size, or `None` to let the camera pick
    pub target_resolution: Option<Resolution>,
    pub detector: DetectorOptions,
}

impl SessionConfig {
    pub fn new(facing: CameraFacing) -> Self {
        Self {
            facing,
            target_resolution: None,
            detector: DetectorOptions::default(),
        }
    }

    pub fn with_resolution(mut self, resolution: Option<Resolution>) -> Self {
        self.target_resolution = resolution;
        self
    }

    pub fn with_detector(mut self, detector: DetectorOptions) -> Self {
        self.detector = detector;
        self
    }
}

/// A live camera + detector binding
///
/// Every call happens on the controller thread. Detection outcomes are
/// delivered through the [`DetectionSink`] the session was built with.
pub trait CameraSession: Send {
    /// Begin (or continue) capturing frames
    fn start(&mut self) -> Result<()>;

    /// Stop capturing; the session can be started again
    fn stop(&mut self);

    /// Release the camera; the session is unusable afterwards
    fn close(&mut self);

    /// Size of the preview stream, once known
    fn preview_size(&self) -> Option<Resolution>;

    fn facing(&self) -> CameraFacing;
}

/// Builds camera sessions
pub trait SessionFactory: Send {
    fn create(
        &mut self,
        config: &SessionConfig,
        sink: DetectionSink,
    ) -> Result<Box<dyn CameraSession>>;
}
