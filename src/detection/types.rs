use crate::{OpticaError, Result};
use serde::{Deserialize, Serialize};

/// A classification attached to a detected object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub index: u32,
}

impl Label {
    pub fn new(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            confidence,
            index: 0,
        }
    }
}

/// Object bounds in preview pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DetectedObject {
    #[serde(default)]
    pub tracking_id: Option<u32>,
    #[serde(default)]
    pub bounding_box: Option<BoundingBox>,
    /// Ordered by decreasing confidence
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl DetectedObject {
    pub fn new(labels: Vec<Label>) -> Self {
        Self {
            labels,
            ..Default::default()
        }
    }

    /// Object with a single label
    pub fn labeled(text: impl Into<String>, confidence: f32) -> Self {
        Self::new(vec![Label::new(text, confidence)])
    }

    /// The top label, if the detector classified this object at all
    pub fn top_label(&self) -> Option<&Label> {
        self.labels.first()
    }
}

/// Result of running the detector on one frame
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionOutcome {
    Objects(Vec<DetectedObject>),
    Failure(String),
}

impl DetectionOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, DetectionOutcome::Failure(_))
    }
}

/// Names of the labeled objects in a batch, in detection order
///
/// Objects without labels are skipped; only the top label of each object is used.
pub fn object_names(objects: &[DetectedObject]) -> Vec<String> {
    objects
        .iter()
        .filter_map(|object| object.top_label())
        .map(|label| label.text.clone())
        .collect()
}

/// Serialize a name list as a JSON array of strings, e.g. `["cup","chair"]`
pub fn names_to_json(names: &[String]) -> Result<String> {
    serde_json::to_string(names)
        .map_err(|e| OpticaError::DetectionError(format!("Failed to serialize names: {}", e)))
}
