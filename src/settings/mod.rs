//! Camera and detector preferences
//!
//! Preferences are read fresh on every query so that edits made while the
//! camera was paused are picked up by the next resume.

use crate::camera::{CameraFacing, DetectorOptions, Resolution, SessionConfig};
use crate::{OpticaError, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

/// Source of the settings a camera session is built from
pub trait Preferences: Send {
    fn detector_options(&self) -> DetectorOptions;

    /// Fixed preview size for the given lens, if the user chose one
    fn target_resolution(&self, facing: CameraFacing) -> Option<Resolution>;

    /// The session configuration these preferences describe
    fn session_config(&self, facing: CameraFacing) -> SessionConfig {
        SessionConfig::new(facing)
            .with_resolution(self.target_resolution(facing))
            .with_detector(self.detector_options())
    }
}

/// Per-lens preview resolutions
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionPreferences {
    pub back: Option<Resolution>,
    pub front: Option<Resolution>,
}

impl ResolutionPreferences {
    pub fn get(&self, facing: CameraFacing) -> Option<Resolution> {
        match facing {
            CameraFacing::Back => self.back,
            CameraFacing::Front => self.front,
        }
    }

    pub fn set(&mut self, facing: CameraFacing, resolution: Option<Resolution>) {
        match facing {
            CameraFacing::Back => self.back = resolution,
            CameraFacing::Front => self.front = resolution,
        }
    }
}

/// On-disk layout of the preferences file
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferencesFile {
    pub detector: DetectorOptions,
    pub resolution: ResolutionPreferences,
}

impl PreferencesFile {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OpticaError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            OpticaError::ConfigError(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| OpticaError::ConfigError(format!("Failed to encode preferences: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

/// In-memory preferences
///
/// Clones share the same values, so a caller can keep one copy and change
/// settings while the controller owns another.
#[derive(Clone, Debug, Default)]
pub struct StaticPreferences {
    inner: Arc<RwLock<PreferencesFile>>,
}

impl StaticPreferences {
    pub fn new(values: PreferencesFile) -> Self {
        Self {
            inner: Arc::new(RwLock::new(values)),
        }
    }

    pub fn set_detector_options(&self, options: DetectorOptions) {
        self.inner.write().detector = options;
    }

    pub fn set_target_resolution(&self, facing: CameraFacing, resolution: Option<Resolution>) {
        self.inner.write().resolution.set(facing, resolution);
    }
}

impl Preferences for StaticPreferences {
    fn detector_options(&self) -> DetectorOptions {
        self.inner.read().detector.clone()
    }

    fn target_resolution(&self, facing: CameraFacing) -> Option<Resolution> {
        self.inner.read().resolution.get(facing)
    }
}

/// Preferences backed by a TOML file
///
/// A missing or unreadable file falls back to the last values that loaded.
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    last_good: RwLock<PreferencesFile>,
}

impl FilePreferences {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_good: RwLock::new(PreferencesFile::default()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn current(&self) -> PreferencesFile {
        if !self.path.exists() {
            return self.last_good.read().clone();
        }

        match PreferencesFile::load(&self.path) {
            Ok(values) => {
                *self.last_good.write() = values.clone();
                values
            }
            Err(e) => {
                warn!("Using previous preferences: {}", e);
                self.last_good.read().clone()
            }
        }
    }
}

impl Preferences for FilePreferences {
    fn detector_options(&self) -> DetectorOptions {
        self.current().detector
    }

    fn target_resolution(&self, facing: CameraFacing) -> Option<Resolution> {
        self.current().resolution.get(facing)
    }

    fn session_config(&self, facing: CameraFacing) -> SessionConfig {
        // One read so detector and resolution come from the same file version
        let values = self.current();
        SessionConfig::new(facing)
            .with_resolution(values.resolution.get(facing))
            .with_detector(values.detector)
    }
}
