//! Application configuration file
//!
//! ```toml
//! [description]
//! endpoint = "https://proxy.tune.app"
//! api_key_env = "OPTICA_API_KEY"
//!
//! [narration]
//! mode = "describe"
//! completion_timeout_secs = 60
//!
//! [camera]
//! facing = "back"
//! orientation = "portrait"
//!
//! [replay]
//! path = "frames.jsonl"
//! frame_interval_ms = 200
//! ```

use crate::camera::{CameraFacing, Orientation};
use crate::describe::DescriptionConfig;
use crate::detection::ReplayConfig;
use crate::session::{ControllerConfig, NarrationMode};
use crate::speech::TTSConfig;
use crate::{OpticaError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Narration settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NarrationConfig {
    pub mode: NarrationMode,
    /// Upper bound on waiting for speech to finish (0 waits forever)
    pub completion_timeout_secs: u64,
    /// Speaking rate of the console sink
    pub words_per_minute: u32,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            mode: NarrationMode::Describe,
            completion_timeout_secs: 60,
            words_per_minute: 180,
        }
    }
}

impl NarrationConfig {
    pub fn completion_timeout(&self) -> Option<Duration> {
        match self.completion_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub facing: CameraFacing,
    pub orientation: Orientation,
}

/// Top-level configuration
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub description: DescriptionConfig,
    pub narration: NarrationConfig,
    pub camera: CameraConfig,
    pub replay: ReplayConfig,
    /// Local VITS voice; the console sink is used when absent
    pub tts: Option<TTSConfig>,
}

impl AppConfig {
    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OpticaError::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
            .map_err(|e| OpticaError::ConfigError(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        toml::from_str(content).map_err(|e| e.to_string())
    }

    /// `<config dir>/optica/optica.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("optica").join("optica.toml"))
    }

    /// Load the explicit path, else the default path if it exists, else defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }

        match Self::default_path() {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }

    /// Check the configuration is usable
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.narration.mode == NarrationMode::Describe {
            if self.description.endpoint.trim().is_empty() {
                return Err("Description endpoint is required".to_string());
            }
            if self.description.resolve_api_key().is_none() {
                return Err(format!(
                    "No API key: set description.api_key or the {} environment variable",
                    self.description.api_key_env
                ));
            }
        }

        if self.narration.words_per_minute == 0 {
            return Err("narration.words_per_minute must be positive".to_string());
        }

        if self.replay.frame_interval_ms == 0 {
            return Err("replay.frame_interval_ms must be positive".to_string());
        }

        if let Some(tts) = &self.tts {
            tts.validate()?;
        }

        Ok(())
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig::new()
            .with_facing(self.camera.facing)
            .with_orientation(self.camera.orientation)
            .with_narration_mode(self.narration.mode)
            .with_completion_timeout(self.narration.completion_timeout())
    }
}
