pub mod camera;
pub mod config;
pub mod describe;
pub mod detection;
pub mod overlay;
pub mod session;
pub mod settings;
pub mod speech;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum OpticaError {
    #[error("Camera error: {0}")]
    CameraError(String),

    #[error("Detection error: {0}")]
    DetectionError(String),

    #[error("Description error: {0}")]
    DescriptionError(String),

    #[error("Speech error: {0}")]
    SpeechError(String),

    #[error("IO error: {0}")]
    IOError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("Replay error: {0}")]
    ReplayError(String),
}

impl From<std::io::Error> for OpticaError {
    fn from(e: std::io::Error) -> Self {
        OpticaError::IOError(e.to_string())
    }
}

impl From<describe::DescriptionError> for OpticaError {
    fn from(e: describe::DescriptionError) -> Self {
        OpticaError::DescriptionError(e.to_string())
    }
}

impl OpticaError {
    /// Check if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            // Camera binding failures usually need a permission or hardware fix
            OpticaError::CameraError(_) => false,
            // Per-frame, the next frame may well succeed
            OpticaError::DetectionError(_) => true,
            OpticaError::DescriptionError(_) => true,
            OpticaError::SpeechError(_) => true,
            OpticaError::IOError(_) => false,
            OpticaError::ConfigError(_) => false,
            OpticaError::ChannelError(_) => false,
            OpticaError::ReplayError(_) => false,
        }
    }

    /// Get a user-friendly description
    pub fn user_message(&self) -> String {
        match self {
            OpticaError::CameraError(_) => {
                "Camera error. Please check camera permissions.".to_string()
            }
            OpticaError::DetectionError(_) => {
                "Object detection failed for this frame.".to_string()
            }
            OpticaError::DescriptionError(_) => {
                "Scene description failed. Nothing will be narrated.".to_string()
            }
            OpticaError::SpeechError(_) => {
                "Text-to-speech failed. Please check your speakers.".to_string()
            }
            OpticaError::IOError(_) => "File system error occurred.".to_string(),
            OpticaError::ConfigError(_) => {
                "Configuration error. Please check settings.".to_string()
            }
            OpticaError::ChannelError(_) => {
                "Internal communication error. Please restart the application.".to_string()
            }
            OpticaError::ReplayError(_) => {
                "Could not read the detection recording.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, OpticaError>;
