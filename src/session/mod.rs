//! Session controller: camera lifecycle and the narration cycle
//!
//! - **config**: controller settings and the narration mode
//! - **state**: controller-owned state, shared read-only with observers
//! - **controller**: the event loop and its handle

pub mod config;
pub mod controller;
pub mod state;

pub use config::{ControllerConfig, NarrationMode};
pub use controller::{
    Collaborators, ControllerCommand, ControllerEvent, ControllerHandle, SessionController,
    SkipReason,
};
pub use state::{CameraPhase, CyclePhase, NarrationRecord, SessionState, SharedSessionState};
