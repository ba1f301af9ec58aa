//! Session state shared between the controller and its observers
//!
//! Only the controller thread writes; the CLI and tests read snapshots through
//! [`SharedSessionState`].

use crate::camera::{CameraFacing, Orientation};
use crate::overlay::ImageSourceInfo;
use crate::speech::NarrationOutcome;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

/// What the camera is doing
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CameraPhase {
    /// No capture: not created yet, backgrounded or destroyed
    #[default]
    Idle,
    /// Frames are flowing to the detector
    Capturing,
    /// Stopped while a narration plays
    Paused,
}

impl CameraPhase {
    pub fn is_capturing(&self) -> bool {
        matches!(self, CameraPhase::Capturing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, CameraPhase::Paused)
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, CameraPhase::Idle)
    }
}

impl std::fmt::Display for CameraPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CameraPhase::Idle => write!(f, "Idle"),
            CameraPhase::Capturing => write!(f, "Capturing"),
            CameraPhase::Paused => write!(f, "Paused"),
        }
    }
}

/// Progress of the current narration cycle
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CyclePhase {
    #[default]
    Idle,
    /// Waiting for the remote description
    AwaitingDescription { id: Uuid },
    /// Speech is playing
    Narrating { id: Uuid },
}

impl CyclePhase {
    pub fn is_idle(&self) -> bool {
        matches!(self, CyclePhase::Idle)
    }

    pub fn is_awaiting(&self) -> bool {
        matches!(self, CyclePhase::AwaitingDescription { .. })
    }

    pub fn is_narrating(&self) -> bool {
        matches!(self, CyclePhase::Narrating { .. })
    }

    /// Id of the cycle in flight
    pub fn id(&self) -> Option<Uuid> {
        match self {
            CyclePhase::Idle => None,
            CyclePhase::AwaitingDescription { id } | CyclePhase::Narrating { id } => Some(*id),
        }
    }
}

impl std::fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CyclePhase::Idle => write!(f, "Idle"),
            CyclePhase::AwaitingDescription { id } => write!(f, "AwaitingDescription({})", id),
            CyclePhase::Narrating { id } => write!(f, "Narrating({})", id),
        }
    }
}

/// The most recent narration
#[derive(Clone, Debug)]
pub struct NarrationRecord {
    pub cycle: Uuid,
    pub text: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub outcome: Option<NarrationOutcome>,
}

impl NarrationRecord {
    pub fn new(cycle: Uuid, text: String) -> Self {
        Self {
            cycle,
            text,
            started_at: Utc::now(),
            finished_at: None,
            outcome: None,
        }
    }

    pub fn finish(&mut self, outcome: NarrationOutcome) {
        self.finished_at = Some(Utc::now());
        self.outcome = Some(outcome);
    }

    /// Wall-clock playback time, once finished
    pub fn duration_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_milliseconds())
    }
}

/// Controller-owned session state
#[derive(Clone, Debug, Default)]
pub struct SessionState {
    pub facing: CameraFacing,
    pub orientation: Orientation,
    pub camera: CameraPhase,
    pub cycle: CyclePhase,
    /// Preview geometry still has to be handed to the overlay
    pub pending_overlay_update: bool,
    pub image_source: Option<ImageSourceInfo>,
    /// Bumped on every session (re)build
    pub generation: u64,
    /// False while backgrounded
    pub foreground: bool,
    /// False before creation and after destroy
    pub alive: bool,
    pub last_narration: Option<NarrationRecord>,
    pub last_notice: Option<String>,

    pub frames_processed: u64,
    pub requests_issued: u64,
    pub narrations_completed: u64,
    /// Labeled batches dropped because a cycle was in flight
    pub batches_dropped: u64,
}

impl SessionState {
    pub fn new(facing: CameraFacing, orientation: Orientation) -> Self {
        Self {
            facing,
            orientation,
            ..Default::default()
        }
    }

    // === State transitions ===

    /// Record a freshly built session
    pub fn session_built(&mut self, facing: CameraFacing) {
        self.facing = facing;
        self.generation += 1;
        self.pending_overlay_update = true;
        self.image_source = None;
    }

    pub fn begin_request(&mut self, id: Uuid) {
        self.cycle = CyclePhase::AwaitingDescription { id };
        self.requests_issued += 1;
    }

    pub fn begin_narration(&mut self, id: Uuid, text: String) {
        self.cycle = CyclePhase::Narrating { id };
        self.last_narration = Some(NarrationRecord::new(id, text));
    }

    pub fn finish_narration(&mut self, outcome: NarrationOutcome) {
        if outcome == NarrationOutcome::Completed {
            self.narrations_completed += 1;
        }
        if let Some(record) = self.last_narration.as_mut() {
            record.finish(outcome);
        }
        self.cycle = CyclePhase::Idle;
    }

    pub fn clear_cycle(&mut self) {
        self.cycle = CyclePhase::Idle;
    }

    /// Whether `id` is the cycle currently awaiting its description
    pub fn is_awaiting(&self, id: Uuid) -> bool {
        self.cycle == CyclePhase::AwaitingDescription { id }
    }

    /// Whether `id` is the cycle currently narrating
    pub fn is_narrating(&self, id: Uuid) -> bool {
        self.cycle == CyclePhase::Narrating { id }
    }
}

/// Thread-safe handle to the session state
#[derive(Clone, Default)]
pub struct SharedSessionState {
    inner: Arc<RwLock<SessionState>>,
}

impl SharedSessionState {
    pub fn new(state: SessionState) -> Self {
        Self {
            inner: Arc::new(RwLock::new(state)),
        }
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, SessionState> {
        self.inner.read()
    }

    pub fn write(&self) -> parking_lot::RwLockWriteGuard<'_, SessionState> {
        self.inner.write()
    }

    /// Copy of the current state (no lock held after return)
    pub fn snapshot(&self) -> SessionState {
        self.inner.read().clone()
    }

    // === Convenience read methods ===

    pub fn camera_phase(&self) -> CameraPhase {
        self.inner.read().camera
    }

    pub fn cycle(&self) -> CyclePhase {
        self.inner.read().cycle
    }

    pub fn facing(&self) -> CameraFacing {
        self.inner.read().facing
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    pub fn is_alive(&self) -> bool {
        self.inner.read().alive
    }

    pub fn is_foreground(&self) -> bool {
        self.inner.read().foreground
    }

    pub fn is_narrating(&self) -> bool {
        self.inner.read().cycle.is_narrating()
    }

    /// No cycle in flight
    pub fn is_idle(&self) -> bool {
        self.inner.read().cycle.is_idle()
    }

    pub fn image_source(&self) -> Option<ImageSourceInfo> {
        self.inner.read().image_source
    }

    pub fn last_narration(&self) -> Option<NarrationRecord> {
        self.inner.read().last_narration.clone()
    }
}
