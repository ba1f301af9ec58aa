//! Session controller
//!
//! Runs the detection -> description -> narration -> resume loop on a single
//! thread. Camera calls, detection outcomes, description results and narration
//! completions are all handled here, so the session state has exactly one writer.

use crate::camera::{CameraFacing, CameraSession, Orientation, SessionConfig, SessionFactory};
use crate::describe::{DescriptionClient, DescriptionError};
use crate::detection::{names_to_json, object_names, DetectedObject, DetectionEvent, DetectionOutcome, DetectionSink};
use crate::overlay::{image_source_info, NoopOverlay, Overlay};
use crate::session::config::{ControllerConfig, NarrationMode};
use crate::session::state::{CameraPhase, SessionState, SharedSessionState};
use crate::settings::Preferences;
use crate::speech::{is_uninformative, NarrationOutcome, Narrator, SpeechSink};
use crate::{OpticaError, Result};
use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Commands accepted by the controller
#[derive(Debug, Clone)]
pub enum ControllerCommand {
    /// Build the first session and start capturing
    Create,
    /// Switch between the back and front lens
    ToggleFacing,
    /// Device rotated; preview geometry is re-sent on the next frame
    SetOrientation(Orientation),
    /// Host went to the background
    Pause,
    /// Host came back to the foreground
    Resume,
    /// Tear everything down and stop the loop
    Destroy,
}

/// Why a cycle ended without speech
#[derive(Debug, Clone, PartialEq)]
pub enum SkipReason {
    /// The description said nothing was seen
    Uninformative,
    DescriptionFailed(String),
}

/// Events emitted by the controller
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    SessionStarted {
        facing: CameraFacing,
        generation: u64,
    },
    CameraStarted,
    CameraStopped,
    DescriptionRequested {
        cycle: Uuid,
        names: Vec<String>,
    },
    NarrationStarted {
        cycle: Uuid,
        text: String,
    },
    NarrationFinished {
        cycle: Uuid,
        outcome: NarrationOutcome,
    },
    NarrationSkipped {
        cycle: Uuid,
        reason: SkipReason,
    },
    /// Transient message for the user
    Notice(String),
    Destroyed,
}

/// Results posted back to the controller thread by its workers
enum WorkerMessage {
    DescriptionReady {
        cycle: Uuid,
        result: std::result::Result<String, DescriptionError>,
    },
    NarrationFinished {
        cycle: Uuid,
        outcome: NarrationOutcome,
    },
}

/// Handle for driving the controller from the CLI or tests
#[derive(Clone)]
pub struct ControllerHandle {
    command_tx: Sender<ControllerCommand>,
    event_rx: Receiver<ControllerEvent>,
    state: SharedSessionState,
}

impl ControllerHandle {
    pub fn send_command(&self, cmd: ControllerCommand) -> Result<()> {
        self.command_tx
            .send(cmd)
            .map_err(|e| OpticaError::ChannelError(format!("Failed to send command: {}", e)))
    }

    pub fn create(&self) -> Result<()> {
        self.send_command(ControllerCommand::Create)
    }

    pub fn toggle_facing(&self) -> Result<()> {
        self.send_command(ControllerCommand::ToggleFacing)
    }

    pub fn set_orientation(&self, orientation: Orientation) -> Result<()> {
        self.send_command(ControllerCommand::SetOrientation(orientation))
    }

    pub fn pause(&self) -> Result<()> {
        self.send_command(ControllerCommand::Pause)
    }

    pub fn resume(&self) -> Result<()> {
        self.send_command(ControllerCommand::Resume)
    }

    pub fn destroy(&self) -> Result<()> {
        self.send_command(ControllerCommand::Destroy)
    }

    /// Try to receive an event (non-blocking)
    pub fn try_recv_event(&self) -> Option<ControllerEvent> {
        self.event_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_event_timeout(&self, timeout: Duration) -> Option<ControllerEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    /// Event receiver, for use in a `select!`
    pub fn events(&self) -> Receiver<ControllerEvent> {
        self.event_rx.clone()
    }

    pub fn state(&self) -> &SharedSessionState {
        &self.state
    }
}

/// External collaborators of the controller
pub struct Collaborators {
    pub factory: Box<dyn SessionFactory>,
    pub preferences: Box<dyn Preferences>,
    pub speech: Arc<dyn SpeechSink>,
    pub client: Option<Arc<dyn DescriptionClient>>,
    pub overlay: Box<dyn Overlay>,
}

impl Collaborators {
    pub fn new(
        factory: Box<dyn SessionFactory>,
        preferences: Box<dyn Preferences>,
        speech: Arc<dyn SpeechSink>,
    ) -> Self {
        Self {
            factory,
            preferences,
            speech,
            client: None,
            overlay: Box::new(NoopOverlay),
        }
    }

    pub fn with_client(mut self, client: Arc<dyn DescriptionClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_overlay(mut self, overlay: Box<dyn Overlay>) -> Self {
        self.overlay = overlay;
        self
    }
}

pub struct SessionController {
    config: ControllerConfig,
    state: SharedSessionState,

    factory: Box<dyn SessionFactory>,
    preferences: Box<dyn Preferences>,
    client: Option<Arc<dyn DescriptionClient>>,
    overlay: Box<dyn Overlay>,
    narrator: Narrator,

    session: Option<Box<dyn CameraSession>>,
    active_config: Option<SessionConfig>,

    runtime: tokio::runtime::Runtime,

    command_rx: Receiver<ControllerCommand>,
    event_tx: Sender<ControllerEvent>,
    detection_tx: Sender<DetectionEvent>,
    detection_rx: Receiver<DetectionEvent>,
    worker_tx: Sender<WorkerMessage>,
    worker_rx: Receiver<WorkerMessage>,
}

impl SessionController {
    /// Create a controller and the handle that drives it
    ///
    /// Nothing runs until [`SessionController::start`] is called.
    pub fn new(
        config: ControllerConfig,
        collaborators: Collaborators,
    ) -> Result<(Self, ControllerHandle)> {
        if config.narration_mode == NarrationMode::Describe && collaborators.client.is_none() {
            return Err(OpticaError::ConfigError(
                "Describe mode needs a description client".into(),
            ));
        }

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("describe")
            .enable_all()
            .build()?;

        let (command_tx, command_rx) = bounded(config.channel_buffer_size);
        let (event_tx, event_rx) = bounded(config.channel_buffer_size);
        let (detection_tx, detection_rx) = bounded(config.detection_buffer_size);
        let (worker_tx, worker_rx) = unbounded();

        let state = SharedSessionState::new(SessionState::new(
            config.initial_facing,
            config.orientation,
        ));

        let narrator = Narrator::new(collaborators.speech, config.completion_timeout);

        let handle = ControllerHandle {
            command_tx,
            event_rx,
            state: state.clone(),
        };

        let controller = Self {
            config,
            state,
            factory: collaborators.factory,
            preferences: collaborators.preferences,
            client: collaborators.client,
            overlay: collaborators.overlay,
            narrator,
            session: None,
            active_config: None,
            runtime,
            command_rx,
            event_tx,
            detection_tx,
            detection_rx,
            worker_tx,
            worker_rx,
        };

        Ok((controller, handle))
    }

    /// Run the controller loop on its own thread
    pub fn start(self) -> Result<JoinHandle<()>> {
        thread::Builder::new()
            .name("session-controller".into())
            .spawn(move || self.run())
            .map_err(|e| OpticaError::ChannelError(format!("Failed to spawn controller: {}", e)))
    }

    fn run(mut self) {
        info!("Session controller starting");

        let command_rx = self.command_rx.clone();
        let detection_rx = self.detection_rx.clone();
        let worker_rx = self.worker_rx.clone();

        loop {
            select! {
                recv(command_rx) -> cmd => {
                    match cmd {
                        Ok(cmd) => {
                            if !self.handle_command(cmd) {
                                break;
                            }
                        }
                        Err(_) => {
                            warn!("Command channel disconnected, shutting down");
                            self.destroy();
                            break;
                        }
                    }
                }

                recv(detection_rx) -> event => {
                    if let Ok(event) = event {
                        self.handle_detection(event);
                    }
                }

                recv(worker_rx) -> msg => {
                    match msg {
                        Ok(WorkerMessage::DescriptionReady { cycle, result }) => {
                            self.on_description_ready(cycle, result);
                        }
                        Ok(WorkerMessage::NarrationFinished { cycle, outcome }) => {
                            self.on_narration_finished(cycle, outcome);
                        }
                        Err(_) => {
                            error!("Worker channel disconnected");
                            break;
                        }
                    }
                }
            }
        }

        info!("Session controller stopped");
    }

    /// Returns false when the loop should exit
    fn handle_command(&mut self, cmd: ControllerCommand) -> bool {
        match cmd {
            ControllerCommand::Create => self.create(),
            ControllerCommand::ToggleFacing => self.toggle_facing(),
            ControllerCommand::SetOrientation(orientation) => {
                let mut s = self.state.write();
                if s.orientation != orientation {
                    s.orientation = orientation;
                    s.pending_overlay_update = true;
                }
            }
            ControllerCommand::Pause => self.pause(),
            ControllerCommand::Resume => self.resume(),
            ControllerCommand::Destroy => {
                self.destroy();
                return false;
            }
        }
        true
    }

    fn emit(&self, event: ControllerEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => debug!("Event queue full, dropping {:?}", event),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }

    fn notice(&self, message: String) {
        self.state.write().last_notice = Some(message.clone());
        self.emit(ControllerEvent::Notice(message));
    }

    // === Lifecycle ===

    fn create(&mut self) {
        if self.state.is_alive() {
            warn!("Session already created");
            return;
        }

        {
            let mut s = self.state.write();
            s.alive = true;
            s.foreground = true;
        }

        let facing = self.state.facing();
        let config = self.preferences.session_config(facing);
        self.rebuild_session(config);
    }

    fn toggle_facing(&mut self) {
        if !self.state.is_alive() {
            warn!("Cannot toggle facing: session not alive");
            return;
        }

        let facing = self.state.facing().opposite();
        info!("Switching camera to {}", facing);
        let config = self.preferences.session_config(facing);
        self.rebuild_session(config);
    }

    fn pause(&mut self) {
        self.state.write().foreground = false;

        match self.state.camera_phase() {
            CameraPhase::Capturing => self.stop_camera(CameraPhase::Idle),
            // Already stopped for narration; stays stopped when it ends
            CameraPhase::Paused => self.state.write().camera = CameraPhase::Idle,
            CameraPhase::Idle => {}
        }
        debug!("Controller paused");
    }

    fn resume(&mut self) {
        if !self.state.is_alive() {
            warn!("Cannot resume: session not alive");
            return;
        }

        self.state.write().foreground = true;
        self.resume_capture();
    }

    /// Restart the live session, or rebuild it when the preferences changed
    fn resume_capture(&mut self) {
        let desired = self.preferences.session_config(self.state.facing());
        let reusable = self.session.is_some() && self.active_config.as_ref() == Some(&desired);

        if !reusable {
            info!("Session configuration changed, rebuilding");
            self.rebuild_session(desired);
        } else if self.state.is_narrating() {
            // Capture restarts when the narration ends
            self.state.write().camera = CameraPhase::Paused;
        } else if !self.state.camera_phase().is_capturing() {
            self.start_camera();
        }
    }

    fn destroy(&mut self) {
        info!("Destroying session");

        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.active_config = None;

        {
            let mut s = self.state.write();
            s.alive = false;
            s.foreground = false;
            s.camera = CameraPhase::Idle;
            s.clear_cycle();
        }

        self.overlay.clear();
        self.narrator.shutdown();
        self.emit(ControllerEvent::Destroyed);
    }

    /// Replace the live session with one built from `config`
    fn rebuild_session(&mut self, config: SessionConfig) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
        self.active_config = None;
        self.state.write().camera = CameraPhase::Idle;

        let generation = self.state.generation() + 1;
        let sink = DetectionSink::new(generation, self.detection_tx.clone());

        match self.factory.create(&config, sink) {
            Ok(session) => {
                self.session = Some(session);
                self.state.write().session_built(config.facing);
                info!(
                    "Camera session {} built ({}, {})",
                    generation,
                    config.facing,
                    config
                        .target_resolution
                        .map(|r| r.to_string())
                        .unwrap_or_else(|| "default resolution".into())
                );
                self.emit(ControllerEvent::SessionStarted {
                    facing: config.facing,
                    generation,
                });
                self.active_config = Some(config);
            }
            Err(e) => {
                error!("Failed to build camera session: {}", e);
                // Still counts as a rebuild so the old session's frames are dropped
                self.state.write().session_built(config.facing);
                self.notice(e.user_message());
                return;
            }
        }

        if self.state.is_narrating() {
            self.state.write().camera = CameraPhase::Paused;
            debug!("Narration in progress, deferring capture start");
        } else if self.state.is_foreground() {
            self.start_camera();
        }
    }

    fn start_camera(&mut self) {
        let Some(session) = self.session.as_mut() else {
            return;
        };

        match session.start() {
            Ok(()) => {
                self.state.write().camera = CameraPhase::Capturing;
                debug!("Camera started");
                self.emit(ControllerEvent::CameraStarted);
            }
            Err(e) => {
                error!("Failed to start camera: {}", e);
                self.state.write().camera = CameraPhase::Idle;
                self.notice(e.user_message());
            }
        }
    }

    fn stop_camera(&mut self, phase: CameraPhase) {
        if let Some(session) = self.session.as_mut() {
            session.stop();
        }
        self.state.write().camera = phase;
        debug!("Camera stopped ({})", phase);
        self.emit(ControllerEvent::CameraStopped);
    }

    // === Detection ===

    fn handle_detection(&mut self, event: DetectionEvent) {
        {
            let s = self.state.read();
            if !s.alive || event.generation != s.generation {
                debug!(
                    "Dropping outcome from stale session {} (current {})",
                    event.generation, s.generation
                );
                return;
            }
        }

        self.state.write().frames_processed += 1;

        match event.outcome {
            DetectionOutcome::Objects(objects) => self.on_detection_success(objects),
            DetectionOutcome::Failure(error) => self.on_detection_failure(error),
        }
    }

    fn on_detection_success(&mut self, objects: Vec<DetectedObject>) {
        self.overlay.clear();
        self.update_image_source();
        self.overlay.render(&objects);

        let names = object_names(&objects);
        if names.is_empty() {
            return;
        }

        if !self.state.is_idle() {
            self.state.write().batches_dropped += 1;
            debug!("Cycle in flight, dropping batch {:?}", names);
            return;
        }

        match self.config.narration_mode {
            NarrationMode::Describe => match names_to_json(&names) {
                Ok(json) => self.request_description(names, json),
                Err(e) => warn!("Failed to serialize object names: {}", e),
            },
            NarrationMode::Labels => {
                let cycle = Uuid::new_v4();
                self.narrate(cycle, names.join(", "));
            }
        }
    }

    /// Hand preview geometry to the overlay once per session
    fn update_image_source(&mut self) {
        let (pending, orientation, facing) = {
            let s = self.state.read();
            (s.pending_overlay_update, s.orientation, s.facing)
        };
        if !pending {
            return;
        }

        let Some(preview) = self.session.as_ref().and_then(|s| s.preview_size()) else {
            return;
        };

        let info = image_source_info(preview, orientation, facing);
        self.overlay.set_image_source(info);
        let mut s = self.state.write();
        s.image_source = Some(info);
        s.pending_overlay_update = false;
        debug!("Overlay image source {}x{} (flipped: {})", info.width, info.height, info.flipped);
    }

    fn on_detection_failure(&mut self, error: String) {
        warn!("Object detection failed: {}", error);
        self.overlay.clear();
        self.notice(format!("Failed to process. Error: {}", error));
    }

    // === Narration cycle ===

    fn request_description(&mut self, names: Vec<String>, names_json: String) {
        let Some(client) = self.client.clone() else {
            warn!("No description client configured");
            return;
        };

        let cycle = Uuid::new_v4();
        self.state.write().begin_request(cycle);
        info!("Requesting description for {}", names_json);
        self.emit(ControllerEvent::DescriptionRequested { cycle, names });

        let worker_tx = self.worker_tx.clone();
        self.runtime.spawn(async move {
            let result = client.describe(&names_json).await;
            let _ = worker_tx.send(WorkerMessage::DescriptionReady { cycle, result });
        });
    }

    fn on_description_ready(&mut self, cycle: Uuid, result: std::result::Result<String, DescriptionError>) {
        if !self.state.read().is_awaiting(cycle) {
            debug!("Ignoring description for stale cycle {}", cycle);
            return;
        }

        match result {
            Ok(text) => self.narrate(cycle, text),
            Err(e) => {
                warn!("Description request failed: {}", e);
                self.state.write().clear_cycle();
                self.emit(ControllerEvent::NarrationSkipped {
                    cycle,
                    reason: SkipReason::DescriptionFailed(e.to_string()),
                });
            }
        }
    }

    fn narrate(&mut self, cycle: Uuid, text: String) {
        let text = text.trim().to_string();
        if text.is_empty() || is_uninformative(&text) {
            info!("Nothing worth narrating: {:?}", text);
            self.state.write().clear_cycle();
            self.emit(ControllerEvent::NarrationSkipped {
                cycle,
                reason: SkipReason::Uninformative,
            });
            return;
        }

        if self.state.camera_phase().is_capturing() {
            self.stop_camera(CameraPhase::Paused);
        }

        self.state.write().begin_narration(cycle, text.clone());
        info!("Narrating: {}", text);
        self.emit(ControllerEvent::NarrationStarted {
            cycle,
            text: text.clone(),
        });

        let worker_tx = self.worker_tx.clone();
        let spawned = self.narrator.spawn(text, move |outcome| {
            let _ = worker_tx.send(WorkerMessage::NarrationFinished { cycle, outcome });
        });

        if let Err(e) = spawned {
            error!("Failed to start narration: {}", e);
            self.on_narration_finished(cycle, NarrationOutcome::Failed(e.to_string()));
        }
    }

    fn on_narration_finished(&mut self, cycle: Uuid, outcome: NarrationOutcome) {
        {
            let s = self.state.read();
            if !s.alive || !s.is_narrating(cycle) {
                debug!("Ignoring completion of stale narration {}", cycle);
                return;
            }
        }

        match &outcome {
            NarrationOutcome::Completed => debug!("Narration {} completed", cycle),
            NarrationOutcome::TimedOut => warn!("Narration {} did not finish in time", cycle),
            NarrationOutcome::Failed(e) => warn!("Narration {} failed: {}", cycle, e),
        }

        self.state.write().finish_narration(outcome.clone());
        self.emit(ControllerEvent::NarrationFinished { cycle, outcome });

        if self.state.is_foreground() {
            self.resume_capture();
        } else {
            debug!("Backgrounded, camera stays stopped");
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.close();
        }
    }
}
