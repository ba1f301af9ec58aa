//! Session controller tests with fake camera, description and speech collaborators
//!
//! Detection outcomes are pushed through the sinks the fake factory captured,
//! and speech only completes when a test says so.

use async_trait::async_trait;
use optica::camera::{CameraFacing, CameraSession, Orientation, Resolution, SessionConfig, SessionFactory};
use optica::describe::{DescriptionClient, DescriptionError};
use optica::detection::{DetectedObject, DetectionOutcome, DetectionSink};
use optica::overlay::{ImageSourceInfo, Overlay};
use optica::session::{
    CameraPhase, Collaborators, ControllerConfig, ControllerEvent, ControllerHandle,
    NarrationMode, SessionController, SkipReason,
};
use optica::settings::{PreferencesFile, StaticPreferences};
use optica::speech::{completion_pair, CompletionSignal, NarrationOutcome, SpeechCompletion, SpeechSink};
use optica::{OpticaError, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const WAIT: Duration = Duration::from_secs(3);

type CameraLog = Arc<Mutex<Vec<String>>>;

struct FakeSession {
    id: u64,
    facing: CameraFacing,
    preview: Resolution,
    log: CameraLog,
}

impl CameraSession for FakeSession {
    fn start(&mut self) -> Result<()> {
        self.log.lock().push(format!("start {}", self.id));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().push(format!("stop {}", self.id));
    }

    fn close(&mut self) {
        self.log.lock().push(format!("close {}", self.id));
    }

    fn preview_size(&self) -> Option<Resolution> {
        Some(self.preview)
    }

    fn facing(&self) -> CameraFacing {
        self.facing
    }
}

#[derive(Clone, Default)]
struct FakeFactory {
    log: CameraLog,
    sinks: Arc<Mutex<Vec<DetectionSink>>>,
    configs: Arc<Mutex<Vec<SessionConfig>>>,
}

impl SessionFactory for FakeFactory {
    fn create(&mut self, config: &SessionConfig, sink: DetectionSink) -> Result<Box<dyn CameraSession>> {
        let id = sink.generation();
        self.log.lock().push(format!("create {} {}", config.facing, id));
        self.configs.lock().push(config.clone());
        self.sinks.lock().push(sink);

        Ok(Box::new(FakeSession {
            id,
            facing: config.facing,
            preview: config.target_resolution.unwrap_or(Resolution::new(640, 480)),
            log: Arc::clone(&self.log),
        }))
    }
}

#[derive(Default)]
struct FakeClient {
    responses: Mutex<VecDeque<std::result::Result<String, DescriptionError>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeClient {
    fn respond(&self, response: std::result::Result<String, DescriptionError>) {
        self.responses.lock().push_back(response);
    }
}

#[async_trait]
impl DescriptionClient for FakeClient {
    async fn describe(&self, names_json: &str) -> std::result::Result<String, DescriptionError> {
        self.calls.lock().push(names_json.to_string());
        self.responses
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok("A cup sits on a wooden chair.".to_string()))
    }
}

/// Speech that only finishes when the test calls `finish_all`
#[derive(Default)]
struct FakeSpeech {
    spoken: Mutex<Vec<String>>,
    pending: Mutex<Vec<CompletionSignal>>,
    shutdowns: AtomicUsize,
}

impl FakeSpeech {
    fn finish_all(&self) {
        for signal in self.pending.lock().drain(..) {
            signal.complete();
        }
    }
}

impl SpeechSink for FakeSpeech {
    fn speak(&self, text: &str) -> Result<SpeechCompletion> {
        if self.shutdowns.load(Ordering::SeqCst) > 0 {
            return Err(OpticaError::SpeechError("shut down".into()));
        }
        self.spoken.lock().push(text.to_string());
        let (signal, completion) = completion_pair();
        self.pending.lock().push(signal);
        Ok(completion)
    }

    fn is_speaking(&self) -> bool {
        !self.pending.lock().is_empty()
    }

    fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct RecordingOverlay {
    sources: Arc<Mutex<Vec<ImageSourceInfo>>>,
    renders: Arc<AtomicUsize>,
}

impl Overlay for RecordingOverlay {
    fn clear(&mut self) {}

    fn set_image_source(&mut self, info: ImageSourceInfo) {
        self.sources.lock().push(info);
    }

    fn render(&mut self, _objects: &[DetectedObject]) {
        self.renders.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    handle: ControllerHandle,
    factory: FakeFactory,
    client: Arc<FakeClient>,
    speech: Arc<FakeSpeech>,
    preferences: StaticPreferences,
    overlay: RecordingOverlay,
    thread: Option<JoinHandle<()>>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(ControllerConfig::new().with_detection_buffer_size(16))
    }

    fn with_config(config: ControllerConfig) -> Self {
        let factory = FakeFactory::default();
        let client = Arc::new(FakeClient::default());
        let speech = Arc::new(FakeSpeech::default());
        let preferences = StaticPreferences::new(PreferencesFile::default());
        let overlay = RecordingOverlay::default();

        let mut collaborators = Collaborators::new(
            Box::new(factory.clone()),
            Box::new(preferences.clone()),
            speech.clone(),
        )
        .with_overlay(Box::new(overlay.clone()));
        if config.narration_mode == NarrationMode::Describe {
            collaborators = collaborators.with_client(client.clone());
        }

        let (controller, handle) = SessionController::new(config, collaborators).unwrap();
        let thread = controller.start().unwrap();

        Self {
            handle,
            factory,
            client,
            speech,
            preferences,
            overlay,
            thread: Some(thread),
        }
    }

    /// Create the session and wait for capture to start
    fn started() -> Self {
        let harness = Self::new();
        harness.handle.create().unwrap();
        harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));
        harness
    }

    fn sink(&self, index: usize) -> DetectionSink {
        self.factory.sinks.lock()[index].clone()
    }

    /// Deliver through the newest session
    fn deliver(&self, outcome: DetectionOutcome) {
        let sink = self.factory.sinks.lock().last().cloned().unwrap();
        assert!(sink.deliver(outcome));
    }

    fn deliver_names(&self, names: &[&str]) {
        let objects = names
            .iter()
            .map(|name| DetectedObject::labeled(*name, 0.9))
            .collect();
        self.deliver(DetectionOutcome::Objects(objects));
    }

    /// Wait for an event matching `pred`, skipping others
    fn expect<F: Fn(&ControllerEvent) -> bool>(&self, pred: F) -> ControllerEvent {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if let Some(event) = self.handle.recv_event_timeout(Duration::from_millis(50)) {
                if pred(&event) {
                    return event;
                }
            }
        }
        panic!("Timed out waiting for event");
    }

    fn wait_until<F: Fn() -> bool>(&self, cond: F) {
        let deadline = Instant::now() + WAIT;
        while Instant::now() < deadline {
            if cond() {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
        panic!("Timed out waiting for condition");
    }

    fn log(&self) -> Vec<String> {
        self.factory.log.lock().clone()
    }

    /// Wait for the narration thread to hand its text to the speech sink
    fn wait_speaking(&self) {
        self.wait_until(|| self.speech.is_speaking());
    }

    fn narrate_cup(&self) {
        self.deliver_names(&["cup"]);
        self.expect(|e| matches!(e, ControllerEvent::NarrationStarted { .. }));
        self.wait_speaking();
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        let _ = self.handle.destroy();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

#[test]
fn test_create_starts_capture() {
    let harness = Harness::started();

    assert_eq!(harness.log(), vec!["create back 1", "start 1"]);
    assert_eq!(harness.handle.state().camera_phase(), CameraPhase::Capturing);
    assert_eq!(harness.handle.state().generation(), 1);
}

#[test]
fn test_unlabeled_batch_does_nothing() {
    let harness = Harness::started();

    harness.deliver(DetectionOutcome::Objects(Vec::new()));
    harness.deliver(DetectionOutcome::Objects(vec![DetectedObject::new(Vec::new())]));
    harness.wait_until(|| harness.handle.state().snapshot().frames_processed == 2);

    assert!(harness.client.calls.lock().is_empty());
    assert_eq!(harness.handle.state().camera_phase(), CameraPhase::Capturing);
    assert!(!harness.log().iter().any(|entry| entry.starts_with("stop")));
}

#[test]
fn test_names_sent_in_order_and_camera_resumes() {
    let harness = Harness::started();

    harness.deliver(DetectionOutcome::Objects(vec![
        DetectedObject::labeled("cup", 0.9),
        DetectedObject::new(Vec::new()),
        DetectedObject::labeled("chair", 0.7),
    ]));

    let event = harness.expect(|e| matches!(e, ControllerEvent::DescriptionRequested { .. }));
    if let ControllerEvent::DescriptionRequested { names, .. } = event {
        assert_eq!(names, vec!["cup", "chair"]);
    }

    harness.expect(|e| matches!(e, ControllerEvent::NarrationStarted { .. }));
    harness.wait_speaking();
    assert_eq!(harness.client.calls.lock().clone(), vec![r#"["cup","chair"]"#]);
    assert_eq!(harness.speech.spoken.lock().clone(), vec!["A cup sits on a wooden chair."]);
    assert_eq!(harness.handle.state().camera_phase(), CameraPhase::Paused);
    assert!(harness.log().contains(&"stop 1".to_string()));

    harness.speech.finish_all();
    let event = harness.expect(|e| matches!(e, ControllerEvent::NarrationFinished { .. }));
    if let ControllerEvent::NarrationFinished { outcome, .. } = event {
        assert_eq!(outcome, NarrationOutcome::Completed);
    }
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));

    // Same session resumed, no rebuild
    assert_eq!(harness.log(), vec!["create back 1", "start 1", "stop 1", "start 1"]);
    let state = harness.handle.state().snapshot();
    assert!(state.cycle.is_idle());
    assert_eq!(state.narrations_completed, 1);
    assert_eq!(state.last_narration.unwrap().text, "A cup sits on a wooden chair.");
}

#[test]
fn test_uninformative_description_is_not_spoken() {
    let harness = Harness::started();
    harness
        .client
        .respond(Ok("The table is EMPTY and there is nothing on it.".into()));

    harness.deliver_names(&["table"]);
    let event = harness.expect(|e| matches!(e, ControllerEvent::NarrationSkipped { .. }));
    if let ControllerEvent::NarrationSkipped { reason, .. } = event {
        assert_eq!(reason, SkipReason::Uninformative);
    }

    assert!(harness.speech.spoken.lock().is_empty());
    assert!(harness.handle.state().is_idle());
    assert_eq!(harness.handle.state().camera_phase(), CameraPhase::Capturing);
    assert!(!harness.log().iter().any(|entry| entry.starts_with("stop")));
}

#[test]
fn test_description_with_one_marker_is_spoken() {
    let harness = Harness::started();
    harness
        .client
        .respond(Ok("An empty mug stands next to a keyboard.".into()));

    harness.narrate_cup();
    assert_eq!(
        harness.speech.spoken.lock().clone(),
        vec!["An empty mug stands next to a keyboard."]
    );
}

#[test]
fn test_malformed_response_skips_narration() {
    let harness = Harness::started();
    harness.client.respond(Err(DescriptionError::MalformedResponse(
        "missing choices".into(),
    )));

    harness.deliver_names(&["cup"]);
    let event = harness.expect(|e| matches!(e, ControllerEvent::NarrationSkipped { .. }));
    if let ControllerEvent::NarrationSkipped { reason, .. } = event {
        assert!(matches!(reason, SkipReason::DescriptionFailed(msg) if msg.contains("missing choices")));
    }
    assert!(harness.speech.spoken.lock().is_empty());
    assert_eq!(harness.handle.state().camera_phase(), CameraPhase::Capturing);

    // The next batch starts a fresh cycle
    harness.narrate_cup();
    assert_eq!(harness.client.calls.lock().len(), 2);
}

#[test]
fn test_transport_error_skips_narration() {
    let harness = Harness::started();
    harness
        .client
        .respond(Err(DescriptionError::Status {
            status: 500,
            body: "upstream down".into(),
        }));

    harness.deliver_names(&["cup"]);
    harness.expect(|e| {
        matches!(
            e,
            ControllerEvent::NarrationSkipped {
                reason: SkipReason::DescriptionFailed(_),
                ..
            }
        )
    });
    assert!(harness.handle.state().is_idle());
}

#[test]
fn test_batches_dropped_while_cycle_in_flight() {
    let harness = Harness::started();
    harness.narrate_cup();

    harness.deliver_names(&["laptop"]);
    harness.wait_until(|| harness.handle.state().snapshot().batches_dropped == 1);

    assert_eq!(harness.client.calls.lock().len(), 1);
    assert_eq!(harness.speech.spoken.lock().len(), 1);
}

#[test]
fn test_detection_failure_posts_notice() {
    let harness = Harness::started();

    harness.deliver(DetectionOutcome::Failure("model not loaded".into()));
    let event = harness.expect(|e| matches!(e, ControllerEvent::Notice(_)));
    if let ControllerEvent::Notice(message) = event {
        assert_eq!(message, "Failed to process. Error: model not loaded");
    }

    assert_eq!(harness.handle.state().camera_phase(), CameraPhase::Capturing);
    assert!(!harness.log().iter().any(|entry| entry.starts_with("stop")));
}

#[test]
fn test_toggle_facing_rebuilds() {
    let harness = Harness::started();

    harness.handle.toggle_facing().unwrap();
    let event = harness.expect(|e| matches!(e, ControllerEvent::SessionStarted { .. }));
    if let ControllerEvent::SessionStarted { facing, generation } = event {
        assert_eq!(facing, CameraFacing::Front);
        assert_eq!(generation, 2);
    }
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));

    assert_eq!(
        harness.log(),
        vec!["create back 1", "start 1", "close 1", "create front 2", "start 2"]
    );
    assert_eq!(harness.handle.state().facing(), CameraFacing::Front);

    harness.handle.toggle_facing().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::SessionStarted { facing: CameraFacing::Back, .. }));
}

#[test]
fn test_stale_generation_ignored() {
    let harness = Harness::started();
    let old_sink = harness.sink(0);

    harness.handle.toggle_facing().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));

    assert!(old_sink.deliver(DetectionOutcome::Objects(vec![DetectedObject::labeled("cup", 0.9)])));
    harness.deliver(DetectionOutcome::Objects(Vec::new()));
    harness.wait_until(|| harness.handle.state().snapshot().frames_processed == 1);

    assert!(harness.client.calls.lock().is_empty());
}

#[test]
fn test_pause_resume_reuses_session() {
    let harness = Harness::started();

    harness.handle.pause().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::CameraStopped));
    assert_eq!(harness.handle.state().camera_phase(), CameraPhase::Idle);
    assert!(!harness.handle.state().is_foreground());

    harness.handle.resume().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));
    assert_eq!(harness.log(), vec!["create back 1", "start 1", "stop 1", "start 1"]);
}

#[test]
fn test_resume_with_changed_preferences_rebuilds() {
    let harness = Harness::started();

    harness.handle.pause().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::CameraStopped));

    harness
        .preferences
        .set_target_resolution(CameraFacing::Back, Some(Resolution::new(1280, 720)));
    harness.handle.resume().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::SessionStarted { generation: 2, .. }));
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));

    assert_eq!(
        harness.log(),
        vec!["create back 1", "start 1", "stop 1", "close 1", "create back 2", "start 2"]
    );
    let configs = harness.factory.configs.lock();
    assert_eq!(configs[1].target_resolution, Some(Resolution::new(1280, 720)));
}

#[test]
fn test_narration_end_rebuilds_when_preferences_changed() {
    let harness = Harness::started();
    harness.narrate_cup();

    harness
        .preferences
        .set_target_resolution(CameraFacing::Back, Some(Resolution::new(1280, 720)));
    harness.speech.finish_all();

    harness.expect(|e| matches!(e, ControllerEvent::SessionStarted { generation: 2, .. }));
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));
    assert_eq!(
        harness.log(),
        vec!["create back 1", "start 1", "stop 1", "close 1", "create back 2", "start 2"]
    );
    let configs = harness.factory.configs.lock();
    assert_eq!(configs.len(), 2);
    assert_eq!(configs[1].target_resolution, Some(Resolution::new(1280, 720)));
}

#[test]
fn test_pause_during_narration_keeps_camera_stopped() {
    let harness = Harness::started();
    harness.narrate_cup();

    harness.handle.pause().unwrap();
    harness.wait_until(|| !harness.handle.state().is_foreground());

    harness.speech.finish_all();
    harness.expect(|e| matches!(e, ControllerEvent::NarrationFinished { .. }));
    assert_eq!(harness.handle.state().camera_phase(), CameraPhase::Idle);
    assert_eq!(harness.log(), vec!["create back 1", "start 1", "stop 1"]);

    harness.handle.resume().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));
    assert_eq!(harness.log().last().unwrap(), "start 1");
}

#[test]
fn test_rebuild_during_narration_defers_start() {
    let harness = Harness::started();
    harness.narrate_cup();

    harness.handle.toggle_facing().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::SessionStarted { generation: 2, .. }));
    harness.wait_until(|| harness.handle.state().camera_phase() == CameraPhase::Paused);
    assert_eq!(harness.log().last().unwrap(), "create front 2");

    harness.speech.finish_all();
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));
    assert_eq!(harness.log().last().unwrap(), "start 2");
}

#[test]
fn test_destroy_during_narration_does_not_resume() {
    let harness = Harness::started();
    harness.narrate_cup();

    harness.handle.destroy().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::Destroyed));
    assert_eq!(harness.speech.shutdowns.load(Ordering::SeqCst), 1);
    assert!(!harness.handle.state().is_alive());

    harness.speech.finish_all();
    thread::sleep(Duration::from_millis(100));

    assert_eq!(harness.log(), vec!["create back 1", "start 1", "stop 1", "close 1"]);
}

#[test]
fn test_overlay_geometry_set_once_per_session() {
    let harness = Harness::started();

    harness.deliver(DetectionOutcome::Objects(Vec::new()));
    harness.deliver(DetectionOutcome::Objects(Vec::new()));
    harness.wait_until(|| harness.overlay.renders.load(Ordering::SeqCst) == 2);

    // Portrait swaps the 640x480 preview
    assert_eq!(
        harness.overlay.sources.lock().clone(),
        vec![ImageSourceInfo {
            width: 480,
            height: 640,
            flipped: false
        }]
    );

    harness.handle.toggle_facing().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));
    harness.deliver(DetectionOutcome::Objects(Vec::new()));
    harness.wait_until(|| harness.overlay.sources.lock().len() == 2);
    assert!(harness.overlay.sources.lock()[1].flipped);
}

#[test]
fn test_orientation_change_resends_geometry() {
    let harness = Harness::started();

    harness.deliver(DetectionOutcome::Objects(Vec::new()));
    harness.wait_until(|| harness.overlay.sources.lock().len() == 1);

    harness.handle.set_orientation(Orientation::Landscape).unwrap();
    harness.wait_until(|| harness.handle.state().snapshot().orientation == Orientation::Landscape);
    harness.deliver(DetectionOutcome::Objects(Vec::new()));
    harness.wait_until(|| harness.overlay.sources.lock().len() == 2);

    // Landscape keeps the sensor axes
    assert_eq!(
        harness.overlay.sources.lock()[1],
        ImageSourceInfo {
            width: 640,
            height: 480,
            flipped: false
        }
    );

    // Same orientation again is a no-op
    harness.handle.set_orientation(Orientation::Landscape).unwrap();
    harness.deliver(DetectionOutcome::Objects(Vec::new()));
    harness.wait_until(|| harness.overlay.renders.load(Ordering::SeqCst) == 3);
    assert_eq!(harness.overlay.sources.lock().len(), 2);
    assert_eq!(harness.handle.state().generation(), 1);
}

#[test]
fn test_labels_mode_speaks_names_without_network() {
    let harness = Harness::with_config(
        ControllerConfig::new()
            .with_narration_mode(NarrationMode::Labels)
            .with_orientation(Orientation::Landscape)
            .with_detection_buffer_size(16),
    );
    harness.handle.create().unwrap();
    harness.expect(|e| matches!(e, ControllerEvent::CameraStarted));

    harness.deliver_names(&["cup", "chair"]);
    let event = harness.expect(|e| matches!(e, ControllerEvent::NarrationStarted { .. }));
    if let ControllerEvent::NarrationStarted { text, .. } = event {
        assert_eq!(text, "cup, chair");
    }
    assert!(harness.client.calls.lock().is_empty());
    assert_eq!(harness.handle.state().snapshot().requests_issued, 0);
}

#[test]
fn test_describe_mode_requires_client() {
    let collaborators = Collaborators::new(
        Box::new(FakeFactory::default()),
        Box::new(StaticPreferences::default()),
        Arc::new(FakeSpeech::default()),
    );

    let result = SessionController::new(ControllerConfig::default(), collaborators);
    assert!(matches!(result, Err(OpticaError::ConfigError(_))));
}
