//! Replay of recorded detection batches
//!
//! Stands in for a live camera: each line of a recording is one frame, either a
//! JSON array of detected objects or `{"error": "..."}` for a failed frame.
//! Frames are emitted at a fixed interval while the session is started.

use crate::camera::{CameraFacing, CameraSession, Resolution, SessionConfig, SessionFactory};
use crate::detection::types::{DetectedObject, DetectionOutcome};
use crate::detection::DetectionSink;
use crate::{OpticaError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// One recorded frame
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReplayFrame {
    Objects(Vec<DetectedObject>),
    Failure { error: String },
}

impl From<ReplayFrame> for DetectionOutcome {
    fn from(frame: ReplayFrame) -> Self {
        match frame {
            ReplayFrame::Objects(objects) => DetectionOutcome::Objects(objects),
            ReplayFrame::Failure { error } => DetectionOutcome::Failure(error),
        }
    }
}

/// Replay settings
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Recording to play back
    pub path: Option<PathBuf>,

    /// Delay between frames in milliseconds
    pub frame_interval_ms: u64,

    /// Start over when the recording runs out
    pub looped: bool,

    /// Preview size reported when the session has no fixed resolution
    pub preview_size: Resolution,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            path: None,
            frame_interval_ms: 200,
            looped: false,
            preview_size: Resolution::new(640, 480),
        }
    }
}

impl ReplayConfig {
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_frame_interval_ms(mut self, interval: u64) -> Self {
        self.frame_interval_ms = interval.max(1);
        self
    }

    pub fn with_looping(mut self, looped: bool) -> Self {
        self.looped = looped;
        self
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms.max(1))
    }
}

/// A parsed recording
#[derive(Debug, Clone, Default)]
pub struct ReplayRecording {
    frames: Arc<Vec<ReplayFrame>>,
}

impl ReplayRecording {
    pub fn from_frames(frames: Vec<ReplayFrame>) -> Self {
        Self {
            frames: Arc::new(frames),
        }
    }

    /// Load a JSON-lines recording from disk
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            OpticaError::ReplayError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let recording = Self::parse(&content)?;
        info!(
            "Loaded {} recorded frames from {}",
            recording.len(),
            path.display()
        );
        Ok(recording)
    }

    /// Parse JSON lines; blank lines and `#` comments are skipped
    pub fn parse(content: &str) -> Result<Self> {
        let mut frames = Vec::new();

        for (number, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let frame: ReplayFrame = serde_json::from_str(line).map_err(|e| {
                OpticaError::ReplayError(format!("Line {}: {}", number + 1, e))
            })?;
            frames.push(frame);
        }

        Ok(Self::from_frames(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Read-only view of how far playback has got, shared by every session
#[derive(Debug, Clone)]
pub struct ReplayProgress {
    cursor: Arc<AtomicUsize>,
    len: usize,
    looped: bool,
}

impl ReplayProgress {
    /// Number of frames handed out so far (modulo looping)
    pub fn position(&self) -> usize {
        self.cursor.load(Ordering::SeqCst).min(self.len)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once a non-looping recording has emitted its last frame
    pub fn is_exhausted(&self) -> bool {
        !self.looped && self.cursor.load(Ordering::SeqCst) >= self.len
    }
}

/// Builds [`ReplayCamera`] sessions over one recording
///
/// The playback cursor survives rebuilds, so toggling the camera continues
/// the recording rather than restarting it.
pub struct ReplaySessionFactory {
    recording: ReplayRecording,
    cursor: Arc<AtomicUsize>,
    config: ReplayConfig,
}

impl ReplaySessionFactory {
    pub fn new(recording: ReplayRecording, config: ReplayConfig) -> Self {
        Self {
            recording,
            cursor: Arc::new(AtomicUsize::new(0)),
            config,
        }
    }

    pub fn progress(&self) -> ReplayProgress {
        ReplayProgress {
            cursor: Arc::clone(&self.cursor),
            len: self.recording.len(),
            looped: self.config.looped,
        }
    }
}

impl SessionFactory for ReplaySessionFactory {
    fn create(
        &mut self,
        config: &SessionConfig,
        sink: DetectionSink,
    ) -> Result<Box<dyn CameraSession>> {
        let preview = config
            .target_resolution
            .unwrap_or(self.config.preview_size);

        let camera = ReplayCamera::spawn(
            Arc::clone(&self.recording.frames),
            Arc::clone(&self.cursor),
            &self.config,
            config.facing,
            preview,
            sink,
        )?;

        Ok(Box::new(camera))
    }
}

/// A camera session that emits recorded frames
pub struct ReplayCamera {
    facing: CameraFacing,
    preview: Resolution,
    running: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ReplayCamera {
    fn spawn(
        frames: Arc<Vec<ReplayFrame>>,
        cursor: Arc<AtomicUsize>,
        config: &ReplayConfig,
        facing: CameraFacing,
        preview: Resolution,
        sink: DetectionSink,
    ) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));
        let interval = config.frame_interval();
        let looped = config.looped;

        let worker_running = Arc::clone(&running);
        let worker_closed = Arc::clone(&closed);
        let generation = sink.generation();

        let worker = thread::Builder::new()
            .name(format!("replay-camera-{}", generation))
            .spawn(move || {
                debug!("Replay camera {} ({}) ready", generation, facing);
                let len = frames.len();

                while !worker_closed.load(Ordering::SeqCst) {
                    if worker_running.load(Ordering::SeqCst) {
                        let claimed = cursor.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |i| {
                            if i < len {
                                Some(i + 1)
                            } else if looped && len > 0 {
                                Some(1)
                            } else {
                                None
                            }
                        });

                        let index = match claimed {
                            Ok(previous) if previous < len => Some(previous),
                            Ok(_) => Some(0),
                            Err(_) => None,
                        };

                        if let Some(index) = index {
                            sink.deliver(frames[index].clone().into());
                        }
                    }

                    thread::sleep(interval);
                }

                debug!("Replay camera {} closed", generation);
            })
            .map_err(|e| OpticaError::CameraError(format!("Failed to spawn replay worker: {}", e)))?;

        Ok(Self {
            facing,
            preview,
            running,
            closed,
            worker: Some(worker),
        })
    }
}

impl CameraSession for ReplayCamera {
    fn start(&mut self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(OpticaError::CameraError("Session already closed".into()));
        }
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn close(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.closed.store(true, Ordering::SeqCst);

        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Replay camera worker panicked");
            }
        }
    }

    fn preview_size(&self) -> Option<Resolution> {
        Some(self.preview)
    }

    fn facing(&self) -> CameraFacing {
        self.facing
    }
}

impl Drop for ReplayCamera {
    fn drop(&mut self) {
        self.close();
    }
}
