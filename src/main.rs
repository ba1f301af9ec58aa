//! Optica - narrates what the camera sees
//!
//! Plays back a detection recording through the session controller. Type
//! `flip`, `pause`, `resume` or `quit` on stdin while it runs.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use optica::camera::CameraFacing;
use optica::config::AppConfig;
use optica::describe::{DescriptionClient, HttpDescriptionClient};
use optica::detection::{ReplayRecording, ReplaySessionFactory};
use optica::session::{
    Collaborators, ControllerCommand, ControllerEvent, ControllerHandle, NarrationMode,
    SessionController,
};
use optica::settings::{FilePreferences, Preferences, PreferencesFile, StaticPreferences};
use optica::speech::{ConsoleSpeech, SpeechSink, TTSConfig};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Narrate detected objects with a remote scene description and text-to-speech
#[derive(Parser, Debug)]
#[command(name = "optica")]
#[command(version)]
#[command(about = "Narrates what the camera sees", long_about = None)]
struct Args {
    /// Configuration file (defaults to <config dir>/optica/optica.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Camera/detector preferences file, re-read on every resume
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// Detection recording to play back (JSON lines)
    #[arg(short, long)]
    replay: Option<PathBuf>,

    /// Start with the front camera
    #[arg(long)]
    front: bool,

    /// Speak object names instead of asking for a description
    #[arg(long)]
    labels_only: bool,

    /// Delay between replayed frames
    #[arg(long)]
    frame_interval_ms: Option<u64>,

    /// Loop the recording
    #[arg(long = "loop")]
    looped: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "optica=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    info!("Starting Optica");

    let replay_path = config
        .replay
        .path
        .clone()
        .ok_or_else(|| anyhow!("No detection recording: pass --replay or set replay.path"))?;
    let recording = ReplayRecording::load(&replay_path)
        .with_context(|| format!("Failed to load {}", replay_path.display()))?;
    info!("Loaded {} frames from {}", recording.len(), replay_path.display());

    let factory = ReplaySessionFactory::new(recording, config.replay.clone());
    let progress = factory.progress();

    let preferences: Box<dyn Preferences> = match &args.settings {
        Some(path) => Box::new(FilePreferences::new(path)),
        None => Box::new(StaticPreferences::new(PreferencesFile::default())),
    };

    let speech = build_speech(&config)?;
    let mut collaborators = Collaborators::new(Box::new(factory), preferences, speech);

    if config.narration.mode == NarrationMode::Describe {
        let client: Arc<dyn DescriptionClient> =
            Arc::new(HttpDescriptionClient::new(config.description.clone())?);
        collaborators = collaborators.with_client(client);
    }

    let (controller, handle) = SessionController::new(config.controller_config(), collaborators)?;
    let controller_thread = controller.start()?;
    handle.create()?;

    spawn_stdin_reader(handle.clone());

    // Replay ends once the recording is exhausted and the last cycle is done
    let settle = Duration::from_millis(config.replay.frame_interval_ms * 2 + 200);
    let mut idle_since: Option<Instant> = None;
    let mut destroy_sent = false;

    loop {
        if let Some(event) = handle.recv_event_timeout(Duration::from_millis(100)) {
            log_event(&event);
            if matches!(event, ControllerEvent::Destroyed) {
                break;
            }
        }

        if config.replay.looped || destroy_sent {
            continue;
        }

        let state = handle.state();
        if progress.is_exhausted() && state.is_idle() && state.is_alive() {
            let since = *idle_since.get_or_insert_with(Instant::now);
            if since.elapsed() >= settle {
                info!("Recording finished");
                handle.destroy()?;
                destroy_sent = true;
            }
        } else {
            idle_since = None;
        }
    }

    if controller_thread.join().is_err() {
        warn!("Controller thread panicked");
    }

    let snapshot = handle.state().snapshot();
    info!(
        "Processed {} frames, {} descriptions requested, {} narrations, {} batches dropped",
        snapshot.frames_processed,
        snapshot.requests_issued,
        snapshot.narrations_completed,
        snapshot.batches_dropped
    );

    Ok(())
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load_or_default(args.config.as_deref())?;

    if let Some(path) = &args.replay {
        config.replay.path = Some(path.clone());
    }
    if let Some(interval) = args.frame_interval_ms {
        config.replay.frame_interval_ms = interval;
    }
    if args.looped {
        config.replay.looped = true;
    }
    if args.front {
        config.camera.facing = CameraFacing::Front;
    }
    if args.labels_only {
        config.narration.mode = NarrationMode::Labels;
    }

    config.validate().map_err(|e| anyhow!("Invalid configuration: {}", e))?;
    Ok(config)
}

fn build_speech(config: &AppConfig) -> Result<Arc<dyn SpeechSink>> {
    match &config.tts {
        Some(tts) => voice(tts),
        None => {
            info!("No TTS model configured, narrating to the log");
            Ok(Arc::new(ConsoleSpeech::with_words_per_minute(
                config.narration.words_per_minute,
            )))
        }
    }
}

#[cfg(feature = "tts")]
fn voice(tts: &TTSConfig) -> Result<Arc<dyn SpeechSink>> {
    Ok(Arc::new(optica::speech::SherpaSpeech::new(tts.clone())?))
}

#[cfg(not(feature = "tts"))]
fn voice(tts: &TTSConfig) -> Result<Arc<dyn SpeechSink>> {
    warn!(
        "Built without the `tts` feature, ignoring voice {}",
        tts.model_path
    );
    Ok(Arc::new(ConsoleSpeech::default()))
}

fn spawn_stdin_reader(handle: ControllerHandle) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else {
                break;
            };

            let command = match line.trim() {
                "" => continue,
                "flip" => ControllerCommand::ToggleFacing,
                "pause" => ControllerCommand::Pause,
                "resume" => ControllerCommand::Resume,
                "quit" | "exit" => ControllerCommand::Destroy,
                other => {
                    warn!("Unknown command: {} (flip, pause, resume, quit)", other);
                    continue;
                }
            };

            let quit = matches!(command, ControllerCommand::Destroy);
            if handle.send_command(command).is_err() || quit {
                break;
            }
        }
    });
}

fn log_event(event: &ControllerEvent) {
    match event {
        ControllerEvent::SessionStarted { facing, generation } => {
            info!("Session {} started ({} camera)", generation, facing)
        }
        ControllerEvent::DescriptionRequested { names, .. } => {
            info!("Describing {}", names.join(", "))
        }
        ControllerEvent::NarrationStarted { text, .. } => info!("Narration: {}", text),
        ControllerEvent::NarrationSkipped { reason, .. } => {
            info!("Narration skipped: {:?}", reason)
        }
        ControllerEvent::Notice(message) => warn!("{}", message),
        other => tracing::debug!("{:?}", other),
    }
}
