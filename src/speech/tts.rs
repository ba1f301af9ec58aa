//! Text-to-speech with sherpa-rs (VITS models)
//!
//! The engine and the audio output live on one worker thread; `speak` hands
//! the text over and returns a completion that fires when playback ends or is
//! flushed by a newer utterance.

use serde::Deserialize;

/// Configuration for the TTS engine
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TTSConfig {
    /// Path to the ONNX model file
    pub model_path: String,

    /// Path to the tokens file
    pub tokens_path: String,

    /// Path to the lexicon file (optional for some models)
    pub lexicon_path: Option<String>,

    /// Path to the espeak-ng data directory (optional)
    pub data_dir: Option<String>,

    /// Length scale for speech rate (1.0 = normal, <1.0 = faster, >1.0 = slower)
    pub length_scale: f32,

    /// Noise scale for variation
    pub noise_scale: f32,

    /// Noise scale width
    pub noise_scale_w: f32,

    /// Speaker ID for multi-speaker models
    pub speaker_id: i32,
}

impl Default for TTSConfig {
    fn default() -> Self {
        Self {
            model_path: String::new(),
            tokens_path: String::new(),
            lexicon_path: None,
            data_dir: None,
            length_scale: 1.0,
            noise_scale: 0.667,
            noise_scale_w: 0.8,
            speaker_id: 0,
        }
    }
}

impl TTSConfig {
    pub fn new(model_path: impl Into<String>, tokens_path: impl Into<String>) -> Self {
        Self {
            model_path: model_path.into(),
            tokens_path: tokens_path.into(),
            ..Default::default()
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<String>) -> Self {
        self.data_dir = Some(data_dir.into());
        self
    }

    pub fn with_speaker(mut self, speaker_id: i32) -> Self {
        self.speaker_id = speaker_id;
        self
    }

    /// Set the speech rate (higher is faster)
    pub fn with_speed(mut self, speed: f32) -> Self {
        self.length_scale = 1.0 / speed.max(0.1);
        self
    }

    /// Check that the model files are present
    pub fn validate(&self) -> Result<(), String> {
        if self.model_path.is_empty() {
            return Err("TTS model path is required".to_string());
        }
        if !std::path::Path::new(&self.model_path).exists() {
            return Err(format!("TTS model not found: {}", self.model_path));
        }
        if !std::path::Path::new(&self.tokens_path).exists() {
            return Err(format!("TTS tokens file not found: {}", self.tokens_path));
        }
        Ok(())
    }
}

#[cfg(feature = "tts")]
pub use engine::SherpaSpeech;

#[cfg(any(feature = "tts", test))]
use crate::speech::sink::CompletionSignal;
#[cfg(any(feature = "tts", test))]
use crossbeam_channel::Receiver;
#[cfg(any(feature = "tts", test))]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(any(feature = "tts", test))]
enum SpeechCommand {
    Speak {
        text: String,
        signal: CompletionSignal,
    },
    Shutdown,
}

/// Play queued utterances until shutdown
///
/// `play` returns a command that arrived during playback and interrupted it.
/// Only this loop raises `speaking`, when it takes an utterance off the queue.
#[cfg(any(feature = "tts", test))]
fn run_commands<F>(command_rx: &Receiver<SpeechCommand>, speaking: &AtomicBool, mut play: F)
where
    F: FnMut(&str, &Receiver<SpeechCommand>) -> Option<SpeechCommand>,
{
    let mut next = None;
    loop {
        let command = match next.take() {
            Some(command) => command,
            None => match command_rx.recv() {
                Ok(command) => command,
                Err(_) => break,
            },
        };

        match command {
            SpeechCommand::Speak { text, signal } => {
                speaking.store(true, Ordering::SeqCst);
                next = play(&text, command_rx);
                if next.is_none() {
                    speaking.store(false, Ordering::SeqCst);
                }
                signal.complete();
            }
            SpeechCommand::Shutdown => break,
        }
    }

    speaking.store(false, Ordering::SeqCst);
}

#[cfg(feature = "tts")]
mod engine {
    use super::{run_commands, SpeechCommand, TTSConfig};
    use crate::speech::playback::{resample_mono, AudioOutput};
    use crate::speech::sink::{completion_pair, SpeechCompletion, SpeechSink};
    use crate::speech::text::normalize_text_for_tts;
    use crate::{OpticaError, Result};
    use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
    use parking_lot::Mutex;
    use sherpa_rs::tts::{VitsTts, VitsTtsConfig};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tracing::{debug, error, info, warn};

    /// Speech sink backed by a VITS model
    pub struct SherpaSpeech {
        command_tx: Sender<SpeechCommand>,
        speaking: Arc<AtomicBool>,
        worker: Mutex<Option<JoinHandle<()>>>,
    }

    impl SherpaSpeech {
        /// Load the model and open the default audio output on a worker thread
        pub fn new(config: TTSConfig) -> Result<Self> {
            config.validate().map_err(OpticaError::ConfigError)?;

            let (command_tx, command_rx) = unbounded();
            let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);
            let speaking = Arc::new(AtomicBool::new(false));
            let worker_speaking = Arc::clone(&speaking);

            let worker = thread::Builder::new()
                .name("tts".into())
                .spawn(move || run_worker(config, command_rx, ready_tx, worker_speaking))
                .map_err(|e| OpticaError::SpeechError(format!("Failed to spawn TTS worker: {}", e)))?;

            // Surface model/device errors to the caller
            match ready_rx.recv() {
                Ok(Ok(())) => {}
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(OpticaError::SpeechError("TTS worker exited during startup".into()))
                }
            }

            Ok(Self {
                command_tx,
                speaking,
                worker: Mutex::new(Some(worker)),
            })
        }
    }

    impl SpeechSink for SherpaSpeech {
        fn speak(&self, text: &str) -> Result<SpeechCompletion> {
            let (signal, completion) = completion_pair();
            self.command_tx
                .send(SpeechCommand::Speak {
                    text: text.to_string(),
                    signal,
                })
                .map_err(|_| OpticaError::SpeechError("Speech engine is shut down".into()))?;
            Ok(completion)
        }

        fn is_speaking(&self) -> bool {
            self.speaking.load(Ordering::SeqCst)
        }

        fn shutdown(&self) {
            let _ = self.command_tx.send(SpeechCommand::Shutdown);
            if let Some(worker) = self.worker.lock().take() {
                if worker.join().is_err() {
                    warn!("TTS worker panicked");
                }
            }
            self.speaking.store(false, Ordering::SeqCst);
        }
    }

    impl Drop for SherpaSpeech {
        fn drop(&mut self) {
            self.shutdown();
        }
    }

    fn run_worker(
        config: TTSConfig,
        command_rx: Receiver<SpeechCommand>,
        ready_tx: Sender<Result<()>>,
        speaking: Arc<AtomicBool>,
    ) {
        info!("Loading VITS TTS model from: {}", config.model_path);

        let vits_config = VitsTtsConfig {
            model: config.model_path.clone(),
            tokens: config.tokens_path.clone(),
            lexicon: config.lexicon_path.clone().unwrap_or_default(),
            data_dir: config.data_dir.clone().unwrap_or_default(),
            length_scale: config.length_scale,
            noise_scale: config.noise_scale,
            noise_scale_w: config.noise_scale_w,
            ..Default::default()
        };
        let mut tts = VitsTts::new(vits_config);

        let output = match AudioOutput::new() {
            Ok(output) => output,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let _ = ready_tx.send(Ok(()));
        info!("TTS engine ready");

        run_commands(&command_rx, &speaking, |text, command_rx| {
            play(&mut tts, &output, config.speaker_id, text, command_rx)
        });

        info!("TTS worker stopped");
    }

    /// Synthesize and play one utterance
    ///
    /// Returns a command that arrived during playback and interrupted it.
    fn play(
        tts: &mut VitsTts,
        output: &AudioOutput,
        speaker_id: i32,
        text: &str,
        command_rx: &Receiver<SpeechCommand>,
    ) -> Option<SpeechCommand> {
        let normalized = normalize_text_for_tts(text);
        if normalized.is_empty() {
            return None;
        }

        debug!("Synthesizing: {}", normalized);
        let audio = match tts.create(&normalized, speaker_id, 1.0) {
            Ok(audio) => audio,
            Err(e) => {
                error!("Synthesis failed: {}", e);
                return None;
            }
        };

        let samples = match resample_mono(&audio.samples, audio.sample_rate as u32, output.sample_rate()) {
            Ok(samples) => samples,
            Err(e) => {
                error!("{}", e);
                return None;
            }
        };
        output.play(samples);

        while output.remaining() > 0 {
            match command_rx.recv_timeout(Duration::from_millis(20)) {
                Ok(command) => {
                    // Queue flush: a newer utterance or shutdown cuts this one short
                    output.flush();
                    return Some(command);
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    output.flush();
                    return Some(SpeechCommand::Shutdown);
                }
            }
        }

        None
    }
}
