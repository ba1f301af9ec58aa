//! Speech output seam
//!
//! A [`SpeechSink`] starts speaking and hands back a [`SpeechCompletion`] that
//! fires when playback ends, so callers wait on a signal instead of polling.

use crate::speech::text::normalize_text_for_tts;
use crate::{OpticaError, Result};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Text-to-speech output
pub trait SpeechSink: Send + Sync {
    /// Start speaking `text`, interrupting anything already playing
    fn speak(&self, text: &str) -> Result<SpeechCompletion>;

    fn is_speaking(&self) -> bool;

    /// Release the engine; later calls to `speak` fail
    fn shutdown(&self);
}

/// Fired by the sink when an utterance ends
///
/// Dropping the signal without calling [`CompletionSignal::complete`] also
/// counts as completion, so an interrupted utterance never leaves a waiter hanging.
#[derive(Debug)]
pub struct CompletionSignal {
    tx: Sender<()>,
}

impl CompletionSignal {
    pub fn complete(self) {
        let _ = self.tx.send(());
    }
}

/// Waitable end of an utterance
#[derive(Debug)]
pub struct SpeechCompletion {
    rx: Receiver<()>,
}

impl SpeechCompletion {
    /// A completion that has already fired
    pub fn completed() -> Self {
        let (signal, completion) = completion_pair();
        signal.complete();
        completion
    }

    /// Block until the utterance ends
    ///
    /// Returns false if `timeout` elapsed first.
    pub fn wait(self, timeout: Option<Duration>) -> bool {
        match timeout {
            Some(timeout) => match self.rx.recv_timeout(timeout) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
                Err(RecvTimeoutError::Timeout) => false,
            },
            None => {
                let _ = self.rx.recv();
                true
            }
        }
    }
}

/// A linked signal/completion pair
pub fn completion_pair() -> (CompletionSignal, SpeechCompletion) {
    let (tx, rx) = bounded(1);
    (CompletionSignal { tx }, SpeechCompletion { rx })
}

/// Speech sink that logs instead of playing audio
///
/// Playback time is simulated from the word count, so the camera pause around
/// narration behaves as it would with a real engine.
pub struct ConsoleSpeech {
    per_word: Duration,
    utterance: Arc<AtomicU64>,
    speaking: Arc<AtomicBool>,
    shut_down: AtomicBool,
}

impl ConsoleSpeech {
    pub fn new(per_word: Duration) -> Self {
        Self {
            per_word,
            utterance: Arc::new(AtomicU64::new(0)),
            speaking: Arc::new(AtomicBool::new(false)),
            shut_down: AtomicBool::new(false),
        }
    }

    /// Simulated duration from a speaking rate in words per minute
    pub fn with_words_per_minute(words_per_minute: u32) -> Self {
        let per_word = Duration::from_millis(60_000 / u64::from(words_per_minute.max(1)));
        Self::new(per_word)
    }
}

impl Default for ConsoleSpeech {
    fn default() -> Self {
        Self::with_words_per_minute(180)
    }
}

impl SpeechSink for ConsoleSpeech {
    fn speak(&self, text: &str) -> Result<SpeechCompletion> {
        if self.shut_down.load(Ordering::SeqCst) {
            return Err(OpticaError::SpeechError("Speech engine is shut down".into()));
        }

        let normalized = normalize_text_for_tts(text);
        let words = normalized.split_whitespace().count() as u32;
        let duration = self.per_word * words;

        // Newer utterances flush older ones
        let id = self.utterance.fetch_add(1, Ordering::SeqCst) + 1;
        self.speaking.store(true, Ordering::SeqCst);
        info!("Speaking: {}", normalized);

        let (signal, completion) = completion_pair();
        let current = Arc::clone(&self.utterance);
        let speaking = Arc::clone(&self.speaking);

        thread::Builder::new()
            .name("console-speech".into())
            .spawn(move || {
                let deadline = Instant::now() + duration;
                while current.load(Ordering::SeqCst) == id {
                    let now = Instant::now();
                    if now >= deadline {
                        break;
                    }
                    thread::sleep((deadline - now).min(Duration::from_millis(10)));
                }

                if current.load(Ordering::SeqCst) == id {
                    speaking.store(false, Ordering::SeqCst);
                } else {
                    debug!("Utterance {} interrupted", id);
                }
                signal.complete();
            })
            .map_err(|e| OpticaError::SpeechError(format!("Failed to spawn speech thread: {}", e)))?;

        Ok(completion)
    }

    fn is_speaking(&self) -> bool {
        self.speaking.load(Ordering::SeqCst)
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
        self.utterance.fetch_add(1, Ordering::SeqCst);
        self.speaking.store(false, Ordering::SeqCst);
    }
}
