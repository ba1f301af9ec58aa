//! Narration worker
//!
//! Speaks one text on a dedicated thread, waits for the sink's completion
//! signal and reports the outcome through a callback.

use crate::describe::UNINFORMATIVE_MARKERS;
use crate::speech::sink::SpeechSink;
use crate::{OpticaError, Result};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How a narration ended
#[derive(Debug, Clone, PartialEq)]
pub enum NarrationOutcome {
    /// Playback finished
    Completed,
    /// Playback did not finish within the completion timeout
    TimedOut,
    /// The sink refused the text
    Failed(String),
}

/// True when a description says nothing was seen
///
/// Matches case-insensitively and requires every marker to be present.
pub fn is_uninformative(text: &str) -> bool {
    let lower = text.to_lowercase();
    UNINFORMATIVE_MARKERS
        .iter()
        .all(|marker| lower.contains(marker))
}

pub struct Narrator {
    sink: Arc<dyn SpeechSink>,
    completion_timeout: Option<Duration>,
}

impl Narrator {
    pub fn new(sink: Arc<dyn SpeechSink>, completion_timeout: Option<Duration>) -> Self {
        Self {
            sink,
            completion_timeout,
        }
    }

    /// Speak `text` on a new thread and call `on_finished` when done
    ///
    /// `on_finished` runs on the narration thread.
    pub fn spawn<F>(&self, text: String, on_finished: F) -> Result<()>
    where
        F: FnOnce(NarrationOutcome) + Send + 'static,
    {
        let sink = Arc::clone(&self.sink);
        let timeout = self.completion_timeout;

        thread::Builder::new()
            .name("narration".into())
            .spawn(move || {
                let started = Instant::now();

                let outcome = match sink.speak(&text) {
                    Ok(completion) => {
                        if completion.wait(timeout) {
                            NarrationOutcome::Completed
                        } else {
                            NarrationOutcome::TimedOut
                        }
                    }
                    Err(e) => {
                        warn!("Speech sink rejected narration: {}", e);
                        NarrationOutcome::Failed(e.to_string())
                    }
                };

                debug!(
                    "Narration ended after {}ms: {:?}",
                    started.elapsed().as_millis(),
                    outcome
                );
                on_finished(outcome);
            })
            .map_err(|e| {
                OpticaError::SpeechError(format!("Failed to spawn narration thread: {}", e))
            })?;

        Ok(())
    }

    pub fn is_speaking(&self) -> bool {
        self.sink.is_speaking()
    }

    pub fn shutdown(&self) {
        self.sink.shutdown();
    }
}
