//! Speech output
//!
//! - **sink**: the [`SpeechSink`] seam, completion signals and a console sink
//! - **narrator**: speaks a description on its own thread and reports back
//! - **text**: cleanup before synthesis
//! - **tts**: sherpa-rs VITS engine (behind the `tts` feature)
//! - **playback**: cpal output and resampling for the engine

pub mod narrator;
#[cfg(feature = "tts")]
pub mod playback;
pub mod sink;
pub mod text;
pub mod tts;

pub use narrator::{is_uninformative, NarrationOutcome, Narrator};
pub use sink::{completion_pair, CompletionSignal, ConsoleSpeech, SpeechCompletion, SpeechSink};
pub use text::normalize_text_for_tts;
pub use tts::TTSConfig;

#[cfg(feature = "tts")]
pub use tts::SherpaSpeech;
