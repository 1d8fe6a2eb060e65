//! LegalHelp Speech crate - voice-to-text capture for the chat widget.
//!
//! Wraps an optional platform speech-recognition device behind the
//! `SpeechRecognizer` trait. The `SpeechCaptureAdapter` runs single-shot,
//! language-bound capture sessions through a strict state machine
//! (Idle -> Listening -> Idle) and folds transcripts into the draft input.

pub mod adapter;
pub mod recognizer;
pub mod state;

pub use adapter::{CaptureApplied, CaptureStart, SpeechCaptureAdapter};
pub use recognizer::{
    CaptureEvent, CaptureOutcome, CaptureSessionId, CaptureSink, RecognitionSettings,
    ScriptHandle, ScriptedRecognizer, SpeechRecognizer,
};
pub use state::CaptureState;
