//! Speech-recognition capability boundary.
//!
//! A `SpeechRecognizer` is the platform device: it is started for one
//! session with fixed settings and reports exactly one terminal outcome for
//! that session through the sink it was given. The adapter never touches the
//! device outside `start` and `stop`.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use uuid::Uuid;

use legalhelp_core::error::LegalHelpError;
use legalhelp_core::types::LanguageCode;

/// Identifies one capture session, from start to stop or error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CaptureSessionId(pub Uuid);

impl CaptureSessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CaptureSessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CaptureSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Recognition settings handed to the device on every start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecognitionSettings {
    /// Locale to recognise.
    pub lang: LanguageCode,
    /// Keep listening after the first result.
    pub continuous: bool,
    /// Report partial hypotheses before the final one.
    pub interim_results: bool,
}

impl RecognitionSettings {
    /// Single-shot, final-results-only settings for `lang`.
    pub fn single_shot(lang: LanguageCode) -> Self {
        Self {
            lang,
            continuous: false,
            interim_results: false,
        }
    }
}

/// Terminal result of a capture session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// Final transcript of what was said.
    Transcript(String),
    /// Recognition failed (no speech, device lost, permission denied...).
    Failed(String),
}

/// Outcome tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    pub session: CaptureSessionId,
    pub outcome: CaptureOutcome,
}

/// Channel through which a device reports capture outcomes.
pub type CaptureSink = mpsc::UnboundedSender<CaptureEvent>;

/// A platform speech-recognition device.
pub trait SpeechRecognizer: Send {
    /// Open a capture session. The outcome is delivered later through `sink`.
    fn start(
        &mut self,
        settings: &RecognitionSettings,
        session: CaptureSessionId,
        sink: CaptureSink,
    ) -> Result<(), LegalHelpError>;

    /// Close the current session, if any. Must be safe to call repeatedly.
    fn stop(&mut self);
}

// =============================================================================
// Scripted recognizer
// =============================================================================

#[derive(Debug, Default)]
struct Script {
    queue: VecDeque<CaptureOutcome>,
    starts: usize,
    stops: usize,
    open: bool,
    last_settings: Option<RecognitionSettings>,
    pending: Option<AbortHandle>,
}

/// Recognizer that replays queued outcomes instead of listening.
///
/// Each `start` takes the next queued outcome and reports it after the
/// configured delay. With nothing queued the session stays open until
/// stopped, like a user who never speaks. A transcript leaves the session
/// open until `stop`; an error closes it device-side. Outcomes are timed on
/// the tokio runtime current at construction, or the caller's; `start`
/// fails when neither exists. Used by the terminal front end to simulate
/// voice input, and by tests.
#[derive(Debug, Clone)]
pub struct ScriptedRecognizer {
    script: Arc<Mutex<Script>>,
    delay: Duration,
    runtime: Option<Handle>,
}

impl ScriptedRecognizer {
    pub fn new(delay: Duration) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script::default())),
            delay,
            runtime: Handle::try_current().ok(),
        }
    }

    /// Handle for queueing outcomes and inspecting device usage after the
    /// recognizer has been handed to an adapter.
    pub fn handle(&self) -> ScriptHandle {
        ScriptHandle {
            script: Arc::clone(&self.script),
        }
    }
}

impl SpeechRecognizer for ScriptedRecognizer {
    fn start(
        &mut self,
        settings: &RecognitionSettings,
        session: CaptureSessionId,
        sink: CaptureSink,
    ) -> Result<(), LegalHelpError> {
        let runtime = self
            .runtime
            .clone()
            .or_else(|| Handle::try_current().ok())
            .ok_or_else(|| LegalHelpError::Capture("no async runtime for capture".to_string()))?;

        let mut script = self
            .script
            .lock()
            .map_err(|e| LegalHelpError::Capture(format!("script lock poisoned: {}", e)))?;

        if script.open {
            return Err(LegalHelpError::Capture(
                "recognizer already has an open session".to_string(),
            ));
        }

        script.starts += 1;
        script.open = true;
        script.last_settings = Some(*settings);

        if let Some(outcome) = script.queue.pop_front() {
            let delay = self.delay;
            let shared = Arc::clone(&self.script);
            let task = runtime.spawn(async move {
                tokio::time::sleep(delay).await;
                if matches!(outcome, CaptureOutcome::Failed(_)) {
                    if let Ok(mut script) = shared.lock() {
                        script.open = false;
                        script.pending = None;
                    }
                }
                let _ = sink.send(CaptureEvent { session, outcome });
            });
            script.pending = Some(task.abort_handle());
        }
        Ok(())
    }

    fn stop(&mut self) {
        if let Ok(mut script) = self.script.lock() {
            if let Some(task) = script.pending.take() {
                task.abort();
            }
            if script.open {
                script.open = false;
                script.stops += 1;
            }
        }
    }
}

/// Shared view of a `ScriptedRecognizer`.
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    script: Arc<Mutex<Script>>,
}

impl ScriptHandle {
    fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> Option<T> {
        self.script.lock().ok().map(|mut s| f(&mut s))
    }

    pub fn push_transcript(&self, text: impl Into<String>) {
        let text = text.into();
        self.with(|s| s.queue.push_back(CaptureOutcome::Transcript(text)));
    }

    pub fn push_error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.with(|s| s.queue.push_back(CaptureOutcome::Failed(reason)));
    }

    /// Number of sessions opened on the device.
    pub fn starts(&self) -> usize {
        self.with(|s| s.starts).unwrap_or_default()
    }

    /// Number of open sessions closed through `stop`.
    pub fn stops(&self) -> usize {
        self.with(|s| s.stops).unwrap_or_default()
    }

    /// Whether the device currently holds an open session.
    pub fn is_open(&self) -> bool {
        self.with(|s| s.open).unwrap_or_default()
    }

    pub fn last_settings(&self) -> Option<RecognitionSettings> {
        self.with(|s| s.last_settings).flatten()
    }
}
