//! Speech capture adapter.
//!
//! The `SpeechCaptureAdapter` owns the optional speech-recognition device and
//! the listening flag. It opens at most one single-shot session at a time,
//! bound to the current language, and folds the session's outcome into the
//! caller's draft input. Every path that abandons a session (reconfiguration,
//! release, drop) stops the device first so no handle is left open.

use legalhelp_core::types::LanguageCode;

use crate::recognizer::{
    CaptureEvent, CaptureOutcome, CaptureSessionId, CaptureSink, RecognitionSettings,
    SpeechRecognizer,
};
use crate::state::{CaptureState, StateMachine};

/// Result of a `start` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStart {
    /// A new session was opened.
    Started(CaptureSessionId),
    /// A session is already open; nothing changed.
    AlreadyListening,
    /// No recognition capability is available; nothing changed.
    Unsupported,
    /// The device refused to start; the listening flag stays clear.
    Failed(String),
}

/// How a capture event was applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureApplied {
    /// The transcript was appended to the draft and the session closed.
    Transcript,
    /// The session failed; the draft is untouched.
    Error(String),
    /// The event belongs to a session that is no longer active and was dropped.
    Stale,
}

/// Capability-gated wrapper around a `SpeechRecognizer`.
pub struct SpeechCaptureAdapter {
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    language: LanguageCode,
    state: StateMachine,
    session: Option<CaptureSessionId>,
    sink: CaptureSink,
}

impl SpeechCaptureAdapter {
    /// Create an adapter. `None` means the host has no speech capability;
    /// capture is then disabled without raising an error.
    pub fn new(
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        language: LanguageCode,
        sink: CaptureSink,
    ) -> Self {
        if recognizer.is_none() {
            tracing::info!("Speech recognition unavailable, voice input disabled");
        }
        Self {
            recognizer,
            language,
            state: StateMachine::new(),
            session: None,
            sink,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.recognizer.is_some()
    }

    pub fn is_listening(&self) -> bool {
        self.state.current() == CaptureState::Listening
    }

    pub fn language(&self) -> LanguageCode {
        self.language
    }

    pub fn active_session(&self) -> Option<CaptureSessionId> {
        self.session
    }

    /// Settings the device is started with.
    pub fn settings(&self) -> RecognitionSettings {
        RecognitionSettings::single_shot(self.language)
    }

    /// Open a capture session bound to the current language.
    pub fn start(&mut self) -> CaptureStart {
        if self.is_listening() {
            tracing::debug!("Capture already in progress, ignoring start");
            return CaptureStart::AlreadyListening;
        }
        let settings = self.settings();
        let Some(recognizer) = self.recognizer.as_mut() else {
            return CaptureStart::Unsupported;
        };

        let session = CaptureSessionId::new();
        if let Err(e) = recognizer.start(&settings, session, self.sink.clone()) {
            tracing::warn!(error = %e, "Speech recognizer failed to start");
            return CaptureStart::Failed(e.to_string());
        }
        if let Err(e) = self.state.transition(CaptureState::Listening) {
            recognizer.stop();
            return CaptureStart::Failed(e.to_string());
        }

        self.session = Some(session);
        tracing::info!(session_id = %session, lang = %settings.lang, "Capture session started");
        CaptureStart::Started(session)
    }

    /// Apply a device event to the adapter and the draft input.
    pub fn handle(&mut self, event: CaptureEvent, draft: &mut String) -> CaptureApplied {
        if self.session != Some(event.session) {
            tracing::debug!(session_id = %event.session, "Dropping event from stale capture session");
            return CaptureApplied::Stale;
        }

        self.session = None;
        self.state.reset();

        match event.outcome {
            CaptureOutcome::Transcript(text) => {
                append_transcript(draft, &text);
                if let Some(recognizer) = self.recognizer.as_mut() {
                    recognizer.stop();
                }
                tracing::info!(
                    session_id = %event.session,
                    text_len = text.len(),
                    "Capture transcript received"
                );
                CaptureApplied::Transcript
            }
            CaptureOutcome::Failed(reason) => {
                tracing::warn!(session_id = %event.session, error = %reason, "Capture session failed");
                CaptureApplied::Error(reason)
            }
        }
    }

    /// Rebind to a new language, tearing down any open session first.
    pub fn reconfigure(&mut self, language: LanguageCode) {
        self.release();
        if self.language != language {
            tracing::debug!(from = %self.language, to = %language, "Capture language changed");
        }
        self.language = language;
    }

    /// Stop the open session, if any. Returns whether one was open.
    pub fn release(&mut self) -> bool {
        let Some(session) = self.session.take() else {
            return false;
        };
        if let Some(recognizer) = self.recognizer.as_mut() {
            recognizer.stop();
        }
        self.state.reset();
        tracing::debug!(session_id = %session, "Capture session released");
        true
    }
}

impl Drop for SpeechCaptureAdapter {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for SpeechCaptureAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechCaptureAdapter")
            .field("supported", &self.is_supported())
            .field("language", &self.language)
            .field("state", &self.state.current())
            .field("session", &self.session)
            .finish()
    }
}

/// Fold a transcript into the draft, space-joined when the draft has text.
fn append_transcript(draft: &mut String, transcript: &str) {
    let transcript = transcript.trim();
    if transcript.is_empty() {
        return;
    }
    if !draft.is_empty() {
        draft.push(' ');
    }
    draft.push_str(transcript);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::{ScriptHandle, ScriptedRecognizer};
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn adapter_with_script(
        language: LanguageCode,
    ) -> (
        SpeechCaptureAdapter,
        ScriptHandle,
        mpsc::UnboundedReceiver<CaptureEvent>,
    ) {
        let recognizer = ScriptedRecognizer::new(Duration::from_millis(100));
        let handle = recognizer.handle();
        let (tx, rx) = mpsc::unbounded_channel();
        let adapter = SpeechCaptureAdapter::new(Some(Box::new(recognizer)), language, tx);
        (adapter, handle, rx)
    }

    #[test]
    fn test_append_transcript() {
        let mut draft = String::new();
        append_transcript(&mut draft, "can I get bail");
        assert_eq!(draft, "can I get bail");
        append_transcript(&mut draft, " tomorrow ");
        assert_eq!(draft, "can I get bail tomorrow");
        append_transcript(&mut draft, "   ");
        assert_eq!(draft, "can I get bail tomorrow");
    }

    #[test]
    fn test_unsupported_adapter_is_silent() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut adapter = SpeechCaptureAdapter::new(None, LanguageCode::En, tx);
        assert!(!adapter.is_supported());
        assert_eq!(adapter.start(), CaptureStart::Unsupported);
        assert!(!adapter.is_listening());
        assert!(!adapter.release());
    }

    #[tokio::test(start_paused = true)]
    async fn test_transcript_appends_to_draft_and_closes_session() {
        let (mut adapter, handle, mut rx) = adapter_with_script(LanguageCode::Hi);
        handle.push_transcript("mujhe vakil chahiye");

        assert!(matches!(adapter.start(), CaptureStart::Started(_)));
        assert!(adapter.is_listening());
        assert_eq!(handle.last_settings(), Some(RecognitionSettings::single_shot(LanguageCode::Hi)));

        let event = rx.recv().await.unwrap();
        let mut draft = "Question:".to_string();
        assert_eq!(adapter.handle(event, &mut draft), CaptureApplied::Transcript);

        assert_eq!(draft, "Question: mujhe vakil chahiye");
        assert!(!adapter.is_listening());
        assert!(!handle.is_open());
        assert_eq!(handle.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_clears_flag_and_keeps_draft() {
        let (mut adapter, handle, mut rx) = adapter_with_script(LanguageCode::En);
        handle.push_error("no-speech");

        adapter.start();
        let event = rx.recv().await.unwrap();
        let mut draft = "keep me".to_string();
        assert_eq!(
            adapter.handle(event, &mut draft),
            CaptureApplied::Error("no-speech".to_string())
        );
        assert_eq!(draft, "keep me");
        assert!(!adapter.is_listening());
        assert_eq!(adapter.active_session(), None);

        // The device is free again.
        assert!(matches!(adapter.start(), CaptureStart::Started(_)));
        assert_eq!(handle.starts(), 2);
    }

    #[tokio::test]
    async fn test_start_while_listening_is_noop() {
        let (mut adapter, handle, _rx) = adapter_with_script(LanguageCode::En);
        let session = match adapter.start() {
            CaptureStart::Started(session) => session,
            other => panic!("expected a started session, got {:?}", other),
        };

        assert_eq!(adapter.start(), CaptureStart::AlreadyListening);
        assert!(adapter.is_listening());
        assert_eq!(adapter.active_session(), Some(session));
        assert_eq!(handle.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconfigure_tears_down_open_session() {
        let (mut adapter, handle, mut rx) = adapter_with_script(LanguageCode::En);
        handle.push_transcript("late words");
        adapter.start();
        assert!(handle.is_open());

        adapter.reconfigure(LanguageCode::Ta);
        assert!(!adapter.is_listening());
        assert!(!handle.is_open());
        assert_eq!(handle.stops(), 1);
        assert_eq!(adapter.language(), LanguageCode::Ta);

        adapter.start();
        assert_eq!(handle.last_settings().map(|s| s.lang), Some(LanguageCode::Ta));
        adapter.release();

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stale_event_is_dropped() {
        let (mut adapter, _handle, _rx) = adapter_with_script(LanguageCode::En);
        adapter.start();
        let stale = CaptureEvent {
            session: CaptureSessionId::new(),
            outcome: CaptureOutcome::Transcript("ghost".to_string()),
        };
        let mut draft = String::new();
        assert_eq!(adapter.handle(stale, &mut draft), CaptureApplied::Stale);
        assert!(draft.is_empty());
        assert!(adapter.is_listening());
    }

    #[test]
    fn test_start_outside_runtime_fails_without_listening() {
        let (mut adapter, handle, _rx) = adapter_with_script(LanguageCode::En);
        handle.push_transcript("unheard");
        assert!(matches!(adapter.start(), CaptureStart::Failed(_)));
        assert!(!adapter.is_listening());
        assert_eq!(adapter.active_session(), None);
        assert!(!handle.is_open());
    }

    #[tokio::test]
    async fn test_drop_releases_device() {
        let (mut adapter, handle, _rx) = adapter_with_script(LanguageCode::En);
        adapter.start();
        assert!(handle.is_open());
        drop(adapter);
        assert!(!handle.is_open());
        assert_eq!(handle.stops(), 1);
    }
}
