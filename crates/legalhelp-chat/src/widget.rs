//! The chat widget: session state machine and orchestrator.
//!
//! `ChatWidget` owns the mode, the conversation log, the language preference
//! and the draft input, and coordinates the three timed collaborators:
//! persistence, the reply pipeline and the speech capture adapter. It is
//! driven by one task. Timers and the capture device only post
//! `WidgetEvent`s, which are handled to completion one at a time through
//! `next_event` and `handle_event`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use legalhelp_core::config::ChatConfig;
use legalhelp_core::conversation::ConversationLog;
use legalhelp_core::events::ChatEvent;
use legalhelp_core::types::{LanguageCode, LogicalClock, Message, SessionMode};
use legalhelp_speech::{
    CaptureApplied, CaptureEvent, CaptureStart, SpeechCaptureAdapter, SpeechRecognizer,
};
use legalhelp_storage::PersistenceStore;

use crate::error::ChatError;
use crate::reply::{PlaceholderReplyGenerator, ReplyGenerator, ReplyHandle, ReplyPipeline, ReplyReady};

/// An external event waiting to be applied to the widget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    /// A deferred reply's latency elapsed.
    Reply(ReplyReady),
    /// The speech device reported a transcript or an error.
    Capture(CaptureEvent),
}

/// What `handle_event` did with an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    /// The bot reply was appended to the log.
    ReplyAppended(Message),
    /// The reply belonged to a cancelled ticket and was discarded.
    ReplyDropped,
    /// The capture event was applied (or dropped as stale).
    Capture(CaptureApplied),
}

/// Result of an accepted submission.
#[derive(Debug, Clone)]
pub struct Submission {
    /// The user message appended to the log.
    pub message: Message,
    /// Handle to the scheduled reply.
    pub reply: ReplyHandle,
}

/// Read-only projection of widget state for the render layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetView {
    pub mode: SessionMode,
    pub visible: bool,
    pub language: Option<LanguageCode>,
    pub language_label: Option<&'static str>,
    pub messages: Vec<Message>,
    pub draft: String,
    pub listening: bool,
    pub capture_supported: bool,
    pub pending_replies: usize,
}

/// The embeddable legal-help chat widget.
pub struct ChatWidget {
    mode: SessionMode,
    /// Pane shown by the next `open`.
    resume: SessionMode,
    language: Option<LanguageCode>,
    log: ConversationLog,
    draft: String,
    clock: LogicalClock,
    max_message_chars: usize,
    persistence: PersistenceStore,
    pipeline: ReplyPipeline,
    capture: SpeechCaptureAdapter,
    reply_rx: mpsc::UnboundedReceiver<ReplyReady>,
    capture_rx: mpsc::UnboundedReceiver<CaptureEvent>,
    events: broadcast::Sender<ChatEvent>,
}

impl ChatWidget {
    /// Build a widget with the placeholder reply generator, restoring the
    /// persisted preference and log.
    pub fn new(
        persistence: PersistenceStore,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        config: &ChatConfig,
    ) -> Self {
        Self::with_generator(
            persistence,
            recognizer,
            Arc::new(PlaceholderReplyGenerator),
            config,
        )
    }

    pub fn with_generator(
        persistence: PersistenceStore,
        recognizer: Option<Box<dyn SpeechRecognizer>>,
        generator: Arc<dyn ReplyGenerator>,
        config: &ChatConfig,
    ) -> Self {
        let snapshot = persistence.load();

        let mut clock = LogicalClock::new();
        if let Some(last) = snapshot.history.last_timestamp() {
            clock.observe(last);
        }

        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let (capture_tx, capture_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let pipeline = ReplyPipeline::new(
            Duration::from_millis(config.reply_latency_ms),
            generator,
            reply_tx,
        );
        let capture = SpeechCaptureAdapter::new(
            recognizer,
            snapshot.language.unwrap_or(LanguageCode::En),
            capture_tx,
        );

        let resume = if snapshot.language.is_some() {
            SessionMode::Conversing
        } else {
            SessionMode::SelectingLanguage
        };

        info!(
            language = ?snapshot.language,
            messages = snapshot.history.len(),
            capture_supported = capture.is_supported(),
            "Chat widget initialized"
        );

        Self {
            mode: SessionMode::Closed,
            resume,
            language: snapshot.language,
            log: snapshot.history,
            draft: String::new(),
            clock,
            max_message_chars: config.max_message_chars,
            persistence,
            pipeline,
            capture,
            reply_rx,
            capture_rx,
            events,
        }
    }

    // -- Accessors --

    pub fn mode(&self) -> SessionMode {
        self.mode
    }

    pub fn is_visible(&self) -> bool {
        self.mode != SessionMode::Closed
    }

    pub fn language(&self) -> Option<LanguageCode> {
        self.language
    }

    pub fn messages(&self) -> &[Message] {
        self.log.messages()
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn is_listening(&self) -> bool {
        self.capture.is_listening()
    }

    pub fn capture_supported(&self) -> bool {
        self.capture.is_supported()
    }

    pub fn pending_replies(&self) -> usize {
        self.pipeline.pending_count()
    }

    /// Snapshot of everything the render layer needs.
    pub fn view(&self) -> WidgetView {
        WidgetView {
            mode: self.mode,
            visible: self.is_visible(),
            language: self.language,
            language_label: self.language.map(|l| l.label()),
            messages: self.log.messages().to_vec(),
            draft: self.draft.clone(),
            listening: self.capture.is_listening(),
            capture_supported: self.capture.is_supported(),
            pending_replies: self.pipeline.pending_count(),
        }
    }

    /// Receive every `ChatEvent` emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    // -- Collaborator operations --

    /// Show the widget. Resumes the conversation when a valid preference is
    /// known, otherwise shows language selection. No-op when already open.
    pub fn open(&mut self) -> SessionMode {
        if self.mode == SessionMode::Closed {
            self.set_mode(self.resume);
            info!(mode = %self.mode, "Chat widget opened");
        }
        self.mode
    }

    /// Pick the conversation language from the language picker.
    pub fn select_language(&mut self, code: &str) -> Result<LanguageCode, ChatError> {
        self.require_mode("select_language", SessionMode::SelectingLanguage)?;
        let language: LanguageCode = code.parse()?;

        self.language = Some(language);
        if let Err(e) = self.persistence.save_language(language) {
            warn!(error = %e, "Failed to persist language preference");
        }

        let was_listening = self.capture.is_listening();
        self.capture.reconfigure(language);
        self.emit_listening_change(was_listening);

        self.emit(ChatEvent::LanguageSelected { language });
        self.resume = SessionMode::Conversing;
        self.set_mode(SessionMode::Conversing);
        info!(language = %language, "Language selected");
        Ok(language)
    }

    /// Return to the language picker. The log and the preference are kept.
    pub fn change_language(&mut self) -> Result<(), ChatError> {
        self.require_mode("change_language", SessionMode::Conversing)?;
        self.set_mode(SessionMode::SelectingLanguage);
        Ok(())
    }

    /// Submit a user message and schedule its reply.
    ///
    /// Reply timers need a tokio runtime, either the one current when the
    /// widget was built or the caller's. Without one the send is rejected
    /// with `RuntimeUnavailable` and the log is left untouched.
    pub fn send(&mut self, text: &str) -> Result<Submission, ChatError> {
        self.require_mode("send", SessionMode::Conversing)?;
        let Some(language) = self.language else {
            return Err(ChatError::InvalidTransition {
                operation: "send",
                mode: self.mode,
            });
        };

        let text = text.trim();
        if text.is_empty() {
            debug!("Ignoring blank submission");
            return Err(ChatError::EmptySubmission);
        }
        if text.chars().count() > self.max_message_chars {
            return Err(ChatError::MessageTooLong(self.max_message_chars));
        }
        if !self.pipeline.can_schedule() {
            warn!("No tokio runtime for reply timers, rejecting send");
            return Err(ChatError::RuntimeUnavailable);
        }

        let message = Message::user(text, self.clock.tick());
        self.log.push(message.clone())?;
        self.persist_history();
        self.emit(ChatEvent::MessageAppended {
            message: message.clone(),
        });

        let reply = self.pipeline.schedule(&message, language)?;
        self.emit(ChatEvent::ReplyScheduled {
            ticket: reply.ticket(),
            in_reply_to: message.id.clone(),
        });
        info!(message_id = %message.id, language = %language, "Message sent");

        Ok(Submission { message, reply })
    }

    /// Send the draft input. The draft is cleared only if the send is accepted.
    pub fn send_draft(&mut self) -> Result<Submission, ChatError> {
        let draft = self.draft.clone();
        let submission = self.send(&draft)?;
        self.set_draft(String::new());
        Ok(submission)
    }

    /// Replace the draft input.
    pub fn set_draft(&mut self, text: impl Into<String>) {
        let text = text.into();
        if text != self.draft {
            self.draft = text;
            self.emit(ChatEvent::DraftChanged {
                draft: self.draft.clone(),
            });
        }
    }

    /// Start voice capture in the current language. Returns what the adapter
    /// did; an unsupported device or an open session is not an error.
    pub fn start_capture(&mut self) -> Result<CaptureStart, ChatError> {
        self.require_mode("start_capture", SessionMode::Conversing)?;
        let outcome = self.capture.start();
        match &outcome {
            CaptureStart::Started(_) => {
                self.emit(ChatEvent::ListeningChanged { listening: true });
            }
            CaptureStart::Failed(reason) => {
                warn!(error = %reason, "Voice capture could not start");
            }
            CaptureStart::AlreadyListening | CaptureStart::Unsupported => {}
        }
        Ok(outcome)
    }

    /// Empty the log and delete its persisted copy. Idempotent; the mode is
    /// unchanged. Pending replies are not cancelled and land in the emptied
    /// log.
    pub fn clear_chat(&mut self) {
        self.clear_history();
        info!("Chat cleared");
    }

    /// Clear the conversation and close the widget in one step.
    ///
    /// Cancels every pending reply and releases any capture session. The
    /// stored preference is kept, but the next `open` shows language
    /// selection again.
    pub fn clear_and_close(&mut self) {
        self.cancel_replies();
        self.release_capture();
        self.clear_history();

        self.resume = SessionMode::SelectingLanguage;
        self.set_mode(SessionMode::SelectingLanguage);
        self.set_mode(SessionMode::Closed);
        info!("Chat cleared and closed");
    }

    /// Tear down timers and the capture device. Also run on drop.
    pub fn shutdown(&mut self) {
        let cancelled = self.cancel_replies();
        let released = self.release_capture();
        if cancelled > 0 || released {
            info!(cancelled, released, "Chat widget shut down");
        }
    }

    // -- Event loop --

    /// Wait for the next timer or capture event. Pends while nothing is
    /// scheduled.
    pub async fn next_event(&mut self) -> Option<WidgetEvent> {
        tokio::select! {
            Some(ready) = self.reply_rx.recv() => Some(WidgetEvent::Reply(ready)),
            Some(event) = self.capture_rx.recv() => Some(WidgetEvent::Capture(event)),
            else => None,
        }
    }

    /// Take an already queued event without waiting.
    pub fn try_next_event(&mut self) -> Option<WidgetEvent> {
        if let Ok(ready) = self.reply_rx.try_recv() {
            return Some(WidgetEvent::Reply(ready));
        }
        self.capture_rx.try_recv().ok().map(WidgetEvent::Capture)
    }

    /// Apply one event to completion.
    pub fn handle_event(&mut self, event: WidgetEvent) -> EventOutcome {
        match event {
            WidgetEvent::Reply(ready) => self.apply_reply(ready),
            WidgetEvent::Capture(event) => self.apply_capture(event),
        }
    }

    /// Wait for the next event and apply it.
    pub async fn step(&mut self) -> Option<EventOutcome> {
        let event = self.next_event().await?;
        Some(self.handle_event(event))
    }

    // -- Private helpers --

    fn apply_reply(&mut self, ready: ReplyReady) -> EventOutcome {
        let Some(ready) = self.pipeline.complete(ready) else {
            return EventOutcome::ReplyDropped;
        };

        let message = Message::bot(ready.text, self.clock.tick());
        if let Err(e) = self.log.push(message.clone()) {
            warn!(error = %e, "Rejected bot reply");
            return EventOutcome::ReplyDropped;
        }
        self.persist_history();
        self.emit(ChatEvent::MessageAppended {
            message: message.clone(),
        });
        debug!(
            message_id = %message.id,
            in_reply_to = %ready.in_reply_to,
            "Reply appended"
        );
        EventOutcome::ReplyAppended(message)
    }

    fn apply_capture(&mut self, event: CaptureEvent) -> EventOutcome {
        let was_listening = self.capture.is_listening();
        let previous_draft = self.draft.clone();

        let applied = self.capture.handle(event, &mut self.draft);

        self.emit_listening_change(was_listening);
        if self.draft != previous_draft {
            self.emit(ChatEvent::DraftChanged {
                draft: self.draft.clone(),
            });
        }
        EventOutcome::Capture(applied)
    }

    fn require_mode(&self, operation: &'static str, expected: SessionMode) -> Result<(), ChatError> {
        if self.mode == expected {
            Ok(())
        } else {
            debug!(operation, mode = %self.mode, "Operation not valid in current mode");
            Err(ChatError::InvalidTransition {
                operation,
                mode: self.mode,
            })
        }
    }

    fn set_mode(&mut self, to: SessionMode) {
        let from = self.mode;
        if from != to {
            self.mode = to;
            debug!("Widget mode: {} -> {}", from, to);
            self.emit(ChatEvent::ModeChanged { from, to });
        }
    }

    fn cancel_replies(&mut self) -> usize {
        let count = self.pipeline.cancel_all();
        if count > 0 {
            self.emit(ChatEvent::RepliesCancelled { count });
        }
        count
    }

    fn release_capture(&mut self) -> bool {
        let released = self.capture.release();
        if released {
            self.emit(ChatEvent::ListeningChanged { listening: false });
        }
        released
    }

    fn clear_history(&mut self) {
        self.log.clear();
        if let Err(e) = self.persistence.clear_history() {
            warn!(error = %e, "Failed to delete persisted conversation history");
        }
        self.emit(ChatEvent::HistoryCleared);
    }

    fn persist_history(&self) {
        if let Err(e) = self.persistence.save_history(&self.log) {
            warn!(error = %e, "Failed to persist conversation history");
        }
    }

    fn emit_listening_change(&self, was_listening: bool) {
        let listening = self.capture.is_listening();
        if listening != was_listening {
            self.emit(ChatEvent::ListeningChanged { listening });
        }
    }

    fn emit(&self, event: ChatEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

impl Drop for ChatWidget {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for ChatWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatWidget")
            .field("mode", &self.mode)
            .field("language", &self.language)
            .field("messages", &self.log.len())
            .field("capture", &self.capture)
            .field("pipeline", &self.pipeline)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Tests
// =============================================================================
