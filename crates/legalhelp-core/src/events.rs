use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{LanguageCode, Message, SessionMode};

/// Events emitted by the chat widget after each committed state change.
///
/// Consumed by the render layer, which re-projects the widget view on every
/// event, and by the terminal front end for echoing replies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[non_exhaustive]
pub enum ChatEvent {
    /// The widget moved between closed, language selection and conversation.
    ModeChanged { from: SessionMode, to: SessionMode },

    /// A language was picked and persisted.
    LanguageSelected { language: LanguageCode },

    /// A message was appended to the conversation log.
    MessageAppended { message: Message },

    /// The conversation log was emptied.
    HistoryCleared,

    /// The draft input changed (typed, sent, or extended by voice).
    DraftChanged { draft: String },

    /// The voice capture listening flag flipped.
    ListeningChanged { listening: bool },

    /// A deferred reply was scheduled for a user message.
    ReplyScheduled { ticket: Uuid, in_reply_to: String },

    /// Pending deferred replies were cancelled.
    RepliesCancelled { count: usize },
}

impl ChatEvent {
    /// Short machine-readable name of the event.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::ModeChanged { .. } => "mode_changed",
            ChatEvent::LanguageSelected { .. } => "language_selected",
            ChatEvent::MessageAppended { .. } => "message_appended",
            ChatEvent::HistoryCleared => "history_cleared",
            ChatEvent::DraftChanged { .. } => "draft_changed",
            ChatEvent::ListeningChanged { .. } => "listening_changed",
            ChatEvent::ReplyScheduled { .. } => "reply_scheduled",
            ChatEvent::RepliesCancelled { .. } => "replies_cancelled",
        }
    }
}
