//! Error types for the chat widget's collaborator-facing operations.
//!
//! None of these are fatal: a rejected operation leaves the widget exactly
//! as it was.

use legalhelp_core::error::LegalHelpError;
use legalhelp_core::types::SessionMode;

/// Errors from the chat widget.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("unsupported language code: {0:?}")]
    InvalidLanguageCode(String),
    #[error("message cannot be empty")]
    EmptySubmission,
    #[error("message exceeds maximum length of {0} characters")]
    MessageTooLong(usize),
    #[error("{operation} is not valid while {mode}")]
    InvalidTransition {
        operation: &'static str,
        mode: SessionMode,
    },
    #[error("speech recognition is not available")]
    UnsupportedCapability,
    #[error("capture error: {0}")]
    Capture(String),
    #[error("persisted value {key:?} is corrupt: {reason}")]
    PersistenceCorrupt { key: String, reason: String },
    #[error("conversation error: {0}")]
    Conversation(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("no async runtime available to schedule the reply")]
    RuntimeUnavailable,
}

impl From<LegalHelpError> for ChatError {
    fn from(err: LegalHelpError) -> Self {
        match err {
            LegalHelpError::InvalidLanguageCode(code) => ChatError::InvalidLanguageCode(code),
            LegalHelpError::UnsupportedCapability => ChatError::UnsupportedCapability,
            LegalHelpError::Capture(reason) => ChatError::Capture(reason),
            LegalHelpError::PersistenceCorrupt { key, reason } => {
                ChatError::PersistenceCorrupt { key, reason }
            }
            LegalHelpError::Conversation(reason) => ChatError::Conversation(reason),
            other => ChatError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_error_display() {
        let err = ChatError::InvalidLanguageCode("fr".to_string());
        assert_eq!(err.to_string(), "unsupported language code: \"fr\"");

        let err = ChatError::EmptySubmission;
        assert_eq!(err.to_string(), "message cannot be empty");

        let err = ChatError::MessageTooLong(2000);
        assert_eq!(
            err.to_string(),
            "message exceeds maximum length of 2000 characters"
        );

        let err = ChatError::InvalidTransition {
            operation: "send",
            mode: SessionMode::Closed,
        };
        assert_eq!(err.to_string(), "send is not valid while Closed");

        let err = ChatError::UnsupportedCapability;
        assert_eq!(err.to_string(), "speech recognition is not available");

        let err = ChatError::Capture("no-speech".to_string());
        assert_eq!(err.to_string(), "capture error: no-speech");

        let err = ChatError::Storage("disk full".to_string());
        assert_eq!(err.to_string(), "storage error: disk full");

        let err = ChatError::RuntimeUnavailable;
        assert_eq!(
            err.to_string(),
            "no async runtime available to schedule the reply"
        );
    }

    #[test]
    fn test_chat_error_from_legalhelp_error() {
        let err: ChatError = LegalHelpError::InvalidLanguageCode("xx".to_string()).into();
        assert!(matches!(err, ChatError::InvalidLanguageCode(ref c) if c == "xx"));

        let err: ChatError = LegalHelpError::UnsupportedCapability.into();
        assert!(matches!(err, ChatError::UnsupportedCapability));

        let err: ChatError = LegalHelpError::PersistenceCorrupt {
            key: "conversation-history".to_string(),
            reason: "eof".to_string(),
        }
        .into();
        assert!(matches!(err, ChatError::PersistenceCorrupt { .. }));

        let err: ChatError = LegalHelpError::Storage("connection lost".to_string()).into();
        assert!(matches!(err, ChatError::Storage(_)));
        assert!(err.to_string().contains("connection lost"));
    }

    #[test]
    fn test_chat_error_is_debug() {
        let err = ChatError::EmptySubmission;
        let debug = format!("{:?}", err);
        assert!(debug.contains("EmptySubmission"));
    }
}
