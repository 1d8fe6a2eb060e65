use thiserror::Error;

/// Top-level error type for the LegalHelp chat system.
///
/// Subsystem crates define their own error types and implement
/// `From<LegalHelpError>` so that `?` works across crate boundaries.
/// None of these variants are meant to reach the host page: the chat
/// widget absorbs them into a safe fallback state.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LegalHelpError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Persisted value for '{key}' is corrupt: {reason}")]
    PersistenceCorrupt { key: String, reason: String },

    #[error("Unsupported language code: {0}")]
    InvalidLanguageCode(String),

    #[error("Speech recognition is not available")]
    UnsupportedCapability,

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Conversation log error: {0}")]
    Conversation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for LegalHelpError {
    fn from(err: toml::de::Error) -> Self {
        LegalHelpError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for LegalHelpError {
    fn from(err: toml::ser::Error) -> Self {
        LegalHelpError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for LegalHelpError {
    fn from(err: serde_json::Error) -> Self {
        LegalHelpError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for LegalHelp operations.
pub type Result<T> = std::result::Result<T, LegalHelpError>;
