use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LegalHelpError;

// =============================================================================
// Enums
// =============================================================================

/// Languages the chat widget can converse and transcribe in.
///
/// The set is fixed. Any code coming from the UI or from persisted storage
/// is validated against it before acceptance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageCode {
    En,
    Hi,
    Ta,
    Te,
    Bn,
    Mr,
    Kn,
    Gu,
    Or,
    Ml,
    Pa,
}

impl LanguageCode {
    /// Every supported language, in display order.
    pub const ALL: [LanguageCode; 11] = [
        LanguageCode::En,
        LanguageCode::Hi,
        LanguageCode::Ta,
        LanguageCode::Te,
        LanguageCode::Bn,
        LanguageCode::Mr,
        LanguageCode::Kn,
        LanguageCode::Gu,
        LanguageCode::Or,
        LanguageCode::Ml,
        LanguageCode::Pa,
    ];

    /// The two-letter code, also used as the speech-recognition locale.
    pub fn code(&self) -> &'static str {
        match self {
            LanguageCode::En => "en",
            LanguageCode::Hi => "hi",
            LanguageCode::Ta => "ta",
            LanguageCode::Te => "te",
            LanguageCode::Bn => "bn",
            LanguageCode::Mr => "mr",
            LanguageCode::Kn => "kn",
            LanguageCode::Gu => "gu",
            LanguageCode::Or => "or",
            LanguageCode::Ml => "ml",
            LanguageCode::Pa => "pa",
        }
    }

    /// Human-readable label in the language's own script.
    pub fn label(&self) -> &'static str {
        match self {
            LanguageCode::En => "English",
            LanguageCode::Hi => "हिंदी",
            LanguageCode::Ta => "தமிழ்",
            LanguageCode::Te => "తెలుగు",
            LanguageCode::Bn => "বাংলা",
            LanguageCode::Mr => "मराठी",
            LanguageCode::Kn => "ಕನ್ನಡ",
            LanguageCode::Gu => "ગુજરાતી",
            LanguageCode::Or => "ଓଡ଼ିଆ",
            LanguageCode::Ml => "മലയാളം",
            LanguageCode::Pa => "ਪੰਜਾਬੀ",
        }
    }
}

impl fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for LanguageCode {
    type Err = LegalHelpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LanguageCode::ALL
            .iter()
            .copied()
            .find(|lang| lang.code() == s)
            .ok_or_else(|| LegalHelpError::InvalidLanguageCode(s.to_string()))
    }
}

/// Visible mode of the chat widget.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    /// Only the launcher button is shown.
    #[default]
    Closed,
    /// The language picker is shown.
    SelectingLanguage,
    /// The conversation pane is shown.
    Conversing,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionMode::Closed => write!(f, "Closed"),
            SessionMode::SelectingLanguage => write!(f, "SelectingLanguage"),
            SessionMode::Conversing => write!(f, "Conversing"),
        }
    }
}

/// Who wrote a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Bot,
}

impl fmt::Display for Author {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Author::User => write!(f, "user"),
            Author::Bot => write!(f, "bot"),
        }
    }
}

// =============================================================================
// Newtype Wrappers - Temporal
// =============================================================================

/// Unix timestamp in milliseconds since epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis())
    }

    pub fn to_datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.0).unwrap_or_default()
    }
}

/// Wall-clock source that never goes backwards.
///
/// Message timestamps must be non-decreasing in append order even if the
/// system clock is adjusted, so every tick is clamped to the last issued value.
#[derive(Debug, Clone, Default)]
pub struct LogicalClock {
    last: Timestamp,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a timestamp issued elsewhere (e.g. restored from storage).
    pub fn observe(&mut self, ts: Timestamp) {
        if ts > self.last {
            self.last = ts;
        }
    }

    /// Issue the next timestamp.
    pub fn tick(&mut self) -> Timestamp {
        self.observe(Timestamp::now());
        self.last
    }
}

// =============================================================================
// Domain Entities
// =============================================================================

/// One entry of the conversation log.
///
/// Wire shape is `{id, author, text, timestamp}`; messages are never mutated
/// after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub author: Author,
    pub text: String,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn new(author: Author, text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            author,
            text: text.into(),
            timestamp,
        }
    }

    pub fn user(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(Author::User, text, timestamp)
    }

    pub fn bot(text: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(Author::Bot, text, timestamp)
    }
}
