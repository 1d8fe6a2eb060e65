//! Persisted chat state: the language preference and the conversation log.
//!
//! Both values live under fixed keys as JSON. The store is client-controlled
//! and may be corrupted or hand-edited, so loading never fails: anything that
//! does not decode into a valid value is discarded with a warning.

use std::sync::Arc;

use tracing::{debug, warn};

use legalhelp_core::conversation::ConversationLog;
use legalhelp_core::error::{LegalHelpError, Result};
use legalhelp_core::types::LanguageCode;

use crate::kv::KeyValueStore;

/// Storage key of the language preference.
pub const LANGUAGE_KEY: &str = "language-preference";
/// Storage key of the conversation log.
pub const HISTORY_KEY: &str = "conversation-history";

/// State restored from storage at widget construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// `None` when nothing valid was stored.
    pub language: Option<LanguageCode>,
    pub history: ConversationLog,
}

/// Typed access to the two persisted chat values over any `KeyValueStore`.
#[derive(Clone)]
pub struct PersistenceStore {
    backend: Arc<dyn KeyValueStore>,
}

impl PersistenceStore {
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self { backend }
    }

    /// Load both values, degrading each independently to its default.
    pub fn load(&self) -> Snapshot {
        let language = match self.load_language() {
            Ok(language) => language,
            Err(e) => {
                warn!(key = LANGUAGE_KEY, error = %e, "Discarding stored language preference");
                None
            }
        };

        let history = match self.load_history() {
            Ok(history) => history,
            Err(e) => {
                warn!(key = HISTORY_KEY, error = %e, "Discarding stored conversation history");
                ConversationLog::new()
            }
        };

        debug!(
            language = ?language,
            messages = history.len(),
            "Persisted chat state loaded"
        );
        Snapshot { language, history }
    }

    /// Read the stored preference, failing on anything outside the fixed set.
    pub fn load_language(&self) -> Result<Option<LanguageCode>> {
        match self.backend.get(LANGUAGE_KEY)? {
            Some(raw) => decode_language(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Read the stored log, failing on malformed JSON or broken invariants.
    pub fn load_history(&self) -> Result<ConversationLog> {
        match self.backend.get(HISTORY_KEY)? {
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| LegalHelpError::PersistenceCorrupt {
                    key: HISTORY_KEY.to_string(),
                    reason: e.to_string(),
                })
            }
            None => Ok(ConversationLog::new()),
        }
    }

    pub fn save_language(&self, language: LanguageCode) -> Result<()> {
        let encoded = serde_json::to_string(&language)?;
        self.backend.set(LANGUAGE_KEY, &encoded)?;
        debug!(language = %language, "Language preference saved");
        Ok(())
    }

    pub fn save_history(&self, history: &ConversationLog) -> Result<()> {
        let encoded = serde_json::to_string(history)?;
        self.backend.set(HISTORY_KEY, &encoded)?;
        debug!(messages = history.len(), "Conversation history saved");
        Ok(())
    }

    /// Delete the persisted log. The preference is left in place.
    pub fn clear_history(&self) -> Result<()> {
        self.backend.remove(HISTORY_KEY)?;
        debug!("Conversation history deleted");
        Ok(())
    }

    /// Delete both persisted values.
    pub fn clear_all(&self) -> Result<()> {
        self.backend.remove(LANGUAGE_KEY)?;
        self.backend.remove(HISTORY_KEY)?;
        Ok(())
    }
}

impl std::fmt::Debug for PersistenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceStore").finish_non_exhaustive()
    }
}

/// Decode a stored preference.
///
/// Accepts the JSON string form (`"en"`) and the bare code (`en`) written by
/// earlier builds. Anything else is corrupt.
fn decode_language(raw: &str) -> Result<LanguageCode> {
    if let Ok(language) = serde_json::from_str::<LanguageCode>(raw) {
        return Ok(language);
    }
    raw.parse::<LanguageCode>()
        .map_err(|_| LegalHelpError::PersistenceCorrupt {
            key: LANGUAGE_KEY.to_string(),
            reason: format!("unsupported value {:?}", raw),
        })
}
