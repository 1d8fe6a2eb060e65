use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{LegalHelpError, Result};

/// Top-level configuration for the LegalHelp chat widget.
///
/// Loaded from `~/.legalhelp/config.toml` by default. Every section falls
/// back to its defaults when missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegalHelpConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

impl LegalHelpConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LegalHelpConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| LegalHelpError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the persisted chat state.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.legalhelp/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Chat session behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Delay before the simulated bot reply is appended.
    pub reply_latency_ms: u64,
    /// Maximum accepted length of a single user message, in characters.
    pub max_message_chars: usize,
    /// Capacity of the render-event broadcast channel.
    pub event_capacity: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            reply_latency_ms: 1500,
            max_message_chars: 2000,
            event_capacity: 256,
        }
    }
}

/// Where the language preference and conversation log are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// Process memory only; lost on exit.
    Memory,
    /// A single JSON document in the data directory.
    #[default]
    File,
    /// A key-value table in a SQLite database in the data directory.
    Sqlite,
}

/// Persistence configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// File name of the JSON store, relative to the data directory.
    pub file_name: String,
    /// File name of the SQLite store, relative to the data directory.
    pub sqlite_name: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            file_name: "chat-state.json".to_string(),
            sqlite_name: "chat-state.db".to_string(),
        }
    }
}

/// Voice input configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// Whether to expose a speech-recognition capability at all.
    pub enabled: bool,
    /// Delay the simulated recognizer waits before reporting a result.
    pub simulated_delay_ms: u64,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            simulated_delay_ms: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = LegalHelpConfig::default();
        assert_eq!(config.chat.reply_latency_ms, 1500);
        assert_eq!(config.storage.backend, StorageBackend::File);
        assert!(config.speech.enabled);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_str = r#"
            [chat]
            reply_latency_ms = 250

            [storage]
            backend = "sqlite"
        "#;
        let config: LegalHelpConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.chat.reply_latency_ms, 250);
        assert_eq!(config.chat.max_message_chars, 2000);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.file_name, "chat-state.json");
        assert!(config.speech.enabled);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = LegalHelpConfig::default();
        config.speech.enabled = false;
        config.storage.backend = StorageBackend::Memory;
        config.save(&path).unwrap();

        let loaded = LegalHelpConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = LegalHelpConfig::load_or_default(&dir.path().join("absent.toml"));
        assert_eq!(config, LegalHelpConfig::default());
    }

    #[test]
    fn test_load_or_default_on_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "chat = [[[").unwrap();
        let config = LegalHelpConfig::load_or_default(&path);
        assert_eq!(config, LegalHelpConfig::default());
    }

    #[test]
    fn test_unknown_backend_is_a_config_error() {
        let err = toml::from_str::<LegalHelpConfig>("[storage]\nbackend = \"redis\"\n")
            .map_err(LegalHelpError::from)
            .unwrap_err();
        assert!(matches!(err, LegalHelpError::Config(_)));
    }
}
