//! LegalHelp application binary - composition root.
//!
//! Ties the LegalHelp crates into a terminal front end:
//! 1. Parse CLI flags and load configuration from TOML
//! 2. Initialize tracing
//! 3. Open the configured key-value store (memory, JSON file or SQLite)
//! 4. Build the chat widget, with a simulated microphone if speech is enabled
//! 5. Run the requested subcommand

mod cli;
mod repl;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use legalhelp_chat::ChatWidget;
use legalhelp_core::config::{LegalHelpConfig, StorageBackend};
use legalhelp_core::error::LegalHelpError;
use legalhelp_speech::{ScriptedRecognizer, SpeechRecognizer};
use legalhelp_storage::{JsonFileStore, KeyValueStore, MemoryStore, PersistenceStore, SqliteStore};

use cli::{CliArgs, Command};
use repl::Repl;

/// Open the key-value backend selected in the configuration.
fn open_store(
    config: &LegalHelpConfig,
    data_dir: &Path,
) -> Result<Arc<dyn KeyValueStore>, LegalHelpError> {
    let store: Arc<dyn KeyValueStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory chat store; nothing will be persisted");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::File => {
            std::fs::create_dir_all(data_dir)?;
            Arc::new(JsonFileStore::open(data_dir.join(&config.storage.file_name))?)
        }
        StorageBackend::Sqlite => {
            std::fs::create_dir_all(data_dir)?;
            let path = data_dir.join(&config.storage.sqlite_name);
            let store = SqliteStore::open(&path)?;
            tracing::info!(path = %path.display(), "SQLite chat store opened");
            Arc::new(store)
        }
    };
    Ok(store)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let config_exists = config_file.exists();
    let config = if config_exists {
        LegalHelpConfig::load_or_default(&config_file)
    } else {
        LegalHelpConfig::default()
    };

    // Tracing. Logs go to stderr so they do not interleave with the chat.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .init();

    tracing::info!("Starting LegalHelp v{}", env!("CARGO_PKG_VERSION"));
    if config_exists {
        tracing::info!(path = %config_file.display(), "Configuration loaded");
    } else {
        tracing::debug!(path = %config_file.display(), "No configuration file, using defaults");
    }

    let command = args.command();
    if command == Command::Languages {
        repl::print_languages();
        return Ok(());
    }

    // Storage.
    let data_dir = args.resolve_data_dir(&config.general.data_dir);
    let store = match open_store(&config, &data_dir) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(path = %data_dir.display(), error = %e, "Failed to open chat store");
            return Err(e.into());
        }
    };
    let persistence = PersistenceStore::new(store);

    match command {
        Command::History => {
            repl::print_history(persistence.load().history.messages());
        }
        Command::Reset => {
            persistence.clear_all()?;
            println!("Language preference and conversation deleted.");
        }
        Command::Chat | Command::Languages => {
            // Speech.
            let (recognizer, script) = if config.speech.enabled {
                let recognizer =
                    ScriptedRecognizer::new(Duration::from_millis(config.speech.simulated_delay_ms));
                let script = recognizer.handle();
                let recognizer: Box<dyn SpeechRecognizer> = Box::new(recognizer);
                (Some(recognizer), Some(script))
            } else {
                tracing::info!("Speech input disabled in config");
                (None, None)
            };

            let widget = ChatWidget::new(persistence, recognizer, &config.chat);
            Repl::new(widget, script).run().await?;
        }
    }

    Ok(())
}
