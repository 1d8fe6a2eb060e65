//! Shared domain types, configuration and errors for the LegalHelp chat widget.

pub mod config;
pub mod conversation;
pub mod error;
pub mod events;
pub mod types;

pub use config::LegalHelpConfig;
pub use conversation::ConversationLog;
pub use error::{LegalHelpError, Result};
pub use events::ChatEvent;
pub use types::*;
