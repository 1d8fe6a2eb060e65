//! Chat session core for the LegalHelp widget.
//!
//! Provides the `ChatWidget` session state machine, which keeps the
//! conversation log, the language preference, voice capture and deferred
//! bot replies consistent, and the cancellable `ReplyPipeline` behind it.

pub mod error;
pub mod reply;
pub mod widget;

pub use error::ChatError;
pub use reply::{PlaceholderReplyGenerator, ReplyGenerator, ReplyHandle, ReplyPipeline, ReplyReady};
pub use widget::{ChatWidget, EventOutcome, Submission, WidgetEvent, WidgetView};
