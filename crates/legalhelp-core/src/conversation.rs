//! The append-only conversation log.
//!
//! Insertion order is significant. A log can only grow one validated message at
//! a time or be cleared as a whole, so the invariants below hold for every
//! value of this type, including ones deserialized from storage:
//! - every message has non-blank text
//! - message ids are unique
//! - timestamps are non-decreasing in append order

use std::collections::HashSet;

use serde::{Deserialize, Serialize, Serializer};

use crate::error::{LegalHelpError, Result};
use crate::types::{Message, Timestamp};

/// Ordered, validated sequence of chat messages.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(try_from = "Vec<Message>")]
pub struct ConversationLog {
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a log from an existing sequence, validating every entry.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self> {
        let mut log = Self::new();
        for message in messages {
            log.push(message)?;
        }
        Ok(log)
    }

    /// Append a message at the end of the log.
    pub fn push(&mut self, message: Message) -> Result<()> {
        if message.text.trim().is_empty() {
            return Err(LegalHelpError::Conversation(format!(
                "message {} has empty text",
                message.id
            )));
        }
        if self.ids.contains(&message.id) {
            return Err(LegalHelpError::Conversation(format!(
                "duplicate message id {}",
                message.id
            )));
        }
        if let Some(last) = self.last_timestamp() {
            if message.timestamp < last {
                return Err(LegalHelpError::Conversation(format!(
                    "message {} timestamp {} precedes {}",
                    message.id, message.timestamp.0, last.0
                )));
            }
        }
        self.ids.insert(message.id.clone());
        self.messages.push(message);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.ids.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.messages.last().map(|m| m.timestamp)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.ids.contains(id)
    }
}

impl PartialEq for ConversationLog {
    fn eq(&self, other: &Self) -> bool {
        self.messages == other.messages
    }
}

impl Eq for ConversationLog {}

impl TryFrom<Vec<Message>> for ConversationLog {
    type Error = LegalHelpError;

    fn try_from(messages: Vec<Message>) -> Result<Self> {
        Self::from_messages(messages)
    }
}

impl Serialize for ConversationLog {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.messages)
    }
}

impl<'a> IntoIterator for &'a ConversationLog {
    type Item = &'a Message;
    type IntoIter = std::slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
