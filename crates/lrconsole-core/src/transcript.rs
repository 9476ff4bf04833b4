//! UI-agnostic transcript of the conversation with the agent
//!
//! The transcript is append-only. Entries are never edited after they are
//! recorded; a correction is a new entry. Ids are handed out by the transcript
//! itself so they are strictly increasing no matter how fast the operator types.

use std::fmt;
use std::slice;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::TranscriptError;

/// Ordering key of a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct MessageId(u64);

impl MessageId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Who produced a transcript entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Origin {
    User,
    System,
}

/// How a command ended, carried only by system entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    Success,
    Error,
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    id: MessageId,
    text: String,
    origin: Origin,
    outcome: Option<Outcome>,
    created_at: DateTime<Utc>,
}

impl Message {
    pub fn user(id: MessageId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            origin: Origin::User,
            outcome: None,
            created_at: Utc::now(),
        }
    }

    pub fn system(id: MessageId, outcome: Outcome, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            origin: Origin::System,
            outcome: Some(outcome),
            created_at: Utc::now(),
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_error(&self) -> bool {
        self.outcome == Some(Outcome::Error)
    }
}

#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<Message>,
    last_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve the next id. Ids are never reused, even if the caller drops it.
    pub fn mint_id(&mut self) -> MessageId {
        self.last_id += 1;
        MessageId(self.last_id)
    }

    /// Append an entry, rejecting any id that does not follow the last one.
    pub fn append(&mut self, message: Message) -> Result<(), TranscriptError> {
        if let Some(last) = self.messages.last() {
            if message.id <= last.id {
                return Err(TranscriptError::NonMonotonicId {
                    last: last.id,
                    attempted: message.id,
                });
            }
        }
        self.last_id = self.last_id.max(message.id.0);
        self.messages.push(message);
        Ok(())
    }

    pub fn record_user(&mut self, text: impl Into<String>) -> MessageId {
        let id = self.mint_id();
        self.push_minted(Message::user(id, text));
        id
    }

    pub fn record_system(&mut self, outcome: Outcome, text: impl Into<String>) -> MessageId {
        let id = self.mint_id();
        self.push_minted(Message::system(id, outcome, text));
        id
    }

    // A freshly minted id is always above every appended id.
    fn push_minted(&mut self, message: Message) {
        debug_assert!(self.messages.last().map_or(true, |last| last.id < message.id));
        self.messages.push(message);
    }

    pub fn snapshot(&self) -> TranscriptView<'_> {
        TranscriptView {
            messages: &self.messages,
        }
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
}

/// Read-only, ordered view over the transcript for rendering
#[derive(Debug, Clone, Copy)]
pub struct TranscriptView<'a> {
    messages: &'a [Message],
}

impl<'a> TranscriptView<'a> {
    pub fn iter(&self) -> slice::Iter<'a, Message> {
        self.messages.iter()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&'a Message> {
        self.messages.get(index)
    }

    pub fn last(&self) -> Option<&'a Message> {
        self.messages.last()
    }

    pub fn as_slice(&self) -> &'a [Message] {
        self.messages
    }
}

impl<'a> IntoIterator for TranscriptView<'a> {
    type Item = &'a Message;
    type IntoIter = slice::Iter<'a, Message>;

    fn into_iter(self) -> Self::IntoIter {
        self.messages.iter()
    }
}
