//! Conversation Log
//!
//! Ordered, append-only record of the turns exchanged in the current chat.
//! It is the source of truth for what a surface renders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who a turn is attributed to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person typing
    User,
    /// The service, or the client speaking on its behalf
    Assistant,
}

/// What kind of assistant turn this is
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnKind {
    /// A real message (user question or assistant answer)
    Reply,
    /// Informational text produced by the client (failures, recovery)
    Notice,
}

/// One message in the conversation
///
/// Immutable once created.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    text: String,
    sender: Sender,
    kind: TurnKind,
    timestamp: DateTime<Utc>,
}

impl Turn {
    /// A user question, timestamped now
    pub fn user(text: impl Into<String>) -> Self {
        Self::at(text, Sender::User, TurnKind::Reply, Utc::now())
    }

    /// An assistant answer, timestamped now
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::at(text, Sender::Assistant, TurnKind::Reply, Utc::now())
    }

    /// An informational notice, timestamped now
    pub fn notice(text: impl Into<String>) -> Self {
        Self::at(text, Sender::Assistant, TurnKind::Notice, Utc::now())
    }

    /// A turn with an explicit timestamp (history replay)
    pub fn at(
        text: impl Into<String>,
        sender: Sender,
        kind: TurnKind,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            text: text.into(),
            sender,
            kind,
            timestamp,
        }
    }

    /// Message text
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Attribution
    #[must_use]
    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// Reply or notice
    #[must_use]
    pub fn kind(&self) -> TurnKind {
        self.kind
    }

    /// When the turn was created
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Append-only turn sequence
#[derive(Clone, Debug, Default)]
pub struct ConversationLog {
    turns: Vec<Turn>,
}

impl ConversationLog {
    /// Create an empty log
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn
    pub(crate) fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Replace the whole log (history load, new conversation)
    pub(crate) fn replace_all(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
    }

    /// All turns, oldest first
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Turns appended at or after `index`
    #[must_use]
    pub fn since(&self, index: usize) -> &[Turn] {
        self.turns.get(index..).unwrap_or(&[])
    }

    /// Most recent turn
    #[must_use]
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Number of turns
    #[must_use]
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// Whether nothing has been said yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
