//! Core data models used throughout chat-distill.
//!
//! These types represent the messages, conversations, and watermarks that
//! flow through the extraction and dataset pipeline.

use std::fmt;

/// Extraction progress marker: the highest source message id successfully
/// staged. Monotonically non-decreasing across runs; messages at or before it
/// are considered already processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Watermark(pub i64);

impl Watermark {
    /// The pre-first-run watermark: no message has been staged yet.
    pub const ZERO: Watermark = Watermark(0);
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A message row as extracted from the source store, before any cleaning.
/// Immutable once staged.
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub id: i64,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub is_from_self: bool,
    /// Unix seconds on the source clock.
    pub timestamp: i64,
    pub raw_text: Option<String>,
    pub is_attachment: bool,
    pub is_system: bool,
    pub is_reaction: bool,
}

/// A message that survived filtering, with its body normalized.
/// `text` is non-empty after trimming; never a system message, reaction,
/// or bare attachment placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedMessage {
    pub id: i64,
    pub conversation_id: String,
    pub sender_id: Option<String>,
    pub is_from_self: bool,
    pub timestamp: i64,
    pub text: String,
}

/// A maximal run of cleaned messages in one logical conversation with no
/// inter-message gap exceeding the session threshold. Never empty; internally
/// ordered by timestamp.
#[derive(Debug, Clone)]
pub struct Conversation {
    pub conversation_id: String,
    pub messages: Vec<CleanedMessage>,
}

impl Conversation {
    pub fn last_timestamp(&self) -> i64 {
        // Units are never constructed empty.
        self.messages.last().map(|m| m.timestamp).unwrap_or(0)
    }
}
