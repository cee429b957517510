//! Session types for Clipchat
//!
//! A [`ConversationSession`] holds everything one user's conversation needs:
//! the chat [`History`] and the transcript of their most recent upload.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_STORED_TURNS;
use crate::history::{History, Turn};

/// Per-session conversation state.
///
/// `epoch` increases whenever the conversation is reset or its transcript is
/// replaced. A chat request records the epoch it started under and only
/// appends its turn if the epoch is unchanged when the reply arrives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSession {
    /// Session identifier (e.g. the `x-session-id` header value)
    pub key: String,
    history: History,
    transcript: Option<String>,
    epoch: u64,
    /// Most turns kept in `history`
    #[serde(default = "default_max_turns")]
    max_turns: usize,
    /// When this session was created
    pub created_at: DateTime<Utc>,
    /// When this session was last modified
    pub updated_at: DateTime<Utc>,
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_STORED_TURNS
}

/// Read-only copy of the state a chat request needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub history: History,
    pub transcript: Option<String>,
    pub epoch: u64,
}

impl ConversationSession {
    /// Create a new empty session with the given key.
    ///
    /// # Example
    /// ```
    /// use clipchat::session::ConversationSession;
    ///
    /// let session = ConversationSession::new("browser-tab-1");
    /// assert!(session.history().is_empty());
    /// assert!(session.transcript().is_none());
    /// ```
    pub fn new(key: &str) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            history: History::new(),
            transcript: None,
            epoch: 0,
            max_turns: DEFAULT_MAX_STORED_TURNS,
            created_at: now,
            updated_at: now,
        }
    }

    /// Cap the stored history at `max_turns` (at least 1).
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn transcript(&self) -> Option<&str> {
        self.transcript.as_deref()
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Copy out history, transcript and epoch so the lock can be released.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            history: self.history.clone(),
            transcript: self.transcript.clone(),
            epoch: self.epoch,
        }
    }

    /// Replace the transcript. Existing turns are kept, but in-flight chat
    /// requests started against the old transcript will not be recorded.
    pub fn set_transcript(&mut self, transcript: impl Into<String>) {
        self.transcript = Some(transcript.into());
        self.bump();
    }

    /// Empty the history and unset the transcript.
    pub fn clear(&mut self) {
        self.history = History::new();
        self.transcript = None;
        self.bump();
    }

    /// Append `turn` if nothing reset the session since `epoch` was observed.
    ///
    /// Returns `false` (and leaves the history alone) when the epoch moved.
    /// The oldest turns are dropped once the history exceeds `max_turns`.
    pub fn append_if_current(&mut self, epoch: u64, turn: Turn) -> bool {
        if epoch != self.epoch {
            return false;
        }
        self.history = self.history.appended_capped(turn, self.max_turns);
        self.updated_at = Utc::now();
        true
    }

    /// Seconds since the last modification, clamped at zero.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> u64 {
        (now - self.updated_at).num_seconds().max(0) as u64
    }

    fn bump(&mut self) {
        self.epoch = self.epoch.wrapping_add(1);
        self.updated_at = Utc::now();
    }
}
