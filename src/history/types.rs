//! Conversation turn and history types.

use serde::{Deserialize, Serialize};

/// One completed exchange: the user's message and the model's answer.
///
/// Turns are value objects. They are never edited after creation and are
/// always kept or dropped as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    user_text: String,
    model_text: String,
}

impl Turn {
    /// Create a turn from a user message and the model's reply.
    ///
    /// # Example
    /// ```
    /// use clipchat::history::Turn;
    ///
    /// let turn = Turn::new("What is the video about?", "Rust ownership.");
    /// assert_eq!(turn.user_text(), "What is the video about?");
    /// ```
    pub fn new(user_text: impl Into<String>, model_text: impl Into<String>) -> Self {
        Self {
            user_text: user_text.into(),
            model_text: model_text.into(),
        }
    }

    /// The user's side of the exchange.
    pub fn user_text(&self) -> &str {
        &self.user_text
    }

    /// The model's side of the exchange.
    pub fn model_text(&self) -> &str {
        &self.model_text
    }
}

/// Chronological sequence of turns, oldest first.
///
/// A `History` is only ever replaced as a whole: appending produces a new
/// value and truncation returns a new value, so a snapshot taken before a
/// long-running model call can never be changed underneath the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    /// An empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from turns already in chronological order.
    pub fn from_turns(turns: Vec<Turn>) -> Self {
        Self { turns }
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Number of turns.
    pub fn len(&self) -> usize {
        self.turns.len()
    }

    /// `true` when there are no turns.
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The newest turn, if any.
    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// A new history with `turn` appended at the tail.
    ///
    /// # Example
    /// ```
    /// use clipchat::history::{History, Turn};
    ///
    /// let empty = History::new();
    /// let one = empty.appended(Turn::new("hi", "hello"));
    /// assert!(empty.is_empty());
    /// assert_eq!(one.len(), 1);
    /// ```
    pub fn appended(&self, turn: Turn) -> Self {
        let mut turns = Vec::with_capacity(self.turns.len() + 1);
        turns.extend_from_slice(&self.turns);
        turns.push(turn);
        Self { turns }
    }

    /// `self` plus `turn`, keeping at most `max_turns` of the newest turns.
    ///
    /// Costs O(`max_turns`) rather than O(`len`), so a session capped this
    /// way does constant work per recorded turn. A cap of 0 is treated as 1.
    ///
    /// ```
    /// use clipchat::history::{History, Turn};
    ///
    /// let h = History::new()
    ///     .appended_capped(Turn::new("q1", "a1"), 2)
    ///     .appended_capped(Turn::new("q2", "a2"), 2)
    ///     .appended_capped(Turn::new("q3", "a3"), 2);
    /// assert_eq!(h.len(), 2);
    /// assert_eq!(h.turns()[0].user_text(), "q2");
    /// ```
    pub fn appended_capped(&self, turn: Turn, max_turns: usize) -> Self {
        let keep = max_turns.max(1) - 1;
        let start = self.turns.len().saturating_sub(keep);
        let mut turns = Vec::with_capacity(self.turns.len() - start + 1);
        turns.extend_from_slice(&self.turns[start..]);
        turns.push(turn);
        Self { turns }
    }

    /// The last `count` turns as a new history (all of them if `count >= len`).
    pub fn suffix(&self, count: usize) -> Self {
        let start = self.turns.len().saturating_sub(count);
        Self {
            turns: self.turns[start..].to_vec(),
        }
    }

    /// `true` if `self` equals the last `self.len()` turns of `other`.
    pub fn is_suffix_of(&self, other: &History) -> bool {
        other.turns.ends_with(&self.turns)
    }
}
