//! Literal prompt assembly.
//!
//! The generator receives one flat string: the preamble, a blank line, the
//! retained turns as `User:`/`Assistant:` lines, the new message, and a bare
//! `Assistant:` cue for the model to complete.

use super::types::History;
use crate::config::LineSeparator;

/// Builds generator prompts with a single, fixed line separator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PromptAssembler {
    separator: LineSeparator,
}

impl PromptAssembler {
    /// Create an assembler that joins lines with `separator`.
    pub fn new(separator: LineSeparator) -> Self {
        Self { separator }
    }

    /// The separator this assembler uses.
    pub fn separator(&self) -> LineSeparator {
        self.separator
    }

    /// Assemble the prompt for `message` given already-truncated `history`.
    ///
    /// # Example
    /// ```
    /// use clipchat::config::LineSeparator;
    /// use clipchat::history::{History, PromptAssembler, Turn};
    ///
    /// let history = History::new().appended(Turn::new("hi", "hello"));
    /// let prompt = PromptAssembler::new(LineSeparator::Newline)
    ///     .assemble(Some("Be brief."), &history, "bye");
    /// assert_eq!(prompt, "Be brief.\n\nUser: hi\nAssistant: hello\nUser: bye\nAssistant:");
    /// ```
    pub fn assemble(&self, preamble: Option<&str>, history: &History, message: &str) -> String {
        let sep = self.separator.as_str();
        let mut prompt = String::new();

        if let Some(preamble) = preamble {
            prompt.push_str(preamble);
            prompt.push_str(sep);
            prompt.push_str(sep);
        }

        for turn in history.turns() {
            prompt.push_str("User: ");
            prompt.push_str(turn.user_text());
            prompt.push_str(sep);
            prompt.push_str("Assistant: ");
            prompt.push_str(turn.model_text());
            prompt.push_str(sep);
        }

        prompt.push_str("User: ");
        prompt.push_str(message);
        prompt.push_str(sep);
        prompt.push_str("Assistant:");
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::Turn;

    fn two_turns() -> History {
        History::from_turns(vec![Turn::new("q1", "a1"), Turn::new("q2", "a2")])
    }

    #[test]
    fn test_assemble_newline() {
        let prompt = PromptAssembler::new(LineSeparator::Newline).assemble(
            Some("SYSTEM"),
            &two_turns(),
            "q3",
        );
        assert_eq!(
            prompt,
            "SYSTEM\n\nUser: q1\nAssistant: a1\nUser: q2\nAssistant: a2\nUser: q3\nAssistant:"
        );
    }

    #[test]
    fn test_assemble_html_break() {
        let prompt = PromptAssembler::new(LineSeparator::HtmlBreak).assemble(
            Some("SYSTEM"),
            &two_turns(),
            "q3",
        );
        assert_eq!(
            prompt,
            "SYSTEM<br><br>User: q1<br>Assistant: a1<br>User: q2<br>Assistant: a2<br>User: q3<br>Assistant:"
        );
        assert!(!prompt.contains('\n'));
    }

    #[test]
    fn test_assemble_without_preamble_or_history() {
        let prompt = PromptAssembler::default().assemble(None, &History::new(), "hello");
        assert_eq!(prompt, "User: hello\nAssistant:");
    }

    #[test]
    fn test_default_separator_is_newline() {
        assert_eq!(PromptAssembler::default().separator(), LineSeparator::Newline);
    }
}
