//! Multiple-choice quizzes generated from a transcript.

use serde::{Deserialize, Serialize};

use crate::providers::Validate;

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Must equal one of `options`.
    pub answer: String,
    /// `H:MM:SS` position in the video the question is drawn from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A decoded quiz, as returned by `GET /quiz`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quiz {
    pub questions: Vec<QuizQuestion>,
}

impl Validate for Quiz {
    fn validate(&self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err("quiz has no questions".into());
        }
        for (i, q) in self.questions.iter().enumerate() {
            if q.question.trim().is_empty() {
                return Err(format!("question {} has empty text", i + 1));
            }
            if q.options.len() < 2 {
                return Err(format!("question {} has fewer than 2 options", i + 1));
            }
            if !q.options.iter().any(|o| o == &q.answer) {
                return Err(format!(
                    "question {} answer {:?} is not one of its options",
                    i + 1,
                    q.answer
                ));
            }
        }
        Ok(())
    }
}

/// Prompt asking the model for `count` questions about `transcript`.
pub fn quiz_prompt(transcript: &str, count: usize) -> String {
    format!(
        r#"You write multiple-choice quizzes about videos. Below is a timestamped transcript; each segment is formatted as "start --> end: text" and segments are separated by " || ".

Transcript: {transcript}

Write exactly {count} questions that test understanding of the video's content. Each question has 4 options, exactly one of which is correct. Prefer questions about key ideas over trivia, and set "timestamp" to the start time of the segment the question is based on.

Reply with a JSON object only, no prose, in this shape:
{{"questions": [{{"question": "...", "options": ["...", "...", "...", "..."], "answer": "<one of the options, copied exactly>", "timestamp": "H:MM:SS"}}]}}"#
    )
}
