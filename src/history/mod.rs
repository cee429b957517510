//! Conversation history under a token budget.
//!
//! - [`types`]: [`Turn`] and [`History`]
//! - [`counter`]: the [`TokenCounter`] seam and its backends
//! - [`budget`]: [`HistoryBudgetManager`], FIFO truncation to a token ceiling
//! - [`prompt`]: [`PromptAssembler`], the literal prompt sent to the generator

pub mod budget;
pub mod counter;
pub mod prompt;
pub mod types;

pub use budget::{HistoryBudgetManager, Truncation};
pub use counter::{counter_from_config, GeminiTokenCounter, HeuristicTokenCounter, TokenCounter};
pub use prompt::PromptAssembler;
pub use types::{History, Turn};
