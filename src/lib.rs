//! Clipchat - question answering over the transcript of an uploaded video
//!
//! A client uploads a video, the service transcribes it, and later chat
//! messages are answered by an LLM that sees the transcript plus as much of
//! the conversation as fits in the context budget.

pub mod assistant;
pub mod config;
pub mod error;
pub mod gateway;
pub mod history;
pub mod providers;
pub mod quiz;
pub mod session;
pub mod transcription;
pub mod utils;

pub use assistant::{ChatOutcome, QuizOutcome, UploadReceipt, VideoAssistant};
pub use config::Config;
pub use error::{ClipchatError, ProviderError, Result};
pub use history::{History, HistoryBudgetManager, PromptAssembler, TokenCounter, Turn};
pub use providers::{ChatOptions, LLMProvider, LLMResponse, Message, Role, Usage};
pub use quiz::{Quiz, QuizQuestion};
pub use session::{ConversationSession, SessionManager};
pub use transcription::{Transcriber, TranscriptSegment};
