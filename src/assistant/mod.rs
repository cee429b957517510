//! The video assistant: upload, chat, clear and quiz flows.
//!
//! [`VideoAssistant`] ties the session store, the history budget manager, the
//! prompt assembler, the LLM provider and the transcriber together. The HTTP
//! gateway is a thin layer over these four methods.
//!
//! # Chat flow
//!
//! 1. Snapshot the session's history, transcript and epoch, then release the lock.
//! 2. Build the preamble, truncate the history to the context budget and
//!    assemble the prompt. No lock is held.
//! 3. Call the generator under the configured timeout and decode the reply.
//! 4. Re-lock and append the turn, but only if the session was not reset in
//!    the meantime. Any failure before this point leaves the history as it was.

pub mod prompts;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{ClipchatError, Result};
use crate::history::{
    counter_from_config, HistoryBudgetManager, PromptAssembler, TokenCounter, Turn,
};
use crate::log_component;
use crate::providers::{
    decode_json_reply, provider_from_config, ChatOptions, LLMProvider, Message, Validate,
};
use crate::quiz::{quiz_prompt, Quiz};
use crate::session::{sanitize_key, SessionManager};
use crate::transcription::{render_transcript, Transcriber, WhisperTranscriber};

/// Reply used by chat and quiz when the session has no transcript.
pub const NO_TRANSCRIPT_MESSAGE: &str =
    "I currently do not have any transcript. Please upload a video first.";

/// Confirmation returned by `clear`.
pub const CLEARED_MESSAGE: &str = "Conversation history and transcript cleared.";

/// What a chat request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// The model's decoded answer.
    Answer(String),
    /// No video has been uploaded for this session.
    NoTranscript,
}

impl ChatOutcome {
    /// Text to show the user.
    pub fn text(&self) -> &str {
        match self {
            ChatOutcome::Answer(text) => text,
            ChatOutcome::NoTranscript => NO_TRANSCRIPT_MESSAGE,
        }
    }
}

/// What a quiz request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuizOutcome {
    Quiz(Quiz),
    NoTranscript,
}

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Name the client sent
    pub filename: String,
    /// Where the video was stored
    pub file_path: String,
    /// Rendered transcript now attached to the session
    pub transcript: String,
}

/// Typed shape of the model's chat reply.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChatAnswer {
    pub response: String,
}

impl Validate for ChatAnswer {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.response.trim().is_empty() {
            Err("\"response\" is empty".into())
        } else {
            Ok(())
        }
    }
}

/// Knobs the assistant reads from [`Config`].
#[derive(Debug, Clone)]
pub struct AssistantSettings {
    pub model: String,
    pub max_context_tokens: usize,
    pub generation_timeout: Duration,
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub quiz_questions: usize,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
    pub allowed_extensions: Vec<String>,
}

impl AssistantSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model: config.chat.model.clone(),
            max_context_tokens: config.chat.max_context_tokens,
            generation_timeout: Duration::from_secs(config.chat.generation_timeout_secs),
            temperature: config.chat.temperature,
            top_p: config.chat.top_p,
            max_output_tokens: config.chat.max_output_tokens,
            quiz_questions: config.chat.quiz_questions,
            upload_dir: PathBuf::from(&config.server.upload_dir),
            max_upload_bytes: config.server.max_upload_bytes,
            allowed_extensions: config
                .server
                .allowed_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn chat_options(&self) -> ChatOptions {
        ChatOptions::new()
            .with_temperature(self.temperature)
            .with_top_p(self.top_p)
            .with_max_tokens(self.max_output_tokens)
            .with_json_output()
    }
}

/// Return the lowercase extension of `file_name` if it is allowed.
///
/// ```
/// use clipchat::assistant::validate_extension;
///
/// let allowed = vec!["mp4".to_string(), "mkv".to_string()];
/// assert_eq!(validate_extension("Talk.MP4", &allowed).unwrap(), "mp4");
/// assert!(validate_extension("notes.txt", &allowed).is_err());
/// ```
pub fn validate_extension(file_name: &str, allowed: &[String]) -> Result<String> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .ok_or_else(|| {
            ClipchatError::InvalidUpload(format!("'{}' has no file extension", file_name))
        })?;

    if allowed.iter().any(|a| a == &ext) {
        Ok(ext)
    } else {
        Err(ClipchatError::InvalidUpload(format!(
            "file type '.{}' is not allowed (allowed: {})",
            ext,
            allowed.join(", ")
        )))
    }
}

/// Orchestrates the per-session video Q&A flows.
pub struct VideoAssistant {
    sessions: SessionManager,
    budget: HistoryBudgetManager,
    assembler: PromptAssembler,
    provider: Arc<dyn LLMProvider>,
    transcriber: Arc<dyn Transcriber>,
    settings: AssistantSettings,
}

impl VideoAssistant {
    /// Assemble an assistant from explicit collaborators.
    pub fn new(
        config: &Config,
        provider: Arc<dyn LLMProvider>,
        transcriber: Arc<dyn Transcriber>,
        counter: Arc<dyn TokenCounter>,
    ) -> Self {
        Self {
            sessions: SessionManager::with_max_turns(config.chat.max_stored_turns),
            budget: HistoryBudgetManager::new(counter),
            assembler: PromptAssembler::new(config.chat.line_separator),
            provider,
            transcriber,
            settings: AssistantSettings::from_config(config),
        }
    }

    /// Build the configured provider, transcriber and token counter.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = provider_from_config(config)?;
        let transcriber = Arc::new(WhisperTranscriber::from_config(config)?);
        let counter = counter_from_config(config);
        Ok(Self::new(config, provider, transcriber, counter))
    }

    pub fn sessions(&self) -> &SessionManager {
        &self.sessions
    }

    pub fn budget(&self) -> &HistoryBudgetManager {
        &self.budget
    }

    pub fn settings(&self) -> &AssistantSettings {
        &self.settings
    }

    /// Store an uploaded video, transcribe it, and attach the transcript to
    /// the session (replacing any previous one).
    pub async fn upload(
        &self,
        session_key: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadReceipt> {
        let ext = validate_extension(file_name, &self.settings.allowed_extensions)?;
        if bytes.len() > self.settings.max_upload_bytes {
            return Err(ClipchatError::UploadTooLarge {
                size: bytes.len(),
                limit: self.settings.max_upload_bytes,
            });
        }
        let session = self.sessions.get_or_create(session_key).await?;

        tokio::fs::create_dir_all(&self.settings.upload_dir).await?;
        let file_path = self.settings.upload_dir.join(format!(
            "{}_uploaded_video.{}",
            sanitize_key(session_key),
            ext
        ));
        tokio::fs::write(&file_path, &bytes).await?;

        let size = bytes.len();
        let segments = self.transcriber.transcribe(bytes, file_name).await?;
        let transcript = render_transcript(&segments);

        session.lock().await.set_transcript(transcript.clone());

        log_component!(
            info,
            "upload",
            "Transcript stored",
            session = session_key,
            bytes = size,
            segments = segments.len(),
            transcriber = self.transcriber.name(),
        );

        Ok(UploadReceipt {
            filename: file_name.to_string(),
            file_path: file_path.display().to_string(),
            transcript,
        })
    }

    /// Answer `message` about the session's video.
    pub async fn chat(&self, session_key: &str, message: &str) -> Result<ChatOutcome> {
        if message.trim().is_empty() {
            return Err(ClipchatError::InvalidInput("message is empty".into()));
        }
        let session = self.sessions.get_or_create(session_key).await?;
        let snapshot = session.lock().await.snapshot();

        let Some(transcript) = snapshot.transcript.filter(|t| !t.trim().is_empty()) else {
            return Ok(ChatOutcome::NoTranscript);
        };

        let preamble = prompts::chat_preamble(&transcript);
        let truncation = self
            .budget
            .truncate_with_report(
                &snapshot.history,
                self.settings.max_context_tokens,
                Some(&preamble),
            )
            .await;
        let prompt = self
            .assembler
            .assemble(Some(&preamble), &truncation.kept, message);

        let raw = self.generate(&prompt).await?;
        let answer: ChatAnswer = decode_json_reply(&raw)?;

        let recorded = session.lock().await.append_if_current(
            snapshot.epoch,
            Turn::new(message, answer.response.clone()),
        );

        log_component!(
            info,
            "chat",
            "Answered",
            session = session_key,
            history_kept = truncation.kept.len(),
            history_dropped = truncation.dropped,
            context_tokens = truncation.tokens_used,
            recorded = recorded,
        );
        if !recorded {
            log_component!(
                warn,
                "chat",
                "Session was reset during generation, turn not recorded",
                session = session_key,
            );
        }

        Ok(ChatOutcome::Answer(answer.response))
    }

    /// Empty the session's history and drop its transcript.
    pub async fn clear(&self, session_key: &str) -> Result<()> {
        let session = self.sessions.get_or_create(session_key).await?;
        session.lock().await.clear();
        log_component!(info, "chat", "Session cleared", session = session_key);
        Ok(())
    }

    /// Generate a quiz from the session's transcript. History is not touched.
    pub async fn quiz(&self, session_key: &str) -> Result<QuizOutcome> {
        let session = self.sessions.get_or_create(session_key).await?;
        let transcript = session.lock().await.transcript().map(str::to_string);

        let Some(transcript) = transcript.filter(|t| !t.trim().is_empty()) else {
            return Ok(QuizOutcome::NoTranscript);
        };

        let raw = self
            .generate(&quiz_prompt(&transcript, self.settings.quiz_questions))
            .await?;
        let quiz: Quiz = decode_json_reply(&raw)?;

        log_component!(
            info,
            "quiz",
            "Quiz generated",
            session = session_key,
            questions = quiz.questions.len(),
        );
        Ok(QuizOutcome::Quiz(quiz))
    }

    /// One generator call under the configured deadline.
    async fn generate(&self, prompt: &str) -> Result<String> {
        let call = self.provider.chat(
            vec![Message::user(prompt)],
            Some(&self.settings.model),
            self.settings.chat_options(),
        );

        match tokio::time::timeout(self.settings.generation_timeout, call).await {
            Ok(Ok(response)) => Ok(response.content),
            Ok(Err(e)) => {
                log_component!(
                    error,
                    "chat",
                    "Generator call failed",
                    provider = self.provider.name(),
                    error = e.to_string(),
                );
                Err(e)
            }
            Err(_) => {
                let secs = self.settings.generation_timeout.as_secs();
                log_component!(
                    error,
                    "chat",
                    "Generator call timed out",
                    provider = self.provider.name(),
                    timeout_secs = secs,
                );
                Err(ClipchatError::Timeout(secs))
            }
        }
    }
}
