//! Configuration type definitions for Clipchat
//!
//! This module defines all configuration structs used throughout the service.
//! All types implement serde traits for JSON serialization and have sensible defaults.

use serde::{Deserialize, Serialize};

/// Main configuration struct for Clipchat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server and upload handling
    pub server: ServerConfig,
    /// Chat behaviour: model, context budget, prompt layout
    pub chat: ChatConfig,
    /// LLM provider used to generate answers and quizzes
    pub provider: ProviderConfig,
    /// Token counting backend
    pub tokens: TokensConfig,
    /// Speech-to-text service
    pub transcription: TranscriptionConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// Server Configuration
// ============================================================================

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory uploaded videos are written to
    pub upload_dir: String,
    /// Maximum accepted upload size in bytes
    pub max_upload_bytes: usize,
    /// Container extensions accepted by the upload endpoint (lowercase, no dot)
    pub allowed_extensions: Vec<String>,
    /// Sessions idle for longer than this are dropped. 0 disables eviction.
    pub session_idle_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            upload_dir: "uploads".to_string(),
            max_upload_bytes: 200 * 1024 * 1024,
            allowed_extensions: DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            session_idle_secs: 3600,
        }
    }
}

/// Video containers accepted when no allow-list is configured.
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["mp4", "avi", "mov", "mkv", "flv"];

// ============================================================================
// Chat Configuration
// ============================================================================

/// Line separator used when assembling the literal prompt.
///
/// One deployment uses exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineSeparator {
    /// Plain `\n`
    #[default]
    Newline,
    /// Markup line break `<br>`
    HtmlBreak,
}

impl LineSeparator {
    /// The literal separator text.
    pub fn as_str(&self) -> &'static str {
        match self {
            LineSeparator::Newline => "\n",
            LineSeparator::HtmlBreak => "<br>",
        }
    }
}

/// Chat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Model identifier sent to the provider
    pub model: String,
    /// Token ceiling for preamble plus retained history
    pub max_context_tokens: usize,
    /// Prompt line separator
    pub line_separator: LineSeparator,
    /// Deadline for one generator call
    pub generation_timeout_secs: u64,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling parameter
    pub top_p: f32,
    /// Maximum tokens the model may generate per reply
    pub max_output_tokens: u32,
    /// Number of questions requested per quiz
    pub quiz_questions: usize,
    /// Most turns kept in a session's stored history; older turns are dropped
    pub max_stored_turns: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            max_context_tokens: 8192,
            line_separator: LineSeparator::Newline,
            generation_timeout_secs: 60,
            temperature: 1.0,
            top_p: 0.95,
            max_output_tokens: 1024,
            quiz_questions: 5,
            max_stored_turns: DEFAULT_MAX_STORED_TURNS,
        }
    }
}

/// Stored-history cap used when none is configured.
pub const DEFAULT_MAX_STORED_TURNS: usize = 200;

// ============================================================================
// Provider Configuration
// ============================================================================

/// OpenAI-compatible provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key for authentication
    pub api_key: Option<String>,
    /// API base URL (OpenAI-compatible)
    pub api_base: Option<String>,
    /// Retry behaviour for transient failures
    pub retry: RetryConfig,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: Some(GEMINI_OPENAI_BASE.to_string()),
            retry: RetryConfig::default(),
        }
    }
}

/// Gemini's OpenAI-compatible endpoint.
pub const GEMINI_OPENAI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/openai";

/// Gemini's native REST endpoint (used for `countTokens`).
pub const GEMINI_NATIVE_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Retry behavior for provider calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable automatic retry for transient provider errors.
    pub enabled: bool,
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay in milliseconds for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds for exponential backoff.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retries: 2,
            base_delay_ms: 1000,
            max_delay_ms: 10_000,
        }
    }
}

// ============================================================================
// Token Counting Configuration
// ============================================================================

/// Which token counter the budget manager uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenCounterBackend {
    /// Offline character heuristic
    #[default]
    Heuristic,
    /// Gemini `countTokens` endpoint
    Gemini,
}

/// Token counting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokensConfig {
    /// Counter backend
    pub backend: TokenCounterBackend,
    /// API key for the remote counter. Falls back to `provider.api_key`.
    pub api_key: Option<String>,
    /// Base URL of the remote counter
    pub api_base: String,
    /// Model whose tokenizer is used. Falls back to `chat.model`.
    pub model: Option<String>,
}

impl Default for TokensConfig {
    fn default() -> Self {
        Self {
            backend: TokenCounterBackend::Heuristic,
            api_key: None,
            api_base: GEMINI_NATIVE_BASE.to_string(),
            model: None,
        }
    }
}

// ============================================================================
// Transcription Configuration
// ============================================================================

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptionConfig {
    /// API key. Falls back to `provider.api_key`.
    pub api_key: Option<String>,
    /// OpenAI-compatible base URL exposing `/audio/transcriptions`
    pub api_base: String,
    /// Transcription model
    pub model: String,
    /// Spoken language hint (ISO-639-1)
    pub language: String,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "whisper-1".to_string(),
            language: "en".to_string(),
        }
    }
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable, coloured
    Pretty,
    /// Compact single-line text with a `component` field
    #[default]
    Component,
    /// JSON lines
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
    /// Optional file to append JSON logs to
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
