//! Error types for Clipchat
//!
//! This module defines all error types used throughout the service.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Categorizes LLM provider HTTP errors so retry decisions and HTTP status
/// mapping do not depend on string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401: Invalid API key or authentication failure
    Auth(String),
    /// 429: Rate limit or quota exceeded
    RateLimit(String),
    /// 402: Payment required or billing issue
    Billing(String),
    /// 500/502/503/504: Server-side errors
    ServerError(String),
    /// 400: Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404: Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
    /// Provider is overloaded, retry with backoff
    Overloaded(String),
    /// Request format error, do not retry
    Format(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::Format(msg) => write!(f, "Format error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::ServerError(_)
                | ProviderError::Timeout(_)
                | ProviderError::Overloaded(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) => None,
            ProviderError::Overloaded(_) => Some(503),
            ProviderError::Format(_) => Some(400),
            ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for ClipchatError {
    fn from(err: ProviderError) -> Self {
        ClipchatError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for Clipchat operations.
#[derive(Error, Debug)]
pub enum ClipchatError {
    /// Configuration-related errors (invalid config, missing required fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider failures (transport errors, unparseable bodies)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with classification for retry decisions.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// A provider call exceeded its deadline.
    #[error("Timed out after {0}s waiting for the model")]
    Timeout(u64),

    /// The model replied, but not with the JSON shape we asked for.
    #[error("Malformed model response: {reason} (got: {preview})")]
    MalformedResponse { reason: String, preview: String },

    /// Request body rejected before any work was done (e.g. empty message).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Uploaded file rejected before processing (e.g. extension not allowed).
    #[error("Invalid upload: {0}")]
    InvalidUpload(String),

    /// Uploaded file exceeds the configured size limit.
    #[error("Upload too large: {size} bytes exceeds limit of {limit} bytes")]
    UploadTooLarge { size: usize, limit: usize },

    /// Transcription service failures
    #[error("Transcription error: {0}")]
    Transcription(String),

    /// Token counting service failures
    #[error("Token counting failed: {0}")]
    TokenCount(String),

    /// Session management errors
    #[error("Session error: {0}")]
    Session(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl ClipchatError {
    /// Returns `true` for failures caused by the generator or its output,
    /// which callers should surface as a retryable server-side error.
    pub fn is_generator_failure(&self) -> bool {
        matches!(
            self,
            ClipchatError::Provider(_)
                | ClipchatError::ProviderTyped(_)
                | ClipchatError::Timeout(_)
                | ClipchatError::MalformedResponse { .. }
        )
    }
}

/// A specialized `Result` type for Clipchat operations.
pub type Result<T> = std::result::Result<T, ClipchatError>;
