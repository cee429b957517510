//! Retry provider - decorator that adds automatic retry with exponential backoff.
//!
//! Wraps any [`LLMProvider`] to transparently retry transient errors such as
//! HTTP 429 (rate limit), 5xx (server errors), overload and dropped connections.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipchat::providers::{OpenAIProvider, RetryProvider};
//!
//! let inner = OpenAIProvider::new("api-key");
//! let provider = RetryProvider::new(Box::new(inner))
//!     .with_max_retries(2)
//!     .with_base_delay_ms(500);
//! ```

use async_trait::async_trait;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::{ClipchatError, Result};

use super::{ChatOptions, LLMProvider, LLMResponse, Message};

/// Substrings of untyped provider errors that indicate a transient failure.
const RETRYABLE_PATTERNS: &[&str] = &[
    "429",
    "502",
    "503",
    "504",
    "rate limit",
    "overloaded",
    "timed out",
    "connection reset",
    "connection closed",
];

/// A decorator provider that retries transient errors with exponential backoff.
///
/// Non-transient errors (bad request, auth, unknown model) are returned
/// immediately. The outer generation timeout still bounds the total time
/// spent across all attempts.
pub struct RetryProvider {
    inner: Box<dyn LLMProvider>,
    max_retries: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
}

impl std::fmt::Debug for RetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryProvider")
            .field("inner", &self.inner.name())
            .field("max_retries", &self.max_retries)
            .field("base_delay_ms", &self.base_delay_ms)
            .field("max_delay_ms", &self.max_delay_ms)
            .finish()
    }
}

impl RetryProvider {
    /// Wrap `inner` with the default retry policy (see [`RetryConfig`]).
    pub fn new(inner: Box<dyn LLMProvider>) -> Self {
        Self::from_config(inner, &RetryConfig::default())
    }

    /// Wrap `inner` with the policy from `config`.
    pub fn from_config(inner: Box<dyn LLMProvider>, config: &RetryConfig) -> Self {
        Self {
            inner,
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay. Attempt `n` waits
    /// `min(base_delay_ms * 2^n + jitter, max_delay_ms)`.
    pub fn with_base_delay_ms(mut self, base_delay_ms: u64) -> Self {
        self.base_delay_ms = base_delay_ms;
        self
    }

    pub fn with_max_delay_ms(mut self, max_delay_ms: u64) -> Self {
        self.max_delay_ms = max_delay_ms;
        self
    }
}

/// Whether `err` is a transient failure worth retrying.
///
/// Typed provider errors decide for themselves via
/// [`ProviderError::is_retryable`](crate::error::ProviderError::is_retryable);
/// untyped transport errors are matched against known transient patterns.
pub fn is_retryable(err: &ClipchatError) -> bool {
    match err {
        ClipchatError::ProviderTyped(pe) => pe.is_retryable(),
        ClipchatError::Provider(msg) => {
            let msg = msg.to_lowercase();
            RETRYABLE_PATTERNS.iter().any(|p| msg.contains(p))
        }
        _ => false,
    }
}

/// Backoff delay for `attempt` (0-indexed) without sleeping.
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> u64 {
    let exponential = base_delay_ms.saturating_mul(1u64 << attempt.min(16));
    exponential.saturating_add(jitter_ms).min(max_delay_ms)
}

/// Sleep for the backoff delay of `attempt`.
///
/// Jitter comes from the sub-second part of the system clock, bounded by
/// `base_delay_ms`.
pub async fn delay_with_jitter(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) {
    let jitter_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % base_delay_ms.max(1))
        .unwrap_or(0);
    let delay = compute_delay(attempt, base_delay_ms, max_delay_ms, jitter_ms);
    tokio::time::sleep(std::time::Duration::from_millis(delay)).await;
}

#[async_trait]
impl LLMProvider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn default_model(&self) -> &str {
        self.inner.default_model()
    }

    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let mut attempt = 0;
        loop {
            match self
                .inner
                .chat(messages.clone(), model, options.clone())
                .await
            {
                Ok(response) => return Ok(response),
                Err(err) if attempt < self.max_retries && is_retryable(&err) => {
                    attempt += 1;
                    warn!(
                        provider = self.inner.name(),
                        attempt = attempt,
                        max_retries = self.max_retries,
                        error = %err,
                        "Retrying chat request after transient error"
                    );
                    delay_with_jitter(attempt - 1, self.base_delay_ms, self.max_delay_ms).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
