//! Token counters.
//!
//! The budget manager only needs `text -> token count`. Two backends ship:
//!
//! - [`HeuristicTokenCounter`]: offline `ceil(chars / 4)`. Never fails.
//! - [`GeminiTokenCounter`]: Gemini's `models/{model}:countTokens` endpoint.
//!   Any transport, HTTP or decoding failure is returned as
//!   [`ClipchatError::TokenCount`]; the budget manager decides what a failure
//!   costs.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

use crate::config::{Config, TokenCounterBackend};
use crate::error::{ClipchatError, Result};

/// Maps text to a token count.
///
/// Implementations must be deterministic for a given text.
#[async_trait]
pub trait TokenCounter: Send + Sync {
    /// Count the tokens in `text`.
    async fn count(&self, text: &str) -> Result<usize>;

    /// Short backend name used in logs.
    fn name(&self) -> &str;
}

/// Build the counter selected by `config.tokens.backend`.
pub fn counter_from_config(config: &Config) -> Arc<dyn TokenCounter> {
    match config.tokens.backend {
        TokenCounterBackend::Heuristic => Arc::new(HeuristicTokenCounter::new()),
        TokenCounterBackend::Gemini => Arc::new(GeminiTokenCounter::new(
            config.tokens_api_key().unwrap_or_default().as_str(),
            &config.tokens.api_base,
            config.tokens_model(),
        )),
    }
}

// ============================================================================
// Heuristic counter
// ============================================================================

/// Characters per token assumed by the heuristic.
const CHARS_PER_TOKEN: usize = 4;

/// Offline estimator: one token per four characters, rounded up.
#[derive(Debug, Clone, Default)]
pub struct HeuristicTokenCounter;

impl HeuristicTokenCounter {
    pub fn new() -> Self {
        Self
    }

    /// Synchronous estimate, exposed for callers that do not need the trait.
    ///
    /// # Example
    /// ```
    /// use clipchat::history::HeuristicTokenCounter;
    ///
    /// assert_eq!(HeuristicTokenCounter::estimate(""), 0);
    /// assert_eq!(HeuristicTokenCounter::estimate("hello"), 2);
    /// ```
    pub fn estimate(text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }
}

#[async_trait]
impl TokenCounter for HeuristicTokenCounter {
    async fn count(&self, text: &str) -> Result<usize> {
        Ok(Self::estimate(text))
    }

    fn name(&self) -> &str {
        "heuristic"
    }
}

// ============================================================================
// Gemini countTokens
// ============================================================================

#[derive(Debug, Serialize)]
struct CountTokensRequest<'a> {
    contents: Vec<CountTokensContent<'a>>,
}

#[derive(Debug, Serialize)]
struct CountTokensContent<'a> {
    parts: Vec<CountTokensPart<'a>>,
}

#[derive(Debug, Serialize)]
struct CountTokensPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountTokensResponse {
    total_tokens: usize,
}

/// Remote counter backed by Gemini's `countTokens`.
pub struct GeminiTokenCounter {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl GeminiTokenCounter {
    /// Create a counter for `model` against `api_base`
    /// (e.g. `https://generativelanguage.googleapis.com/v1beta`).
    pub fn new(api_key: &str, api_base: &str, model: &str) -> Self {
        Self::with_client(api_key, api_base, model, Client::new())
    }

    /// Create a counter with a custom HTTP client (timeouts, proxies).
    pub fn with_client(api_key: &str, api_base: &str, model: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.trim_start_matches("models/").to_string(),
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:countTokens", self.api_base, self.model)
    }
}

#[async_trait]
impl TokenCounter for GeminiTokenCounter {
    async fn count(&self, text: &str) -> Result<usize> {
        // The API rejects empty content; empty text is zero tokens anyway.
        if text.is_empty() {
            return Ok(0);
        }
        if self.api_key.is_empty() {
            return Err(ClipchatError::TokenCount(
                "no API key configured for Gemini countTokens".to_string(),
            ));
        }

        let request = CountTokensRequest {
            contents: vec![CountTokensContent {
                parts: vec![CountTokensPart { text }],
            }],
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| ClipchatError::TokenCount(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClipchatError::TokenCount(format!(
                "HTTP {}: {}",
                status,
                crate::utils::string::one_line_preview(&body, 200)
            )));
        }

        let parsed: CountTokensResponse = response
            .json()
            .await
            .map_err(|e| ClipchatError::TokenCount(format!("invalid response: {}", e)))?;

        debug!(model = %self.model, tokens = parsed.total_tokens, "countTokens");
        Ok(parsed.total_tokens)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heuristic_estimate() {
        assert_eq!(HeuristicTokenCounter::estimate(""), 0);
        assert_eq!(HeuristicTokenCounter::estimate("a"), 1);
        assert_eq!(HeuristicTokenCounter::estimate("abcd"), 1);
        assert_eq!(HeuristicTokenCounter::estimate("abcde"), 2);
        assert_eq!(HeuristicTokenCounter::estimate(&"a".repeat(100)), 25);
    }

    #[test]
    fn test_heuristic_counts_chars_not_bytes() {
        // 3 chars, 9 bytes
        assert_eq!(HeuristicTokenCounter::estimate("日本語"), 1);
    }

    #[tokio::test]
    async fn test_heuristic_trait_impl() {
        let counter = HeuristicTokenCounter::new();
        let n = counter.count("hello world").await.unwrap();
        assert_eq!(n, 3);
        assert_eq!(counter.name(), "heuristic");
    }

    #[test]
    fn test_gemini_endpoint() {
        let counter = GeminiTokenCounter::new(
            "key",
            "https://generativelanguage.googleapis.com/v1beta/",
            "models/gemini-2.0-flash",
        );
        assert_eq!(
            counter.endpoint(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:countTokens"
        );
    }

    #[test]
    fn test_count_tokens_request_shape() {
        let request = CountTokensRequest {
            contents: vec![CountTokensContent {
                parts: vec![CountTokensPart { text: "hi" }],
            }],
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"contents":[{"parts":[{"text":"hi"}]}]}));
    }

    #[test]
    fn test_count_tokens_response_parse() {
        let parsed: CountTokensResponse =
            serde_json::from_str(r#"{"totalTokens": 42, "promptTokensDetails": []}"#).unwrap();
        assert_eq!(parsed.total_tokens, 42);
    }

    #[tokio::test]
    async fn test_gemini_empty_text_is_free_without_network() {
        let counter = GeminiTokenCounter::new("", "http://127.0.0.1:9", "m");
        assert_eq!(counter.count("").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_gemini_missing_key_fails() {
        let counter = GeminiTokenCounter::new("", "http://127.0.0.1:9", "m");
        let err = counter.count("hello").await.unwrap_err();
        assert!(matches!(err, ClipchatError::TokenCount(_)));
    }

    #[tokio::test]
    async fn test_gemini_unreachable_host_fails() {
        // Port 9 (discard) is not expected to serve HTTP.
        let counter = GeminiTokenCounter::new("key", "http://127.0.0.1:9", "m");
        let err = counter.count("hello").await.unwrap_err();
        assert!(matches!(err, ClipchatError::TokenCount(_)));
    }

    #[test]
    fn test_counter_from_config() {
        let mut config = Config::default();
        assert_eq!(counter_from_config(&config).name(), "heuristic");
        config.tokens.backend = TokenCounterBackend::Gemini;
        assert_eq!(counter_from_config(&config).name(), "gemini");
    }
}
