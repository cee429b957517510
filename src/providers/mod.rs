//! Providers module - LLM access behind a single trait
//!
//! The assistant only ever talks to an [`LLMProvider`]. The shipped
//! implementation is [`OpenAIProvider`] (any OpenAI-compatible Chat Completions
//! endpoint, Gemini's included), optionally wrapped in a [`RetryProvider`].
//! Model replies that must be JSON go through [`structured::decode_json_reply`].
//!
//! # Example
//!
//! ```rust,ignore
//! use clipchat::config::Config;
//! use clipchat::providers::{provider_from_config, ChatOptions, Message};
//!
//! async fn example() {
//!     let provider = provider_from_config(&Config::load().unwrap()).unwrap();
//!     let response = provider
//!         .chat(vec![Message::user("Hello!")], None, ChatOptions::new())
//!         .await
//!         .unwrap();
//!     println!("Response: {}", response.content);
//! }
//! ```

pub mod openai;
pub mod retry;
pub mod structured;
mod types;

use std::sync::Arc;

use crate::config::Config;
use crate::error::{ClipchatError, ProviderError, Result};

pub use openai::OpenAIProvider;
pub use retry::RetryProvider;
pub use structured::{decode_json_reply, Validate};
pub use types::{ChatOptions, LLMProvider, LLMResponse, Message, Role, Usage};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        408 => ProviderError::Timeout(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 | 422 => ProviderError::InvalidRequest(body.to_string()),
        503 => ProviderError::Overloaded(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

/// Build the configured provider stack.
///
/// # Errors
///
/// [`ClipchatError::Config`] when no provider API key is configured.
pub fn provider_from_config(config: &Config) -> Result<Arc<dyn LLMProvider>> {
    let api_key = config
        .provider
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            ClipchatError::Config(
                "provider.api_key is not set (or set CLIPCHAT_PROVIDER_API_KEY)".to_string(),
            )
        })?;

    let base = config
        .provider
        .api_base
        .as_deref()
        .unwrap_or(crate::config::GEMINI_OPENAI_BASE);
    let inner = OpenAIProvider::with_base_url(api_key, base).with_default_model(&config.chat.model);

    if config.provider.retry.enabled {
        Ok(Arc::new(RetryProvider::from_config(
            Box::new(inner),
            &config.provider.retry,
        )))
    } else {
        Ok(Arc::new(inner))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_auth() {
        assert!(matches!(parse_provider_error(401, "bad key"), ProviderError::Auth(_)));
        assert!(matches!(parse_provider_error(403, "denied"), ProviderError::Auth(_)));
    }

    #[test]
    fn test_parse_provider_error_404() {
        let err = parse_provider_error(404, "model not found");
        assert!(matches!(err, ProviderError::ModelNotFound(_)));
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn test_parse_provider_error_429() {
        let err = parse_provider_error(429, "rate limited");
        assert!(matches!(err, ProviderError::RateLimit(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_400() {
        let err = parse_provider_error(400, "bad json");
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_5xx() {
        assert!(matches!(parse_provider_error(500, "boom"), ProviderError::ServerError(_)));
        assert!(matches!(parse_provider_error(502, "bad gateway"), ProviderError::ServerError(_)));
        assert!(matches!(parse_provider_error(503, "busy"), ProviderError::Overloaded(_)));
        assert!(parse_provider_error(504, "gateway timeout").is_retryable());
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "i'm a teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }

    #[test]
    fn test_provider_from_config_requires_key() {
        let config = Config::default();
        assert!(matches!(
            provider_from_config(&config),
            Err(ClipchatError::Config(_))
        ));
    }

    #[test]
    fn test_provider_from_config_uses_chat_model() {
        let mut config = Config::default();
        config.provider.api_key = Some("key".into());
        config.chat.model = "gemini-1.5-pro".into();
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.default_model(), "gemini-1.5-pro");
        assert_eq!(provider.name(), "openai");

        config.provider.retry.enabled = false;
        assert_eq!(
            provider_from_config(&config).unwrap().default_model(),
            "gemini-1.5-pro"
        );
    }
}
