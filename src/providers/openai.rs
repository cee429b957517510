//! OpenAI-compatible Provider Implementation
//!
//! Implements `LLMProvider` for the Chat Completions API. Gemini exposes the
//! same API under `.../v1beta/openai`, which is the default base URL.
//!
//! # Example
//!
//! ```rust,ignore
//! use clipchat::providers::{openai::OpenAIProvider, ChatOptions, LLMProvider, Message};
//!
//! async fn example() {
//!     let provider = OpenAIProvider::with_base_url("your-api-key", clipchat::config::GEMINI_OPENAI_BASE);
//!     let response = provider
//!         .chat(vec![Message::user("Hello!")], Some("gemini-2.0-flash"), ChatOptions::default())
//!         .await
//!         .unwrap();
//!     println!("{}", response.content);
//! }
//! ```

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ClipchatError, Result};

use super::{parse_provider_error, ChatOptions, LLMProvider, LLMResponse, Message, Usage};

/// The OpenAI API endpoint URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// The default model to use.
const DEFAULT_MODEL: &str = "gemini-2.0-flash";

// ============================================================================
// API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    r#type: &'static str,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

/// Error body shape shared by OpenAI and Gemini's compatibility layer.
/// Gemini sometimes wraps it in a one-element array.
#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
    #[serde(default)]
    r#type: Option<String>,
}

// ============================================================================
// Provider
// ============================================================================

/// OpenAI-compatible LLM provider.
pub struct OpenAIProvider {
    api_key: String,
    api_base: String,
    default_model: String,
    client: Client,
}

impl OpenAIProvider {
    /// Create a provider for the public OpenAI endpoint.
    ///
    /// # Example
    /// ```
    /// use clipchat::providers::openai::OpenAIProvider;
    /// use clipchat::providers::LLMProvider;
    ///
    /// let provider = OpenAIProvider::new("sk-xxx");
    /// assert_eq!(provider.name(), "openai");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, OPENAI_API_URL)
    }

    /// Create a provider for an OpenAI-compatible API (Gemini, vLLM, ...).
    /// A trailing slash on `api_base` is removed.
    pub fn with_base_url(api_key: &str, api_base: &str) -> Self {
        Self::with_client(api_key, api_base, Client::new())
    }

    /// Create a provider with a custom HTTP client (timeouts, proxies).
    pub fn with_client(api_key: &str, api_base: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    /// Override the model used when `chat` is called without one.
    pub fn with_default_model(mut self, model: &str) -> Self {
        self.default_model = model.to_string();
        self
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn convert_messages(messages: Vec<Message>) -> Vec<OpenAIMessage> {
    messages
        .into_iter()
        .map(|msg| OpenAIMessage {
            role: msg.role.to_string(),
            content: msg.content,
        })
        .collect()
}

fn build_request(model: &str, messages: Vec<Message>, options: ChatOptions) -> OpenAIRequest {
    OpenAIRequest {
        model: model.to_string(),
        messages: convert_messages(messages),
        max_tokens: options.max_tokens,
        temperature: options.temperature,
        top_p: options.top_p,
        response_format: options.json_output.then_some(ResponseFormat {
            r#type: "json_object",
        }),
    }
}

fn convert_response(response: OpenAIResponse) -> LLMResponse {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .unwrap_or_default();

    let mut llm_response = LLMResponse::text(&content);
    if let Some(usage) = response.usage {
        llm_response =
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }
    llm_response
}

/// Pull a human-readable message out of an error body, if it has the usual shape.
fn extract_error_message(body: &str) -> Option<String> {
    let parsed = serde_json::from_str::<OpenAIErrorResponse>(body)
        .ok()
        .or_else(|| {
            serde_json::from_str::<Vec<OpenAIErrorResponse>>(body)
                .ok()?
                .into_iter()
                .next()
        })?;
    Some(match parsed.error.r#type {
        Some(kind) => format!("{} - {}", kind, parsed.error.message),
        None => parsed.error.message,
    })
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(&self.default_model);
        let request = build_request(model, messages, options);

        debug!(model = %model, json_output = request.response_format.is_some(), "Chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ClipchatError::from(crate::error::ProviderError::Timeout(e.to_string()))
                } else {
                    ClipchatError::Provider(format!("request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await.unwrap_or_default();
            let detail = extract_error_message(&error_text).unwrap_or(error_text);
            return Err(parse_provider_error(status, &detail).into());
        }

        let openai_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| ClipchatError::Provider(format!("failed to parse response: {}", e)))?;

        let llm_response = convert_response(openai_response);
        info!(
            model = %model,
            completion_tokens = llm_response.usage.map(|u| u.completion_tokens).unwrap_or(0),
            "Chat completion received"
        );
        Ok(llm_response)
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ============================================================================
// Tests
// ============================================================================
