//! Configuration management for Clipchat
//!
//! Configuration is loaded from `~/.clipchat/config.json` (or an explicit path)
//! with environment variable overrides of the form `CLIPCHAT_SECTION_KEY`.

mod types;
pub mod validate;

pub use types::*;

use crate::error::Result;
use std::path::{Path, PathBuf};
use std::str::FromStr;

impl Config {
    /// Returns the Clipchat configuration directory path (~/.clipchat)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".clipchat")
    }

    /// Returns the path to the config file (~/.clipchat/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        // Server
        if let Ok(val) = std::env::var("CLIPCHAT_SERVER_HOST") {
            self.server.host = val;
        }
        if let Some(v) = env_parse("CLIPCHAT_SERVER_PORT") {
            self.server.port = v;
        }
        if let Ok(val) = std::env::var("CLIPCHAT_SERVER_UPLOAD_DIR") {
            self.server.upload_dir = val;
        }
        if let Some(v) = env_parse("CLIPCHAT_SERVER_MAX_UPLOAD_BYTES") {
            self.server.max_upload_bytes = v;
        }
        if let Some(v) = env_parse("CLIPCHAT_SERVER_SESSION_IDLE_SECS") {
            self.server.session_idle_secs = v;
        }

        // Chat
        if let Ok(val) = std::env::var("CLIPCHAT_CHAT_MODEL") {
            self.chat.model = val;
        }
        if let Some(v) = env_parse("CLIPCHAT_CHAT_MAX_CONTEXT_TOKENS") {
            self.chat.max_context_tokens = v;
        }
        if let Some(v) = env_parse("CLIPCHAT_CHAT_GENERATION_TIMEOUT_SECS") {
            self.chat.generation_timeout_secs = v;
        }
        if let Some(v) = env_parse("CLIPCHAT_CHAT_QUIZ_QUESTIONS") {
            self.chat.quiz_questions = v;
        }
        if let Some(v) = env_parse("CLIPCHAT_CHAT_MAX_STORED_TURNS") {
            self.chat.max_stored_turns = v;
        }
        if let Ok(val) = std::env::var("CLIPCHAT_CHAT_LINE_SEPARATOR") {
            match val.as_str() {
                "newline" => self.chat.line_separator = LineSeparator::Newline,
                "html_break" => self.chat.line_separator = LineSeparator::HtmlBreak,
                _ => {}
            }
        }

        // Provider
        if let Ok(val) = std::env::var("CLIPCHAT_PROVIDER_API_KEY") {
            self.provider.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("CLIPCHAT_PROVIDER_API_BASE") {
            self.provider.api_base = Some(val);
        }

        // Tokens
        if let Ok(val) = std::env::var("CLIPCHAT_TOKENS_BACKEND") {
            match val.as_str() {
                "heuristic" => self.tokens.backend = TokenCounterBackend::Heuristic,
                "gemini" => self.tokens.backend = TokenCounterBackend::Gemini,
                _ => {}
            }
        }
        if let Ok(val) = std::env::var("CLIPCHAT_TOKENS_API_KEY") {
            self.tokens.api_key = Some(val);
        }

        // Transcription
        if let Ok(val) = std::env::var("CLIPCHAT_TRANSCRIPTION_API_KEY") {
            self.transcription.api_key = Some(val);
        }
        if let Ok(val) = std::env::var("CLIPCHAT_TRANSCRIPTION_API_BASE") {
            self.transcription.api_base = val;
        }
        if let Ok(val) = std::env::var("CLIPCHAT_TRANSCRIPTION_MODEL") {
            self.transcription.model = val;
        }

        // Logging
        if let Ok(val) = std::env::var("CLIPCHAT_LOGGING_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::path())
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// API key for the token counter, falling back to the provider key.
    pub fn tokens_api_key(&self) -> Option<String> {
        self.tokens
            .api_key
            .clone()
            .or_else(|| self.provider.api_key.clone())
    }

    /// Model whose tokenizer the remote counter should use.
    pub fn tokens_model(&self) -> &str {
        self.tokens.model.as_deref().unwrap_or(&self.chat.model)
    }

    /// API key for transcription, falling back to the provider key.
    pub fn transcription_api_key(&self) -> Option<String> {
        self.transcription
            .api_key
            .clone()
            .or_else(|| self.provider.api_key.clone())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.chat.max_context_tokens, 8192);
        assert_eq!(config.chat.line_separator, LineSeparator::Newline);
        assert_eq!(config.tokens.backend, TokenCounterBackend::Heuristic);
        assert_eq!(
            config.server.allowed_extensions,
            vec!["mp4", "avi", "mov", "mkv", "flv"]
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"chat": {"max_context_tokens": 4096}}"#).unwrap();
        assert_eq!(config.chat.max_context_tokens, 4096);
        assert_eq!(config.chat.generation_timeout_secs, 60);
        assert_eq!(config.server.port, 8000);
    }

    #[test]
    fn test_line_separator_deserialize() {
        let config: Config =
            serde_json::from_str(r#"{"chat": {"line_separator": "html_break"}}"#).unwrap();
        assert_eq!(config.chat.line_separator, LineSeparator::HtmlBreak);
        assert_eq!(config.chat.line_separator.as_str(), "<br>");
    }

    #[test]
    fn test_token_backend_deserialize() {
        let config: Config =
            serde_json::from_str(r#"{"tokens": {"backend": "gemini"}}"#).unwrap();
        assert_eq!(config.tokens.backend, TokenCounterBackend::Gemini);
    }

    #[test]
    fn test_key_fallbacks() {
        let mut config = Config::default();
        config.provider.api_key = Some("provider-key".to_string());
        assert_eq!(config.tokens_api_key().as_deref(), Some("provider-key"));
        assert_eq!(
            config.transcription_api_key().as_deref(),
            Some("provider-key")
        );

        config.transcription.api_key = Some("whisper-key".to_string());
        assert_eq!(
            config.transcription_api_key().as_deref(),
            Some("whisper-key")
        );
    }

    #[test]
    fn test_tokens_model_falls_back_to_chat_model() {
        let mut config = Config::default();
        assert_eq!(config.tokens_model(), "gemini-2.0-flash");
        config.tokens.model = Some("gemini-1.5-pro".to_string());
        assert_eq!(config.tokens_model(), "gemini-1.5-pro");
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.chat.max_context_tokens = 2048;
        config.server.upload_dir = "/tmp/videos".to_string();
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.chat.max_context_tokens, 2048);
        assert_eq!(loaded.server.upload_dir, "/tmp/videos");
    }

    #[test]
    fn test_load_missing_file_returns_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.chat.model, "gemini-2.0-flash");
    }
}
