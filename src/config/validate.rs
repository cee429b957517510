//! Configuration validation: unknown field detection and semantic checks.

use serde_json::Value;
use std::collections::HashSet;

use super::{Config, TokenCounterBackend};

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &[
    "server",
    "chat",
    "provider",
    "tokens",
    "transcription",
    "logging",
];

/// Known fields per section.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    (
        "server",
        &[
            "host",
            "port",
            "upload_dir",
            "max_upload_bytes",
            "allowed_extensions",
            "session_idle_secs",
        ],
    ),
    (
        "chat",
        &[
            "model",
            "max_context_tokens",
            "line_separator",
            "generation_timeout_secs",
            "temperature",
            "top_p",
            "max_output_tokens",
            "quiz_questions",
            "max_stored_turns",
        ],
    ),
    ("provider", &["api_key", "api_base", "retry"]),
    ("tokens", &["backend", "api_key", "api_base", "model"]),
    ("transcription", &["api_key", "api_base", "model", "language"]),
    ("logging", &["format", "level", "file"]),
];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn new(level: DiagnosticLevel, path: &str, message: impl Into<String>) -> Self {
        Self {
            level,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Edit distance between two field names, used for "did you mean?" hints.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr = vec![0usize; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != *cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b_chars.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn unknown_field(path: &str, key: &str, known: &[&str]) -> Diagnostic {
    let message = match suggest_field(key, known) {
        Some(hint) => format!("Unknown field '{}', {}", key, hint),
        None => format!("Unknown field '{}'", key),
    };
    Diagnostic::new(DiagnosticLevel::Error, path, message)
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    let obj = match raw.as_object() {
        Some(o) => o,
        None => {
            diagnostics.push(Diagnostic::new(
                DiagnosticLevel::Error,
                "",
                "Config must be a JSON object",
            ));
            return diagnostics;
        }
    };

    diagnostics.push(Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON"));

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL.iter().copied().collect();
    let mut has_unknown = false;
    for key in obj.keys() {
        if !known_top.contains(key.as_str()) {
            has_unknown = true;
            diagnostics.push(unknown_field(key, key, KNOWN_TOP_LEVEL));
        }
    }

    for (section, fields) in KNOWN_SECTIONS {
        let Some(section_obj) = obj.get(*section).and_then(|v| v.as_object()) else {
            continue;
        };
        for key in section_obj.keys() {
            if !fields.contains(&key.as_str()) {
                has_unknown = true;
                let path = format!("{}.{}", section, key);
                diagnostics.push(unknown_field(&path, key, fields));
            }
        }
    }

    if !has_unknown {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Ok,
            "",
            "All fields recognized",
        ));
    }

    diagnostics
}

/// Semantic checks on a loaded configuration.
pub fn validate_semantics(config: &Config) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if config.chat.max_context_tokens == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "chat.max_context_tokens",
            "Must be positive; every conversation would be sent without history",
        ));
    }
    if config.chat.generation_timeout_secs == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "chat.generation_timeout_secs",
            "Must be positive",
        ));
    }
    if config.chat.quiz_questions == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "chat.quiz_questions",
            "Must be at least 1",
        ));
    }
    if config.chat.max_stored_turns == 0 {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "chat.max_stored_turns",
            "Must be at least 1",
        ));
    }
    if config.server.allowed_extensions.is_empty() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Error,
            "server.allowed_extensions",
            "Empty; every upload would be rejected",
        ));
    }
    if config
        .server
        .allowed_extensions
        .iter()
        .any(|ext| ext.starts_with('.') || ext.chars().any(|c| c.is_ascii_uppercase()))
    {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "server.allowed_extensions",
            "Entries should be lowercase without a leading dot",
        ));
    }
    if config.provider.api_key.is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "provider.api_key",
            "Not set; chat and quiz requests will fail",
        ));
    }
    if config.tokens.backend == TokenCounterBackend::Gemini && config.tokens_api_key().is_none() {
        diagnostics.push(Diagnostic::new(
            DiagnosticLevel::Warn,
            "tokens.api_key",
            "Gemini counter has no key; every count will fail open to 0",
        ));
    }

    diagnostics
}

/// Returns `true` if any diagnostic is an error.
pub fn has_errors(diagnostics: &[Diagnostic]) -> bool {
    diagnostics
        .iter()
        .any(|d| d.level == DiagnosticLevel::Error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_levenshtein_identical() {
        assert_eq!(levenshtein("hello", "hello"), 0);
    }

    #[test]
    fn test_levenshtein_one_edit() {
        assert_eq!(levenshtein("hello", "helo"), 1);
        assert_eq!(levenshtein("chat", "chats"), 1);
    }

    #[test]
    fn test_levenshtein_different() {
        assert!(levenshtein("hello", "world") > 3);
    }

    #[test]
    fn test_suggest_field_match() {
        let result = suggest_field("sever", KNOWN_TOP_LEVEL);
        assert!(result.unwrap().contains("server"));
    }

    #[test]
    fn test_suggest_field_no_match() {
        assert!(suggest_field("xyzabcdef", KNOWN_TOP_LEVEL).is_none());
    }

    #[test]
    fn test_validate_valid_config() {
        let raw = json!({
            "chat": {"model": "gemini-2.0-flash", "max_context_tokens": 4096},
            "server": {"port": 8080}
        });
        let diags = validate_config(&raw);
        assert!(!has_errors(&diags));
    }

    #[test]
    fn test_validate_unknown_top_level() {
        let diags = validate_config(&json!({"chatt": {}}));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error && d.message.contains("'chat'")));
    }

    #[test]
    fn test_validate_unknown_section_field() {
        let diags = validate_config(&json!({"chat": {"max_context_token": 10}}));
        let diag = diags
            .iter()
            .find(|d| d.level == DiagnosticLevel::Error)
            .unwrap();
        assert_eq!(diag.path, "chat.max_context_token");
        assert!(diag.message.contains("max_context_tokens"));
    }

    #[test]
    fn test_validate_not_an_object() {
        let diags = validate_config(&json!("not an object"));
        assert!(diags.iter().any(|d| {
            d.level == DiagnosticLevel::Error && d.message.contains("must be a JSON object")
        }));
    }

    #[test]
    fn test_semantics_zero_budget_is_error() {
        let mut config = Config::default();
        config.chat.max_context_tokens = 0;
        let diags = validate_semantics(&config);
        assert!(has_errors(&diags));
        assert!(diags.iter().any(|d| d.path == "chat.max_context_tokens"));
    }

    #[test]
    fn test_semantics_zero_stored_turns_is_error() {
        let mut config = Config::default();
        config.chat.max_stored_turns = 0;
        let diags = validate_semantics(&config);
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Error && d.path == "chat.max_stored_turns"));
    }

    #[test]
    fn test_semantics_missing_key_is_warning_only() {
        let config = Config::default();
        let diags = validate_semantics(&config);
        assert!(!has_errors(&diags));
        assert!(diags
            .iter()
            .any(|d| d.level == DiagnosticLevel::Warn && d.path == "provider.api_key"));
    }

    #[test]
    fn test_semantics_extension_format_warning() {
        let mut config = Config::default();
        config.provider.api_key = Some("k".into());
        config.server.allowed_extensions = vec![".MP4".into()];
        let diags = validate_semantics(&config);
        assert!(diags
            .iter()
            .any(|d| d.path == "server.allowed_extensions" && d.level == DiagnosticLevel::Warn));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::new(DiagnosticLevel::Warn, "chat.model", "odd");
        assert_eq!(d.to_string(), "[WARN] chat.model: odd");
        let d = Diagnostic::new(DiagnosticLevel::Ok, "", "Valid JSON");
        assert_eq!(d.to_string(), "[OK] Valid JSON");
    }
}
