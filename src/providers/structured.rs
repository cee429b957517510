//! Schema-checked decoding of JSON model replies.
//!
//! Models asked for JSON still sometimes wrap it in a Markdown fence or return
//! prose. [`decode_json_reply`] turns any such reply into either a validated
//! value or a [`ClipchatError::MalformedResponse`].

use serde::de::DeserializeOwned;

use crate::error::{ClipchatError, Result};
use crate::utils::string::one_line_preview;

/// Characters of raw reply kept in a `MalformedResponse` preview.
const PREVIEW_CHARS: usize = 120;

/// Post-deserialization checks a reply type must pass.
///
/// Deserialization proves the shape; `validate` checks what serde cannot,
/// such as "the answer is one of the options".
pub trait Validate {
    fn validate(&self) -> std::result::Result<(), String> {
        Ok(())
    }
}

/// Strip surrounding whitespace and one Markdown code fence, if present.
///
/// ```
/// use clipchat::providers::structured::strip_code_fence;
///
/// assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
/// assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
/// ```
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. `json`) on the opening line.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}

/// Decode a model reply into `T` and validate it.
///
/// # Errors
///
/// [`ClipchatError::MalformedResponse`] if the reply is empty, is not JSON,
/// does not match `T`, or fails `T::validate`.
pub fn decode_json_reply<T>(raw: &str) -> Result<T>
where
    T: DeserializeOwned + Validate,
{
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(malformed("empty reply", raw));
    }

    let value: T = serde_json::from_str(body).map_err(|e| malformed(&e.to_string(), raw))?;
    value.validate().map_err(|reason| malformed(&reason, raw))?;
    Ok(value)
}

fn malformed(reason: &str, raw: &str) -> ClipchatError {
    ClipchatError::MalformedResponse {
        reason: reason.to_string(),
        preview: one_line_preview(raw, PREVIEW_CHARS),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reply {
        response: String,
    }

    impl Validate for Reply {
        fn validate(&self) -> std::result::Result<(), String> {
            if self.response.trim().is_empty() {
                Err("response is empty".into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn test_decode_plain_json() {
        let reply: Reply = decode_json_reply(r#"{"response": "Hello"}"#).unwrap();
        assert_eq!(reply.response, "Hello");
    }

    #[test]
    fn test_decode_fenced_json() {
        let raw = "```json\n{\"response\": \"Fenced\"}\n```";
        let reply: Reply = decode_json_reply(raw).unwrap();
        assert_eq!(reply.response, "Fenced");
    }

    #[test]
    fn test_decode_bare_fence() {
        let reply: Reply = decode_json_reply("```\n{\"response\": \"x\"}\n```").unwrap();
        assert_eq!(reply.response, "x");
    }

    #[test]
    fn test_prose_is_malformed() {
        let err = decode_json_reply::<Reply>("Sure! The video is about Rust.").unwrap_err();
        match err {
            ClipchatError::MalformedResponse { preview, .. } => {
                assert!(preview.starts_with("Sure!"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_shape_is_malformed() {
        let err = decode_json_reply::<Reply>(r#"{"answer": "x"}"#).unwrap_err();
        assert!(matches!(err, ClipchatError::MalformedResponse { .. }));
        assert!(err.to_string().contains("response"));
    }

    #[test]
    fn test_validation_failure_is_malformed() {
        let err = decode_json_reply::<Reply>(r#"{"response": "   "}"#).unwrap_err();
        assert!(err.to_string().contains("response is empty"));
    }

    #[test]
    fn test_empty_reply_is_malformed() {
        let err = decode_json_reply::<Reply>("  \n ").unwrap_err();
        assert!(err.to_string().contains("empty reply"));
    }

    #[test]
    fn test_preview_is_bounded() {
        let raw = "x".repeat(10_000);
        match decode_json_reply::<Reply>(&raw).unwrap_err() {
            ClipchatError::MalformedResponse { preview, .. } => {
                assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_fence_left_alone() {
        assert_eq!(strip_code_fence("```json {"), "```json {");
    }
}
