//! Speech-to-text for uploaded videos.
//!
//! [`WhisperTranscriber`] sends the uploaded container to an OpenAI-compatible
//! `/audio/transcriptions` endpoint and asks for segment timestamps.
//! [`render_transcript`] turns the segments into the single string stored as
//! the session transcript:
//!
//! ```text
//! 0:00:00 --> 0:00:04: Welcome back. || 0:00:04 --> 0:00:09: Today we look at traits.
//! ```

use async_trait::async_trait;
use reqwest::multipart;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::error::{ClipchatError, Result};
use crate::utils::string::one_line_preview;

/// Separator placed between rendered segments.
pub const SEGMENT_SEPARATOR: &str = " || ";

/// One timed span of recognised speech.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub start_secs: f64,
    pub end_secs: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start_secs: f64, end_secs: f64, text: impl Into<String>) -> Self {
        Self {
            start_secs,
            end_secs,
            text: text.into(),
        }
    }
}

/// Turns a video file into ordered transcript segments.
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe `bytes`; `file_name` carries the container extension.
    async fn transcribe(&self, bytes: Vec<u8>, file_name: &str) -> Result<Vec<TranscriptSegment>>;

    /// Backend name for logs.
    fn name(&self) -> &str;
}

/// Format whole seconds as `H:MM:SS`. Fractions are truncated; hours are not padded.
///
/// ```
/// use clipchat::transcription::format_timestamp;
///
/// assert_eq!(format_timestamp(7.9), "0:00:07");
/// assert_eq!(format_timestamp(3725.0), "1:02:05");
/// ```
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}:{:02}", total / 3600, (total % 3600) / 60, total % 60)
}

/// Render segments as `start --> end: text`, joined by [`SEGMENT_SEPARATOR`].
pub fn render_transcript(segments: &[TranscriptSegment]) -> String {
    segments
        .iter()
        .map(|s| {
            format!(
                "{} --> {}: {}",
                format_timestamp(s.start_secs),
                format_timestamp(s.end_secs),
                s.text.trim()
            )
        })
        .collect::<Vec<_>>()
        .join(SEGMENT_SEPARATOR)
}

/// MIME type sent for a video container extension.
pub fn video_mime_type(file_name: &str) -> &'static str {
    let ext = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        "avi" => "video/x-msvideo",
        "mkv" => "video/x-matroska",
        "flv" => "video/x-flv",
        _ => "application/octet-stream",
    }
}

// ============================================================================
// OpenAI-compatible transcription
// ============================================================================

#[derive(Debug, Deserialize)]
struct VerboseTranscription {
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Client for OpenAI-compatible `/audio/transcriptions` (Whisper, Groq, ...).
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    api_key: String,
    api_base: String,
    model: String,
    language: String,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(api_key: &str, api_base: &str, model: &str, language: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: model.to_string(),
            language: language.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build from the `transcription` config section.
    ///
    /// # Errors
    ///
    /// [`ClipchatError::Config`] when neither `transcription.api_key` nor
    /// `provider.api_key` is set.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config
            .transcription_api_key()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                ClipchatError::Config(
                    "transcription.api_key is not set (or set CLIPCHAT_TRANSCRIPTION_API_KEY)"
                        .to_string(),
                )
            })?;
        Ok(Self::new(
            &api_key,
            &config.transcription.api_base,
            &config.transcription.model,
            &config.transcription.language,
        ))
    }
}

/// Convert a verbose_json body into segments.
///
/// Providers that ignore `timestamp_granularities` return only `text`; that
/// becomes a single segment spanning the reported duration.
fn segments_from_body(body: &str) -> Result<Vec<TranscriptSegment>> {
    let parsed: VerboseTranscription = serde_json::from_str(body).map_err(|e| {
        ClipchatError::Transcription(format!(
            "unexpected response ({}): {}",
            e,
            one_line_preview(body, 200)
        ))
    })?;

    if !parsed.segments.is_empty() {
        return Ok(parsed
            .segments
            .into_iter()
            .map(|s| TranscriptSegment::new(s.start, s.end, s.text))
            .collect());
    }

    if parsed.text.trim().is_empty() {
        return Ok(Vec::new());
    }
    Ok(vec![TranscriptSegment::new(
        0.0,
        parsed.duration.unwrap_or(0.0),
        parsed.text,
    )])
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    async fn transcribe(&self, bytes: Vec<u8>, file_name: &str) -> Result<Vec<TranscriptSegment>> {
        let size = bytes.len();
        let file_part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(video_mime_type(file_name))
            .map_err(|e| ClipchatError::Transcription(e.to_string()))?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.clone())
            .text("language", self.language.clone())
            .text("response_format", "verbose_json")
            .text("timestamp_granularities[]", "segment");

        let url = format!("{}/audio/transcriptions", self.api_base);
        debug!(url = %url, bytes = size, model = %self.model, "Sending transcription request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ClipchatError::Transcription(format!("request failed: {}", e)))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| ClipchatError::Transcription(format!("reading response: {}", e)))?;

        if !status.is_success() {
            return Err(ClipchatError::Transcription(format!(
                "HTTP {}: {}",
                status,
                one_line_preview(&body, 200)
            )));
        }

        segments_from_body(&body)
    }

    fn name(&self) -> &str {
        "whisper"
    }
}
