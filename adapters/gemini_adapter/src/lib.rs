//! Google Gemini `generateContent` client used as the analysis model

use std::time::Duration;

use digest_core::domain::Turn;
use digest_core::ports::ChatModel;
use digest_core::ModelError;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "You are an AI assistant that analyzes Discord \
conversation data. Provide insights, summaries, and answer questions about the conversations.";

/// Sampling and framing parameters sent with every request
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub system_instruction: String,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            top_p: 0.95,
            top_k: 40,
            max_output_tokens: 8192,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default, rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    details: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

impl ApiError {
    /// A bad key comes back as 400 INVALID_ARGUMENT, not 401
    fn is_invalid_key(&self) -> bool {
        self.details
            .iter()
            .any(|d| d.reason.as_deref() == Some("API_KEY_INVALID"))
            || self.message.to_ascii_lowercase().contains("api key not valid")
    }
}

fn text_content<'a>(role: &'static str, text: &'a str) -> Content<'a> {
    Content {
        role: Some(role),
        parts: vec![Part { text }],
    }
}

fn build_request<'a>(
    settings: &'a GenerationSettings,
    history: &'a [Turn],
    message: &'a str,
) -> GenerateRequest<'a> {
    let mut contents = Vec::with_capacity(history.len() * 2 + 1);
    for turn in history {
        contents.push(text_content("user", &turn.user));
        contents.push(text_content("model", &turn.model));
    }
    contents.push(text_content("user", message));

    GenerateRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part {
                text: &settings.system_instruction,
            }],
        },
        contents,
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            top_p: settings.top_p,
            top_k: settings.top_k,
            max_output_tokens: settings.max_output_tokens,
            response_mime_type: "text/plain",
        },
    }
}

/// Maps an HTTP failure to the session's error kinds. Auth, quota and
/// server-side failures are `Unavailable`; the caller can retry later.
fn classify_error(status: u16, body: &str) -> ModelError {
    let (message, invalid_key) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let invalid_key = envelope.error.is_invalid_key();
            (envelope.error.message, invalid_key)
        }
        Err(_) => (body.trim().to_string(), false),
    };

    let lowered = message.to_ascii_lowercase();
    match status {
        401 | 403 | 429 | 500..=599 => ModelError::Unavailable(format!("{status}: {message}")),
        400 if invalid_key => ModelError::Unavailable(format!("{status}: {message}")),
        400 if lowered.contains("token") && (lowered.contains("exceed") || lowered.contains("limit")) => {
            ModelError::ContextLimit(message)
        }
        _ => ModelError::Request(format!("{status}: {message}")),
    }
}

fn extract_text(response: GenerateResponse) -> Result<String, ModelError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| ModelError::Request("response contained no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".to_string());
        return Err(ModelError::Request(format!("empty response (finish reason: {reason})")));
    }
    Ok(text)
}

pub struct GeminiChatModel {
    client: reqwest::blocking::Client,
    api_key: SecretString,
    base_url: String,
    settings: GenerationSettings,
}

impl GeminiChatModel {
    pub fn new(api_key: SecretString, settings: GenerationSettings) -> Result<Self, ModelError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .map_err(|e| ModelError::Unavailable(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
            settings,
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.settings.model
        )
    }
}

impl ChatModel for GeminiChatModel {
    fn send(&self, history: &[Turn], message: &str) -> Result<String, ModelError> {
        let body = build_request(&self.settings, history, message);
        tracing::debug!(
            model = %self.settings.model,
            turns = history.len(),
            chars = message.len(),
            "sending model request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .map_err(|e| ModelError::Unavailable(format!("request failed: {e}")))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| ModelError::Unavailable(format!("failed to read response: {e}")))?;

        if !status.is_success() {
            let err = classify_error(status.as_u16(), &text);
            tracing::warn!(status = status.as_u16(), error = %err, "model request rejected");
            return Err(err);
        }

        let parsed: GenerateResponse = serde_json::from_str(&text)
            .map_err(|e| ModelError::Request(format!("failed to parse response: {e}")))?;
        extract_text(parsed)
    }
}
