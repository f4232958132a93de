use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::clients::truncate_body;
use crate::errors::ApiError;

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// One prompt in, the model's text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError>;
    fn model(&self) -> &str;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: GEMINI_API_BASE.to_string(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ApiError> {
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "gemini request");

        let request_body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }]
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request_body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ApiError::upstream(
                "Gemini",
                format!("{} (status {status})", error_message(&text)),
            ));
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|err| ApiError::decode(format!("Gemini response is not JSON: {err}")))?;
        candidate_text(&body)
            .ok_or_else(|| ApiError::upstream("Gemini", "response contained no text"))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// The API's `error.message`, or the raw body when it is not the JSON error
/// shape (a gateway's HTML page, for instance).
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| match truncate_body(body) {
            text if text.is_empty() => "Unknown Gemini API error".to_string(),
            text => text,
        })
}

/// Joins the text parts of the first candidate.
fn candidate_text(body: &Value) -> Option<String> {
    let text: String = body["candidates"][0]["content"]["parts"]
        .as_array()?
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect();

    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
