//! Thin wrappers over the third-party HTTP APIs
//!
//! Each call issues exactly one request and maps transport failures and
//! non-2xx statuses onto [`ApiError`]. Nothing here retries.

pub mod gemini;
pub mod github;
pub mod oauth;
pub mod slack;
pub mod transcript;
pub mod youtube;

use serde_json::Value;

use crate::errors::ApiError;

const MAX_ERROR_BODY_CHARS: usize = 500;

pub fn build_http_client() -> Result<reqwest::Client, ApiError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Decodes a JSON body, turning non-2xx statuses into [`ApiError::Status`].
pub async fn read_json(response: reqwest::Response) -> Result<Value, ApiError> {
    let status = response.status();
    let url = response.url().to_string();

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            url,
            body: truncate_body(&body),
        });
    }

    Ok(response.json::<Value>().await?)
}

pub(crate) fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_ERROR_BODY_CHARS {
        return trimmed.to_string();
    }
    let mut truncated: String = trimmed.chars().take(MAX_ERROR_BODY_CHARS).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use super::truncate_body;

    #[test]
    fn error_bodies_are_truncated_on_char_boundaries() {
        let body = "é".repeat(600);
        let truncated = truncate_body(&body);
        assert_eq!(truncated.chars().count(), 503);
        assert!(truncated.ends_with("..."));
    }
}
