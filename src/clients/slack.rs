use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::clients::read_json;
use crate::errors::ApiError;

pub const MAX_USERS_PAGE: u32 = 1000;

#[derive(Debug, Clone, PartialEq)]
pub struct PostedMessage {
    pub channel: String,
    pub ts: String,
    pub message: Option<Value>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SlackProfile {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SlackMember {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub real_name: String,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub is_owner: bool,
    #[serde(default)]
    pub tz: String,
    #[serde(default)]
    pub profile: Option<SlackProfile>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsersPage {
    pub members: Vec<SlackMember>,
    pub next_cursor: Option<String>,
}

/// The three Slack Web API methods the tools use.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// Opens (or reuses) a direct-message conversation and returns its id.
    async fn open_conversation(&self, user_id: &str) -> Result<String, ApiError>;
    async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage, ApiError>;
    async fn list_users(&self, limit: u32) -> Result<UsersPage, ApiError>;
}

#[derive(Debug, Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct OpenConversationRequest<'a> {
    users: &'a str,
}

#[derive(Debug, Deserialize)]
struct SlackApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    rest: Value,
}

#[derive(Debug, Clone)]
pub struct SlackWebClient {
    http: reqwest::Client,
    base_url: String,
    bot_token: String,
}

impl SlackWebClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, bot_token: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            bot_token: bot_token.into(),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    /// Slack reports failures with HTTP 200 and `ok: false`.
    async fn decode(response: reqwest::Response) -> Result<Value, ApiError> {
        let body = read_json(response).await?;
        let parsed: SlackApiResponse = serde_json::from_value(body)
            .map_err(|err| ApiError::decode(format!("unexpected Slack response: {err}")))?;

        if !parsed.ok {
            return Err(ApiError::upstream(
                "Slack",
                parsed.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(parsed.rest)
    }
}

#[async_trait]
impl SlackApi for SlackWebClient {
    async fn open_conversation(&self, user_id: &str) -> Result<String, ApiError> {
        debug!(user_id = %user_id, "opening slack conversation");
        let response = self
            .http
            .post(self.url("conversations.open"))
            .bearer_auth(&self.bot_token)
            .json(&OpenConversationRequest { users: user_id })
            .send()
            .await?;

        let body = Self::decode(response).await?;
        body.pointer("/channel/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ApiError::decode("conversations.open response has no channel id"))
    }

    async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage, ApiError> {
        debug!(channel = %channel, "posting slack message");
        let response = self
            .http
            .post(self.url("chat.postMessage"))
            .bearer_auth(&self.bot_token)
            .json(&PostMessageRequest { channel, text })
            .send()
            .await?;

        let body = Self::decode(response).await?;
        Ok(PostedMessage {
            channel: body
                .get("channel")
                .and_then(Value::as_str)
                .unwrap_or(channel)
                .to_string(),
            ts: body
                .get("ts")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            message: body.get("message").cloned(),
        })
    }

    async fn list_users(&self, limit: u32) -> Result<UsersPage, ApiError> {
        let response = self
            .http
            .get(self.url("users.list"))
            .bearer_auth(&self.bot_token)
            .query(&[("limit", limit.clamp(1, MAX_USERS_PAGE).to_string())])
            .send()
            .await?;

        let body = Self::decode(response).await?;
        let members: Vec<SlackMember> = serde_json::from_value(
            body.get("members").cloned().unwrap_or(Value::Array(vec![])),
        )
        .map_err(|err| ApiError::decode(format!("unexpected users.list members: {err}")))?;
        let next_cursor = body
            .pointer("/response_metadata/next_cursor")
            .and_then(Value::as_str)
            .filter(|cursor| !cursor.is_empty())
            .map(str::to_string);

        Ok(UsersPage {
            members,
            next_cursor,
        })
    }
}
