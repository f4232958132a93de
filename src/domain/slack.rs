use std::sync::Arc;

use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::clients::slack::{SlackApi, MAX_USERS_PAGE};
use crate::domain::into_payload;
use crate::errors::{ApiError, RegistryError};
use crate::mcp::registry::ToolRegistry;

const DEFAULT_USER_LIMIT: u32 = 100;
const MISSING_TOKEN: &str = "SLACK_BOT_TOKEN environment variable is required";

#[macros::mcp_tool(
    name = "send_slack_bulk_dm",
    description = "Send direct messages to multiple Slack users at once"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SendSlackBulkDmTool {
    pub user_ids: Vec<String>,
    pub message: String,
}

#[macros::mcp_tool(name = "get_slack_users", description = "Get list of Slack workspace users")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetSlackUsersTool {
    /// Maximum number of users to retrieve (default 100, at most 1000)
    pub limit: Option<u32>,
}

#[macros::mcp_tool(
    name = "send_slack_channel_message",
    description = "Send a message to a Slack channel"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SendSlackChannelMessageTool {
    /// Channel ID or name (with # prefix)
    pub channel: String,
    pub message: String,
}

/// Opens a DM and posts to each user in turn. A failure for one user is
/// recorded and the loop moves on.
pub async fn send_bulk_dm(api: &dyn SlackApi, user_ids: &[String], message: &str) -> Result<Value, ApiError> {
    if user_ids.is_empty() {
        return Err(ApiError::validation("At least one user ID is required"));
    }
    if message.is_empty() {
        return Err(ApiError::validation("Message text is required"));
    }

    let mut successful_sends = Vec::new();
    let mut failed_sends = Vec::new();

    for user_id in user_ids {
        let sent = match api.open_conversation(user_id).await {
            Ok(channel_id) => api
                .post_message(&channel_id, message)
                .await
                .map(|posted| (channel_id, posted.ts)),
            Err(err) => Err(err),
        };

        match sent {
            Ok((channel_id, timestamp)) => successful_sends.push(json!({
                "user_id": user_id,
                "channel_id": channel_id,
                "timestamp": timestamp,
            })),
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "slack direct message failed");
                failed_sends.push(json!({
                    "user_id": user_id,
                    "error": err.to_string(),
                }));
            }
        }
    }

    info!(
        total = user_ids.len(),
        succeeded = successful_sends.len(),
        failed = failed_sends.len(),
        "slack bulk dm finished"
    );

    Ok(json!({
        "total_users": user_ids.len(),
        "success_count": successful_sends.len(),
        "failure_count": failed_sends.len(),
        "successful_sends": successful_sends,
        "failed_sends": failed_sends,
    }))
}

/// Human members only: bots and deactivated accounts are dropped.
pub async fn list_users(api: &dyn SlackApi, limit: Option<u32>) -> Result<Value, ApiError> {
    let limit = limit.unwrap_or(DEFAULT_USER_LIMIT).clamp(1, MAX_USERS_PAGE);
    let page = api.list_users(limit).await?;

    let users: Vec<Value> = page
        .members
        .iter()
        .filter(|member| !member.deleted && !member.is_bot)
        .map(|member| {
            let (display_name, email) = member
                .profile
                .as_ref()
                .map(|profile| (profile.display_name.as_str(), profile.email.as_str()))
                .unwrap_or_default();
            json!({
                "id": member.id,
                "name": member.name,
                "real_name": member.real_name,
                "display_name": display_name,
                "email": email,
                "is_admin": member.is_admin,
                "is_owner": member.is_owner,
                "tz": member.tz,
            })
        })
        .collect();

    Ok(json!({
        "total_count": users.len(),
        "users": users,
        "has_more": page.next_cursor.is_some(),
    }))
}

pub async fn send_channel_message(api: &dyn SlackApi, channel: &str, message: &str) -> Result<Value, ApiError> {
    if channel.trim().is_empty() {
        return Err(ApiError::validation("Channel is required"));
    }
    if message.is_empty() {
        return Err(ApiError::validation("Message text is required"));
    }

    let posted = api.post_message(channel, message).await?;
    Ok(json!({
        "success": true,
        "channel": posted.channel,
        "timestamp": posted.ts,
        "message": posted.message,
    }))
}

fn require(api: &Option<Arc<dyn SlackApi>>) -> Result<&dyn SlackApi, ApiError> {
    api.as_deref()
        .ok_or(ApiError::missing_credential(MISSING_TOKEN))
}

pub fn register(registry: &mut ToolRegistry, api: Option<Arc<dyn SlackApi>>) -> Result<(), RegistryError> {
    let slack = api.clone();
    registry.register_fn(SendSlackBulkDmTool::tool(), move |params: SendSlackBulkDmTool| {
        let slack = slack.clone();
        async move {
            let result = match require(&slack) {
                Ok(api) => send_bulk_dm(api, &params.user_ids, &params.message).await,
                Err(err) => Err(err),
            };
            Ok(into_payload(result))
        }
    })?;

    let slack = api.clone();
    registry.register_fn(GetSlackUsersTool::tool(), move |params: GetSlackUsersTool| {
        let slack = slack.clone();
        async move {
            let result = match require(&slack) {
                Ok(api) => list_users(api, params.limit).await,
                Err(err) => Err(err),
            };
            Ok(into_payload(result))
        }
    })?;

    let slack = api;
    registry.register_fn(
        SendSlackChannelMessageTool::tool(),
        move |params: SendSlackChannelMessageTool| {
            let slack = slack.clone();
            async move {
                let result = match require(&slack) {
                    Ok(api) => send_channel_message(api, &params.channel, &params.message).await,
                    Err(err) => Err(err),
                };
                Ok(into_payload(result))
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use serde_json::Map;

    use super::*;
    use crate::clients::slack::{PostedMessage, SlackMember, SlackProfile, UsersPage};

    /// Fails `conversations.open` for the listed users.
    #[derive(Default)]
    struct FakeSlack {
        unreachable_users: Vec<&'static str>,
        posted: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SlackApi for FakeSlack {
        async fn open_conversation(&self, user_id: &str) -> Result<String, ApiError> {
            if self.unreachable_users.contains(&user_id) {
                return Err(ApiError::upstream("Slack", "user_not_found"));
            }
            Ok(format!("D-{user_id}"))
        }

        async fn post_message(&self, channel: &str, text: &str) -> Result<PostedMessage, ApiError> {
            self.posted
                .lock()
                .expect("lock")
                .push((channel.to_string(), text.to_string()));
            Ok(PostedMessage {
                channel: channel.to_string(),
                ts: "1700000000.000100".to_string(),
                message: None,
            })
        }

        async fn list_users(&self, _limit: u32) -> Result<UsersPage, ApiError> {
            let member = |id: &str, is_bot: bool, deleted: bool| SlackMember {
                id: id.to_string(),
                name: id.to_lowercase(),
                real_name: String::new(),
                deleted,
                is_bot,
                is_admin: false,
                is_owner: false,
                tz: "Asia/Tokyo".to_string(),
                profile: Some(SlackProfile {
                    display_name: format!("{id} display"),
                    email: String::new(),
                }),
            };
            Ok(UsersPage {
                members: vec![
                    member("U1", false, false),
                    member("B1", true, false),
                    member("U2", false, true),
                ],
                next_cursor: Some("dXNlcjpVMDYxTkZUVDI=".to_string()),
            })
        }
    }

    fn ids(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[tokio::test]
    async fn bulk_dm_isolates_per_user_failures() {
        let slack = FakeSlack {
            unreachable_users: vec!["U2"],
            ..Default::default()
        };

        let result = send_bulk_dm(&slack, &ids(&["U1", "U2", "U3"]), "hello")
            .await
            .expect("bulk result");

        assert_eq!(result["total_users"], 3);
        assert_eq!(result["success_count"], 2);
        assert_eq!(result["failure_count"], 1);
        assert_eq!(result["failed_sends"][0]["user_id"], "U2");
        assert_eq!(
            result["failed_sends"][0]["error"],
            "Slack API error: user_not_found"
        );
        assert_eq!(result["successful_sends"][1]["channel_id"], "D-U3");
        assert_eq!(slack.posted.lock().expect("lock").len(), 2);
    }

    #[tokio::test]
    async fn bulk_dm_validates_input() {
        let slack = FakeSlack::default();
        let err = send_bulk_dm(&slack, &[], "hello").await.expect_err("no users");
        assert_eq!(err.to_string(), "At least one user ID is required");
        let err = send_bulk_dm(&slack, &ids(&["U1"]), "").await.expect_err("no text");
        assert_eq!(err.to_string(), "Message text is required");
    }

    #[tokio::test]
    async fn users_exclude_bots_and_deleted_accounts() {
        let result = list_users(&FakeSlack::default(), Some(5000))
            .await
            .expect("users");
        assert_eq!(result["total_count"], 1);
        assert_eq!(result["users"][0]["id"], "U1");
        assert_eq!(result["users"][0]["display_name"], "U1 display");
        assert_eq!(result["has_more"], true);
    }

    #[tokio::test]
    async fn missing_token_short_circuits() {
        let mut registry = ToolRegistry::new();
        register(&mut registry, None).expect("register");

        let arguments: Map<String, Value> = json!({"user_ids": ["U1"], "message": "hi"})
            .as_object()
            .cloned()
            .expect("object");
        let result = registry
            .call("send_slack_bulk_dm", Some(arguments))
            .await
            .expect("payload");
        assert_eq!(result, json!({"error": MISSING_TOKEN}));
    }
}
