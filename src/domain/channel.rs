//! Channel-owner tools: video listing, metadata edits, chapters and the OAuth
//! handshake that authorizes them.

use std::sync::{Arc, OnceLock};

use regex::Regex;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::clients::oauth::CredentialManager;
use crate::clients::youtube::{ChannelApi, MAX_RESULTS_LIMIT};
use crate::domain::into_payload;
use crate::domain::utils::{count, parse_iso8601_duration, str_field};
use crate::errors::{ApiError, RegistryError};
use crate::mcp::registry::ToolRegistry;

const CHAPTERS_HEADING: &str = "📍 Chapters";
const LIST_PARTS: &str = "snippet,statistics,contentDetails,status";

#[macros::mcp_tool(
    name = "list_my_videos",
    description = "Get list of all videos from your YouTube channel"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListMyVideosTool {
    /// At most 50, default 50
    pub max_results: Option<u32>,
    pub page_token: Option<String>,
}

#[macros::mcp_tool(
    name = "update_video_metadata",
    description = "Update video metadata (title, description, tags) for your YouTube video"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct UpdateVideoMetadataTool {
    pub video_id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub category_id: Option<String>,
}

#[macros::mcp_tool(
    name = "batch_update_videos",
    description = "Batch update metadata for multiple YouTube videos at once"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct BatchUpdateVideosTool {
    /// JSON array string, e.g. [{"video_id": "abc", "title": "New title"}]
    pub updates: String,
}

#[macros::mcp_tool(
    name = "add_video_chapters",
    description = "Add chapters (table of contents) to YouTube video description"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct AddVideoChaptersTool {
    pub video_id: String,
    /// JSON array string, e.g. [{"time": "0:00", "title": "Intro"}]
    pub chapters: String,
}

#[macros::mcp_tool(
    name = "setup_youtube_oauth",
    description = "Setup YouTube OAuth authentication - shows step-by-step instructions"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SetupYoutubeOauthTool {}

#[macros::mcp_tool(
    name = "complete_youtube_oauth",
    description = "Finish YouTube OAuth by exchanging the authorization code for a token"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CompleteYoutubeOauthTool {
    /// The `code` query parameter from the redirect after consenting
    pub code: String,
}

#[macros::mcp_tool(
    name = "youtube_auth_status",
    description = "Check whether YouTube OAuth credentials are present and usable"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct YoutubeAuthStatusTool {}

#[macros::mcp_tool(
    name = "revoke_youtube_token",
    description = "Delete the stored YouTube OAuth token"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct RevokeYoutubeTokenTool {}

/// One entry of a metadata update; absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct VideoUpdate {
    pub video_id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub category_id: Option<String>,
}

impl VideoUpdate {
    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.tags.is_none()
            && self.category_id.is_none()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ChapterMarker {
    pub time: String,
    pub title: String,
}

fn chapters_block_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\n*📍 Chapters\n[\s\S]*?(\n\n|\z)").expect("chapters pattern is valid")
    })
}

fn video_record(video: &Value) -> Value {
    let snippet = video.get("snippet").unwrap_or(&Value::Null);
    let statistics = video.get("statistics").unwrap_or(&Value::Null);
    json!({
        "video_id": str_field(video, "id"),
        "title": str_field(snippet, "title"),
        "description": str_field(snippet, "description"),
        "tags": snippet.get("tags").cloned().unwrap_or_else(|| json!([])),
        "published_at": str_field(snippet, "publishedAt"),
        "thumbnail": snippet.pointer("/thumbnails/high/url").cloned().unwrap_or(Value::Null),
        "duration": parse_iso8601_duration(
            video.pointer("/contentDetails/duration").and_then(Value::as_str).unwrap_or_default()
        ),
        "privacy_status": video.pointer("/status/privacyStatus").cloned().unwrap_or(Value::Null),
        "statistics": {
            "view_count": count(statistics, "viewCount"),
            "like_count": count(statistics, "likeCount"),
            "comment_count": count(statistics, "commentCount"),
        },
        "category_id": str_field(snippet, "categoryId"),
        "default_language": snippet.get("defaultLanguage").cloned().unwrap_or(Value::Null),
        "default_audio_language": snippet.get("defaultAudioLanguage").cloned().unwrap_or(Value::Null),
    })
}

pub async fn list_my_videos(
    api: &dyn ChannelApi,
    max_results: Option<u32>,
    page_token: Option<&str>,
) -> Result<Value, ApiError> {
    let channel = api.my_channel().await?;
    let uploads = channel
        .pointer("/contentDetails/relatedPlaylists/uploads")
        .and_then(Value::as_str)
        .ok_or_else(|| ApiError::not_found("channel has no uploads playlist"))?;

    let page = api
        .playlist_items(
            uploads,
            max_results.unwrap_or(MAX_RESULTS_LIMIT).min(MAX_RESULTS_LIMIT),
            page_token,
        )
        .await?;
    let video_ids: Vec<String> = page
        .get("items")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|item| item.pointer("/contentDetails/videoId").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    let videos: Vec<Value> = if video_ids.is_empty() {
        Vec::new()
    } else {
        let details = api.videos(&video_ids, LIST_PARTS).await?;
        details
            .get("items")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(video_record)
            .collect()
    };

    Ok(json!({
        "videos": videos,
        "next_page_token": page.get("nextPageToken").cloned().unwrap_or(Value::Null),
        "total_results": page.pointer("/pageInfo/totalResults").and_then(Value::as_u64).unwrap_or(0),
    }))
}

async fn current_snippet(api: &dyn ChannelApi, video_id: &str) -> Result<Value, ApiError> {
    let response = api.videos(&[video_id.to_string()], "snippet").await?;
    response
        .pointer("/items/0/snippet")
        .cloned()
        .ok_or_else(|| ApiError::not_found(format!("Video not found: {video_id}")))
}

/// Read-modify-write of the video snippet: the API replaces it as a whole.
pub async fn update_video_metadata(api: &dyn ChannelApi, update: &VideoUpdate) -> Result<Value, ApiError> {
    let video_id = update.video_id.trim();
    if video_id.is_empty() {
        return Err(ApiError::validation("video_id must not be empty"));
    }
    if update.is_empty() {
        return Err(ApiError::validation(
            "At least one field (title, description, tags, or category_id) must be provided",
        ));
    }

    let mut snippet = current_snippet(api, video_id).await?;
    if let Some(fields) = snippet.as_object_mut() {
        if let Some(title) = &update.title {
            fields.insert("title".to_string(), json!(title));
        }
        if let Some(description) = &update.description {
            fields.insert("description".to_string(), json!(description));
        }
        if let Some(tags) = &update.tags {
            fields.insert("tags".to_string(), json!(tags));
        }
        if let Some(category_id) = &update.category_id {
            fields.insert("categoryId".to_string(), json!(category_id));
        }
    }

    api.update_video_snippet(video_id, snippet).await?;
    info!(video_id = %video_id, "video metadata updated");

    Ok(json!({
        "success": true,
        "video_id": video_id,
        "updated_fields": {
            "title": update.title.clone().map_or(json!("unchanged"), Value::String),
            "description": if update.description.is_some() { "updated" } else { "unchanged" },
            "tags": update.tags.as_ref().map_or(json!("unchanged"), |tags| json!(tags.len())),
            "category_id": update.category_id.clone().map_or(json!("unchanged"), Value::String),
        },
    }))
}

/// Applies each update independently and reports per-video outcomes.
pub async fn batch_update_videos(api: &dyn ChannelApi, updates: &str) -> Result<Value, ApiError> {
    let entries: Vec<Value> = serde_json::from_str(updates)
        .map_err(|err| ApiError::validation(format!("Invalid JSON in updates: {err}")))?;

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let video_id = entry
            .get("video_id")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        let outcome = match serde_json::from_value::<VideoUpdate>(entry) {
            Ok(update) => update_video_metadata(api, &update).await,
            Err(err) => Err(ApiError::validation(format!("invalid update entry: {err}"))),
        };
        results.push(outcome.unwrap_or_else(|err| {
            warn!(video_id = %video_id, error = %err, "batch update entry failed");
            json!({"success": false, "video_id": video_id, "error": err.to_string()})
        }));
    }

    let succeeded = results
        .iter()
        .filter(|result| result["success"] == json!(true))
        .count();
    Ok(json!({
        "results": results,
        "summary": {
            "total": results.len(),
            "success": succeeded,
            "failed": results.len() - succeeded,
        },
    }))
}

/// Prepends a chapter block to `description`, replacing any earlier one.
pub fn description_with_chapters(description: &str, chapters: &[ChapterMarker]) -> String {
    let without_block = chapters_block_pattern().replace_all(description, "$1");
    let mut text = format!("{CHAPTERS_HEADING}\n");
    for chapter in chapters {
        text.push_str(&format!("{} {}\n", chapter.time.trim(), chapter.title.trim()));
    }
    let rest = without_block.trim();
    if !rest.is_empty() {
        text.push('\n');
        text.push_str(rest);
    }
    text
}

pub async fn add_video_chapters(api: &dyn ChannelApi, video_id: &str, chapters: &str) -> Result<Value, ApiError> {
    let chapters: Vec<ChapterMarker> = serde_json::from_str(chapters)
        .map_err(|err| ApiError::validation(format!("Invalid JSON in chapters: {err}")))?;
    if chapters.is_empty() {
        return Err(ApiError::validation("At least one chapter is required"));
    }

    let snippet = current_snippet(api, video_id.trim()).await?;
    let description = description_with_chapters(str_field(&snippet, "description"), &chapters);

    let update = VideoUpdate {
        video_id: video_id.to_string(),
        description: Some(description),
        ..Default::default()
    };
    let mut result = update_video_metadata(api, &update).await?;
    if let Some(fields) = result.as_object_mut() {
        fields.insert("chapters_added".to_string(), json!(chapters.len()));
    }
    Ok(result)
}

pub async fn setup_instructions(credentials: &CredentialManager) -> String {
    let mut text = format!(
        "YouTube OAuth 2.0 setup\n\n\
         1. Open the Google Cloud Console: https://console.cloud.google.com/\n\
         2. Create or select a project.\n\
         3. Enable \"YouTube Data API v3\" and \"YouTube Analytics API\" under APIs & Services > Library.\n\
         4. Create credentials: APIs & Services > Credentials > Create credentials > OAuth client ID, application type \"Desktop app\".\n\
         5. Download the JSON file and save it as:\n   {}\n\
         6. Run setup_youtube_oauth again to get the authorization URL, open it and consent.\n\
         7. Call complete_youtube_oauth with the `code` parameter from the redirect URL.\n\n\
         The token is stored at {}.\n",
        credentials.credentials_path().display(),
        credentials.token_path().display(),
    );

    match credentials.client_secret().await {
        Ok(secret) => match credentials.authorization_url(&secret) {
            Ok(url) => text.push_str(&format!("\nAuthorization URL:\n{url}\n")),
            Err(err) => text.push_str(&format!("\nCould not build the authorization URL: {err}\n")),
        },
        Err(ApiError::NotFound { .. }) => {
            text.push_str("\nClient secrets file not found yet; complete steps 1-5 first.\n");
        }
        Err(err) => text.push_str(&format!("\nClient secrets file is unusable: {err}\n")),
    }

    if credentials.is_authenticated().await {
        text.push_str("\nStatus: already authenticated.\n");
    }
    text
}

pub async fn auth_status(credentials: &CredentialManager) -> Value {
    json!({
        "authenticated": credentials.is_authenticated().await,
        "credentials_file_exists": credentials.credentials_path().exists(),
        "credentials_path": credentials.credentials_path().display().to_string(),
        "token_path": credentials.token_path().display().to_string(),
    })
}

pub fn register(
    registry: &mut ToolRegistry,
    channel: Arc<dyn ChannelApi>,
    credentials: Arc<CredentialManager>,
) -> Result<(), RegistryError> {
    let api = channel.clone();
    registry.register_fn(ListMyVideosTool::tool(), move |params: ListMyVideosTool| {
        let api = api.clone();
        async move {
            Ok(into_payload(
                list_my_videos(api.as_ref(), params.max_results, params.page_token.as_deref()).await,
            ))
        }
    })?;

    let api = channel.clone();
    registry.register_fn(UpdateVideoMetadataTool::tool(), move |params: UpdateVideoMetadataTool| {
        let api = api.clone();
        async move {
            let update = VideoUpdate {
                video_id: params.video_id,
                title: params.title,
                description: params.description,
                tags: params.tags,
                category_id: params.category_id,
            };
            Ok(into_payload(update_video_metadata(api.as_ref(), &update).await))
        }
    })?;

    let api = channel.clone();
    registry.register_fn(BatchUpdateVideosTool::tool(), move |params: BatchUpdateVideosTool| {
        let api = api.clone();
        async move { Ok(into_payload(batch_update_videos(api.as_ref(), &params.updates).await)) }
    })?;

    let api = channel;
    registry.register_fn(AddVideoChaptersTool::tool(), move |params: AddVideoChaptersTool| {
        let api = api.clone();
        async move {
            Ok(into_payload(
                add_video_chapters(api.as_ref(), &params.video_id, &params.chapters).await,
            ))
        }
    })?;

    let manager = credentials.clone();
    registry.register_fn(SetupYoutubeOauthTool::tool(), move |_: SetupYoutubeOauthTool| {
        let manager = manager.clone();
        async move { Ok(Value::String(setup_instructions(&manager).await)) }
    })?;

    let manager = credentials.clone();
    registry.register_fn(CompleteYoutubeOauthTool::tool(), move |params: CompleteYoutubeOauthTool| {
        let manager = manager.clone();
        async move {
            let result = manager.exchange_code(&params.code).await.map(|credential| {
                json!({
                    "success": true,
                    "message": "YouTube OAuth token stored",
                    "token_path": manager.token_path().display().to_string(),
                    "scopes": credential.scopes,
                    "has_refresh_token": credential.refresh_token.is_some(),
                })
            });
            Ok(into_payload(result))
        }
    })?;

    let manager = credentials.clone();
    registry.register_fn(YoutubeAuthStatusTool::tool(), move |_: YoutubeAuthStatusTool| {
        let manager = manager.clone();
        async move { Ok(auth_status(&manager).await) }
    })?;

    let manager = credentials;
    registry.register_fn(RevokeYoutubeTokenTool::tool(), move |_: RevokeYoutubeTokenTool| {
        let manager = manager.clone();
        async move {
            let result = manager.revoke().await.map(|removed| {
                json!({
                    "success": true,
                    "removed": removed,
                    "message": if removed { "Stored token deleted" } else { "No stored token found" },
                })
            });
            Ok(into_payload(result))
        }
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::clients::youtube::AnalyticsQuery;

    /// In-memory channel with a fixed set of videos; updates are recorded.
    struct FakeChannel {
        descriptions: Vec<(&'static str, &'static str)>,
        updates: Mutex<Vec<(String, Value)>>,
    }

    impl FakeChannel {
        fn new(descriptions: Vec<(&'static str, &'static str)>) -> Self {
            Self {
                descriptions,
                updates: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ChannelApi for FakeChannel {
        async fn my_channel(&self) -> Result<Value, ApiError> {
            Ok(json!({"contentDetails": {"relatedPlaylists": {"uploads": "UU123"}}}))
        }

        async fn playlist_items(
            &self,
            playlist_id: &str,
            max_results: u32,
            _page_token: Option<&str>,
        ) -> Result<Value, ApiError> {
            assert_eq!(playlist_id, "UU123");
            assert!(max_results <= 50);
            Ok(json!({
                "items": self.descriptions.iter().map(|(id, _)| json!({"contentDetails": {"videoId": id}})).collect::<Vec<_>>(),
                "nextPageToken": "NEXT",
                "pageInfo": {"totalResults": self.descriptions.len()},
            }))
        }

        async fn videos(&self, video_ids: &[String], _part: &str) -> Result<Value, ApiError> {
            let items: Vec<Value> = self
                .descriptions
                .iter()
                .filter(|(id, _)| video_ids.iter().any(|wanted| wanted == id))
                .map(|(id, description)| {
                    json!({
                        "id": id,
                        "snippet": {"title": format!("Video {id}"), "description": description, "categoryId": "28"},
                        "statistics": {"viewCount": "42"},
                        "contentDetails": {"duration": "PT4M2S"},
                        "status": {"privacyStatus": "public"},
                    })
                })
                .collect();
            Ok(json!({ "items": items }))
        }

        async fn update_video_snippet(&self, video_id: &str, snippet: Value) -> Result<Value, ApiError> {
            if video_id == "locked" {
                return Err(ApiError::Status {
                    status: 403,
                    url: "https://www.googleapis.com/youtube/v3/videos".to_string(),
                    body: "forbidden".to_string(),
                });
            }
            self.updates
                .lock()
                .expect("lock")
                .push((video_id.to_string(), snippet.clone()));
            Ok(json!({"id": video_id, "snippet": snippet}))
        }

        async fn analytics_report(&self, _query: &AnalyticsQuery) -> Result<Value, ApiError> {
            Ok(json!({}))
        }
    }

    fn markers(values: &[(&str, &str)]) -> Vec<ChapterMarker> {
        values
            .iter()
            .map(|(time, title)| ChapterMarker {
                time: time.to_string(),
                title: title.to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn lists_uploads_with_details() {
        let channel = FakeChannel::new(vec![("v1", "first"), ("v2", "second")]);
        let result = list_my_videos(&channel, Some(500), None).await.expect("videos");

        assert_eq!(result["total_results"], 2);
        assert_eq!(result["next_page_token"], "NEXT");
        assert_eq!(result["videos"][0]["video_id"], "v1");
        assert_eq!(result["videos"][0]["duration"], 242);
        assert_eq!(result["videos"][0]["statistics"]["view_count"], 42);
        assert_eq!(result["videos"][1]["privacy_status"], "public");
    }

    #[tokio::test]
    async fn update_keeps_untouched_snippet_fields() {
        let channel = FakeChannel::new(vec![("v1", "old description")]);
        let update = VideoUpdate {
            video_id: "v1".to_string(),
            title: Some("New title".to_string()),
            tags: Some(vec!["rust".to_string(), "mcp".to_string()]),
            ..Default::default()
        };

        let result = update_video_metadata(&channel, &update).await.expect("update");
        assert_eq!(result["updated_fields"]["title"], "New title");
        assert_eq!(result["updated_fields"]["description"], "unchanged");
        assert_eq!(result["updated_fields"]["tags"], 2);

        let updates = channel.updates.lock().expect("lock");
        let (_, snippet) = &updates[0];
        assert_eq!(snippet["title"], "New title");
        assert_eq!(snippet["description"], "old description");
        assert_eq!(snippet["categoryId"], "28");
    }

    #[tokio::test]
    async fn batch_update_isolates_failures() {
        let channel = FakeChannel::new(vec![("v1", ""), ("locked", "")]);
        let updates = r#"[
            {"video_id": "v1", "title": "A"},
            {"video_id": "missing", "title": "B"},
            {"video_id": "locked", "title": "C"},
            {"title": "no id"}
        ]"#;

        let result = batch_update_videos(&channel, updates).await.expect("batch");
        assert_eq!(result["summary"], json!({"total": 4, "success": 1, "failed": 3}));
        assert_eq!(result["results"][0]["success"], true);
        assert_eq!(result["results"][1]["error"], "not found: Video not found: missing");
        assert_eq!(result["results"][2]["video_id"], "locked");
        assert_eq!(result["results"][3]["video_id"], "unknown");
    }

    #[tokio::test]
    async fn batch_update_rejects_invalid_json() {
        let channel = FakeChannel::new(vec![]);
        let payload = into_payload(batch_update_videos(&channel, "not json").await);
        assert!(payload["error"]
            .as_str()
            .expect("error")
            .starts_with("Invalid JSON in updates"));
    }

    #[test]
    fn chapter_block_is_replaced_not_duplicated() {
        let first = description_with_chapters(
            "Welcome to the stream.",
            &markers(&[("0:00", "Intro"), ("5:30", "Setup")]),
        );
        assert_eq!(
            first,
            "📍 Chapters\n0:00 Intro\n5:30 Setup\n\nWelcome to the stream."
        );

        let second = description_with_chapters(&first, &markers(&[("0:00", "Start")]));
        assert_eq!(second, "📍 Chapters\n0:00 Start\n\nWelcome to the stream.");
        assert_eq!(second.matches(CHAPTERS_HEADING).count(), 1);
    }

    #[tokio::test]
    async fn chapters_are_written_to_the_description() {
        let channel = FakeChannel::new(vec![("v1", "Body text")]);
        let result = add_video_chapters(&channel, "v1", r#"[{"time": "0:00", "title": "Intro"}]"#)
            .await
            .expect("chapters");
        assert_eq!(result["chapters_added"], 1);
        assert_eq!(result["updated_fields"]["description"], "updated");

        let updates = channel.updates.lock().expect("lock");
        assert_eq!(
            updates[0].1["description"],
            "📍 Chapters\n0:00 Intro\n\nBody text"
        );
    }

    #[tokio::test]
    async fn chapters_require_valid_json() {
        let channel = FakeChannel::new(vec![("v1", "")]);
        let err = add_video_chapters(&channel, "v1", "[{\"time\": 1}]")
            .await
            .expect_err("invalid chapters");
        assert!(err.to_string().starts_with("Invalid JSON in chapters"));
    }

    #[tokio::test]
    async fn setup_without_client_secrets_explains_next_steps() {
        let dir = tempfile::tempdir().expect("tempdir");
        let manager = CredentialManager::new(
            reqwest::Client::new(),
            dir.path().join("credentials.json"),
            dir.path().join("token.json"),
        );

        let text = setup_instructions(&manager).await;
        assert!(text.contains("credentials.json"));
        assert!(text.contains("Client secrets file not found"));
        assert!(!text.contains("Authorization URL"));

        let status = auth_status(&manager).await;
        assert_eq!(status["authenticated"], false);
        assert_eq!(status["credentials_file_exists"], false);
    }
}
