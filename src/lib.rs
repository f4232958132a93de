use std::sync::Arc;

pub mod chapters;
pub mod clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod mcp;

use clients::{
    github::GithubClient,
    oauth::CredentialManager,
    slack::{SlackApi, SlackWebClient},
    transcript::WatchPageTranscripts,
    youtube::{ChannelApi, YouTubeChannelClient, YouTubeDataClient},
};
use config::Config;
use domain::semantic::SemanticContext;
use errors::RegistryError;
use mcp::registry::ToolRegistry;

/// Upstream clients shared by every tool handler.
#[derive(Clone)]
pub struct Services {
    pub github: Arc<GithubClient>,
    pub youtube: Arc<YouTubeDataClient>,
    pub channel: Arc<dyn ChannelApi>,
    pub credentials: Arc<CredentialManager>,
    pub slack: Option<Arc<dyn SlackApi>>,
    pub semantic: Arc<SemanticContext>,
}

impl Services {
    pub fn from_config(config: &Config, http: reqwest::Client) -> Self {
        let credentials = CredentialManager::new(
            http.clone(),
            config.youtube_credentials_path.clone(),
            config.youtube_token_path.clone(),
        );
        let slack = config.slack_bot_token.as_ref().map(|token| {
            Arc::new(SlackWebClient::new(http.clone(), &config.slack_api_url, token)) as Arc<dyn SlackApi>
        });
        let transcripts = Arc::new(WatchPageTranscripts::new(
            http.clone(),
            config.transcript_languages.clone(),
        ));

        Self {
            github: Arc::new(GithubClient::new(
                http.clone(),
                &config.github_api_url,
                config.github_token.clone(),
            )),
            youtube: Arc::new(YouTubeDataClient::new(
                http.clone(),
                config.youtube_api_key.clone(),
            )),
            channel: Arc::new(YouTubeChannelClient::new(http.clone(), credentials.clone())),
            credentials: Arc::new(credentials),
            slack,
            semantic: Arc::new(SemanticContext::new(
                http,
                config.gemini_api_key.clone(),
                &config.gemini_model,
                transcripts,
            )),
        }
    }
}

/// Registers every tool in the order `tools/list` reports them.
pub fn build_registry(services: Services) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    domain::calculator::register(&mut registry)?;
    domain::github::register(&mut registry, services.github)?;
    domain::youtube::register(&mut registry, services.youtube)?;
    domain::channel::register(&mut registry, services.channel.clone(), services.credentials)?;
    domain::analytics::register(&mut registry, services.channel.clone())?;
    domain::strategy::register(&mut registry, services.channel.clone())?;
    domain::slack::register(&mut registry, services.slack)?;
    domain::semantic::register(&mut registry, services.semantic.clone())?;
    domain::content::register(&mut registry, services.semantic, services.channel)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use std::future::pending;

    use serde_json::{json, Value};

    use super::*;
    use crate::mcp::transport::{serve, ShutdownReason};

    fn registry(dir: &std::path::Path) -> ToolRegistry {
        let dir = dir.display().to_string();
        let config = Config::from_lookup(|key| match key {
            "YOUTUBE_MCP_DIR" => Some(dir.clone()),
            "GITHUB_API_URL" => Some("http://127.0.0.1:9".to_string()),
            _ => None,
        })
        .expect("config");
        build_registry(Services::from_config(&config, reqwest::Client::new())).expect("registry")
    }

    fn call(id: u64, name: &str, arguments: Value) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {"name": name, "arguments": arguments},
        })
        .to_string()
    }

    fn tool_payload(message: &Value) -> Value {
        let text = message["result"]["content"][0]["text"]
            .as_str()
            .expect("text content");
        serde_json::from_str(text).expect("tool text is json")
    }

    async fn session(registry: &ToolRegistry, lines: &[String]) -> Vec<Value> {
        let input = lines.join("\n") + "\n";
        let mut output = Vec::new();
        let summary = serve(registry, input.as_bytes(), &mut output, pending())
            .await
            .expect("serve succeeds");
        assert_eq!(summary.reason, ShutdownReason::EndOfInput);

        String::from_utf8_lossy(&output)
            .lines()
            .map(|line| serde_json::from_str(line).expect("json line"))
            .collect()
    }

    #[test]
    fn registers_every_tool_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry(dir.path());
        let names: Vec<String> = registry
            .descriptors()
            .into_iter()
            .map(|tool| tool.name)
            .collect();

        assert_eq!(names.len(), 42);
        assert_eq!(names[0], "add");
        assert!(names.contains(&"get_channel_analytics".to_string()));
        assert!(names.contains(&"check_gemini_api_status".to_string()));
        assert!(names.contains(&"compare_video_performance".to_string()));
        assert!(names.contains(&"generate_buzz_title".to_string()));
        assert_eq!(names.last().map(String::as_str), Some("batch_update_channel_videos"));
    }

    #[tokio::test]
    async fn stdio_session_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let registry = registry(dir.path());
        let lines = vec![
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {"protocolVersion": "2024-11-05"}}).to_string(),
            json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string(),
            json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"}).to_string(),
            call(3, "add", json!({"a": 2, "b": 3})),
            call(4, "update_github_issue", json!({"owner": "o", "repo": "r", "issue_number": 1})),
            call(5, "no_such_tool", json!({})),
            call(6, "send_slack_channel_message", json!({"channel": "#general", "message": "hi"})),
            call(7, "youtube_auth_status", json!({})),
        ];

        let messages = session(&registry, &lines).await;
        assert_eq!(messages.len(), 8);

        assert_eq!(messages[0]["id"], 1);
        assert_eq!(messages[0]["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(messages[0]["result"]["serverInfo"]["name"], "Custom MCP");
        assert_eq!(messages[1]["method"], "initialized");

        assert_eq!(messages[2]["result"]["tools"].as_array().map(Vec::len), Some(42));

        assert_eq!(messages[3]["result"]["content"][0]["text"], "5");

        assert_eq!(
            tool_payload(&messages[4]),
            json!({"error": "At least one field (state, title, or body) must be provided"})
        );

        assert_eq!(messages[5]["error"]["code"], -32601);
        assert_eq!(messages[5]["id"], 5);

        assert_eq!(
            tool_payload(&messages[6]),
            json!({"error": "SLACK_BOT_TOKEN environment variable is required"})
        );

        let status = tool_payload(&messages[7]);
        assert_eq!(status["authenticated"], false);
        assert_eq!(status["credentials_file_exists"], false);
    }
}
