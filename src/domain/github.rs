use std::sync::Arc;

use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};

use crate::clients::github::{GithubClient, IssuePatch, Page};
use crate::domain::{into_list_payload, into_payload};
use crate::errors::RegistryError;
use crate::mcp::registry::ToolRegistry;

const DEFAULT_STATE: &str = "open";

#[macros::mcp_tool(name = "get_github_repo", description = "Get GitHub repository information")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetGithubRepoTool {
    pub owner: String,
    pub repo: String,
}

#[macros::mcp_tool(name = "list_github_issues", description = "List GitHub repository issues")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListGithubIssuesTool {
    pub owner: String,
    pub repo: String,
    /// open, closed or all (default: open)
    pub state: Option<String>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

#[macros::mcp_tool(name = "create_github_issue", description = "Create a new GitHub issue")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CreateGithubIssueTool {
    pub owner: String,
    pub repo: String,
    pub title: String,
    pub body: Option<String>,
}

#[macros::mcp_tool(name = "list_github_prs", description = "List GitHub repository pull requests")]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListGithubPrsTool {
    pub owner: String,
    pub repo: String,
    /// open, closed or all (default: open)
    pub state: Option<String>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

#[macros::mcp_tool(
    name = "update_github_issue",
    description = "Update GitHub issue status, title, or body"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct UpdateGithubIssueTool {
    pub owner: String,
    pub repo: String,
    pub issue_number: u64,
    /// open or closed
    pub state: Option<String>,
    pub title: Option<String>,
    pub body: Option<String>,
}

fn state_or_default(state: Option<String>) -> String {
    state
        .map(|state| state.trim().to_ascii_lowercase())
        .filter(|state| !state.is_empty())
        .unwrap_or_else(|| DEFAULT_STATE.to_string())
}

pub fn register(registry: &mut ToolRegistry, client: Arc<GithubClient>) -> Result<(), RegistryError> {
    let github = client.clone();
    registry.register_fn(GetGithubRepoTool::tool(), move |params: GetGithubRepoTool| {
        let github = github.clone();
        async move { Ok(into_payload(github.get_repo(&params.owner, &params.repo).await)) }
    })?;

    let github = client.clone();
    registry.register_fn(ListGithubIssuesTool::tool(), move |params: ListGithubIssuesTool| {
        let github = github.clone();
        async move {
            let page = Page {
                per_page: params.per_page,
                page: params.page,
            };
            let state = state_or_default(params.state);
            Ok(into_list_payload(
                github
                    .list_issues(&params.owner, &params.repo, &state, page)
                    .await,
            ))
        }
    })?;

    let github = client.clone();
    registry.register_fn(CreateGithubIssueTool::tool(), move |params: CreateGithubIssueTool| {
        let github = github.clone();
        async move {
            Ok(into_payload(
                github
                    .create_issue(
                        &params.owner,
                        &params.repo,
                        &params.title,
                        params.body.as_deref(),
                    )
                    .await,
            ))
        }
    })?;

    let github = client.clone();
    registry.register_fn(ListGithubPrsTool::tool(), move |params: ListGithubPrsTool| {
        let github = github.clone();
        async move {
            let page = Page {
                per_page: params.per_page,
                page: params.page,
            };
            let state = state_or_default(params.state);
            Ok(into_list_payload(
                github
                    .list_pull_requests(&params.owner, &params.repo, &state, page)
                    .await,
            ))
        }
    })?;

    let github = client;
    registry.register_fn(UpdateGithubIssueTool::tool(), move |params: UpdateGithubIssueTool| {
        let github = github.clone();
        async move {
            let patch = IssuePatch {
                state: params.state,
                title: params.title,
                body: params.body,
            };
            Ok(into_payload(
                github
                    .update_issue(&params.owner, &params.repo, params.issue_number, patch)
                    .await,
            ))
        }
    })
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Map};

    use super::*;

    fn registry(token: Option<&str>) -> ToolRegistry {
        let client = GithubClient::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            token.map(str::to_string),
        );
        let mut registry = ToolRegistry::new();
        register(&mut registry, Arc::new(client)).expect("register github tools");
        registry
    }

    fn arguments(value: serde_json::Value) -> Option<Map<String, serde_json::Value>> {
        value.as_object().cloned()
    }

    #[test]
    fn registers_all_github_tools() {
        let names: Vec<_> = registry(None)
            .descriptors()
            .into_iter()
            .map(|tool| tool.name)
            .collect();
        assert_eq!(
            names,
            vec![
                "get_github_repo",
                "list_github_issues",
                "create_github_issue",
                "list_github_prs",
                "update_github_issue"
            ]
        );
    }

    #[tokio::test]
    async fn update_without_fields_returns_error_payload() {
        let result = registry(Some("ghp_x"))
            .call(
                "update_github_issue",
                arguments(json!({"owner": "o", "repo": "r", "issue_number": 7})),
            )
            .await
            .expect("handler returns a payload");
        assert_eq!(
            result,
            json!({"error": "At least one field (state, title, or body) must be provided"})
        );
    }

    #[tokio::test]
    async fn create_without_token_returns_error_payload() {
        let result = registry(None)
            .call(
                "create_github_issue",
                arguments(json!({"owner": "o", "repo": "r", "title": "Bug"})),
            )
            .await
            .expect("handler returns a payload");
        assert_eq!(
            result,
            json!({"error": "GitHub token is required to create issues"})
        );
    }

    #[test]
    fn state_defaults_to_open() {
        assert_eq!(state_or_default(None), "open");
        assert_eq!(state_or_default(Some(" ".to_string())), "open");
        assert_eq!(state_or_default(Some("Closed".to_string())), "closed");
    }
}
