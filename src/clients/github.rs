use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::clients::read_json;
use crate::errors::ApiError;

const ACCEPT: &str = "application/vnd.github+json";

#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct IssuePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl IssuePatch {
    /// Drops blank fields and checks what is left.
    pub fn normalized(self) -> Result<Self, ApiError> {
        let non_blank = |value: Option<String>| value.filter(|value| !value.trim().is_empty());
        let patch = Self {
            state: non_blank(self.state).map(|state| state.trim().to_ascii_lowercase()),
            title: non_blank(self.title),
            body: non_blank(self.body),
        };

        if let Some(state) = patch.state.as_deref() {
            if state != "open" && state != "closed" {
                return Err(ApiError::validation(
                    "state must be either 'open' or 'closed'",
                ));
            }
        }

        if patch == Self::default() {
            return Err(ApiError::validation(
                "At least one field (state, title, or body) must be provided",
            ));
        }

        Ok(patch)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

impl Page {
    fn query(&self, state: &str) -> Vec<(&'static str, String)> {
        let mut query = vec![("state", state.to_string())];
        if let Some(per_page) = self.per_page {
            query.push(("per_page", per_page.clamp(1, 100).to_string()));
        }
        if let Some(page) = self.page {
            query.push(("page", page.max(1).to_string()));
        }
        query
    }
}

#[derive(Debug, Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GithubClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            token,
        }
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "github request");

        let builder = self.http.request(method, url).header("Accept", ACCEPT);
        match self.token.as_deref() {
            Some(token) => builder.header("Authorization", format!("token {token}")),
            None => builder,
        }
    }

    fn require_token(&self, message: &'static str) -> Result<(), ApiError> {
        if self.token.is_none() {
            return Err(ApiError::missing_credential(message));
        }
        Ok(())
    }

    pub async fn get_repo(&self, owner: &str, repo: &str) -> Result<Value, ApiError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/repos/{owner}/{repo}"))
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn list_issues(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        page: Page,
    ) -> Result<Value, ApiError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/repos/{owner}/{repo}/issues"))
            .query(&page.query(state))
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn list_pull_requests(
        &self,
        owner: &str,
        repo: &str,
        state: &str,
        page: Page,
    ) -> Result<Value, ApiError> {
        let response = self
            .request(reqwest::Method::GET, &format!("/repos/{owner}/{repo}/pulls"))
            .query(&page.query(state))
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn create_issue(
        &self,
        owner: &str,
        repo: &str,
        title: &str,
        body: Option<&str>,
    ) -> Result<Value, ApiError> {
        self.require_token("GitHub token is required to create issues")?;
        if title.trim().is_empty() {
            return Err(ApiError::validation("title must not be empty"));
        }

        let mut payload = serde_json::Map::new();
        payload.insert("title".to_string(), Value::String(title.to_string()));
        if let Some(body) = body.filter(|body| !body.is_empty()) {
            payload.insert("body".to_string(), Value::String(body.to_string()));
        }

        let response = self
            .request(reqwest::Method::POST, &format!("/repos/{owner}/{repo}/issues"))
            .json(&payload)
            .send()
            .await?;
        read_json(response).await
    }

    /// Field validation runs before the credential check so an empty patch
    /// never reaches the network, with or without a token.
    pub async fn update_issue(
        &self,
        owner: &str,
        repo: &str,
        issue_number: u64,
        patch: IssuePatch,
    ) -> Result<Value, ApiError> {
        let patch = patch.normalized()?;
        self.require_token("GitHub token is required to update issues")?;

        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("/repos/{owner}/{repo}/issues/{issue_number}"),
            )
            .json(&patch)
            .send()
            .await?;
        read_json(response).await
    }
}
