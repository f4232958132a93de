//! YouTube Data API v3 and YouTube Analytics API v2
//!
//! [`YouTubeDataClient`] covers the public endpoints reachable with an API key.
//! [`ChannelApi`] covers the endpoints that act on the authenticated owner's
//! channel; its production implementation fetches a bearer token from
//! [`CredentialManager`] for every call.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::debug;

use crate::clients::{oauth::CredentialManager, read_json};
use crate::errors::ApiError;

pub const YOUTUBE_API_BASE: &str = "https://www.googleapis.com/youtube/v3";
pub const YOUTUBE_ANALYTICS_API_BASE: &str = "https://youtubeanalytics.googleapis.com/v2";
pub const MAX_RESULTS_LIMIT: u32 = 50;
pub const SEARCH_ORDERS: [&str; 5] = ["relevance", "date", "rating", "viewCount", "title"];

const MISSING_API_KEY: &str = "YouTube API key is required";

#[derive(Debug, Clone)]
pub struct YouTubeDataClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl YouTubeDataClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            base_url: YOUTUBE_API_BASE.to_string(),
            api_key,
        }
    }

    fn key(&self) -> Result<&str, ApiError> {
        self.api_key
            .as_deref()
            .ok_or(ApiError::missing_credential(MISSING_API_KEY))
    }

    async fn get(&self, resource: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let key = self.key()?;
        let url = format!("{}/{}", self.base_url, resource);
        debug!(resource = %resource, "youtube data request");

        let response = self
            .http
            .get(url)
            .query(&[("key", key)])
            .query(query)
            .send()
            .await?;
        read_json(response).await
    }

    /// Out-of-range `max_results` falls back to 10, an unknown `order` to
    /// relevance.
    pub async fn search(
        &self,
        query: &str,
        max_results: u32,
        order: &str,
        published_after: Option<&str>,
    ) -> Result<Value, ApiError> {
        let mut params = vec![
            ("part", "snippet".to_string()),
            ("q", query.to_string()),
            ("type", "video".to_string()),
            ("maxResults", normalize_max_results(max_results).to_string()),
            ("order", normalize_order(order).to_string()),
        ];
        if let Some(published_after) = published_after.filter(|value| !value.is_empty()) {
            params.push(("publishedAfter", published_after.to_string()));
        }
        self.get("search", &params).await
    }

    /// Only the first 50 ids are sent; that is the API's per-request cap.
    pub async fn videos(&self, video_ids: &[String]) -> Result<Value, ApiError> {
        self.key()?;
        if video_ids.is_empty() {
            return Err(ApiError::validation("At least one video ID is required"));
        }
        let ids = video_ids
            .iter()
            .take(MAX_RESULTS_LIMIT as usize)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");
        self.get(
            "videos",
            &[
                ("part", "snippet,statistics,contentDetails".to_string()),
                ("id", ids),
            ],
        )
        .await
    }

    pub async fn most_popular(&self, region_code: &str, max_results: u32) -> Result<Value, ApiError> {
        self.get(
            "videos",
            &[
                ("part", "snippet,statistics,contentDetails".to_string()),
                ("chart", "mostPopular".to_string()),
                ("regionCode", region_code.to_ascii_uppercase()),
                ("maxResults", normalize_max_results(max_results).to_string()),
            ],
        )
        .await
    }
}

pub fn normalize_max_results(max_results: u32) -> u32 {
    if (1..=MAX_RESULTS_LIMIT).contains(&max_results) {
        max_results
    } else {
        10
    }
}

pub fn normalize_order(order: &str) -> &str {
    if SEARCH_ORDERS.contains(&order) {
        order
    } else {
        "relevance"
    }
}

/// One `reports` query against the owner's channel.
///
/// Without an explicit `sort` the report is ordered by its dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub metrics: Vec<&'static str>,
    pub dimensions: Option<&'static str>,
    pub filters: Option<String>,
    pub sort: Option<&'static str>,
    pub max_results: Option<u32>,
}

impl AnalyticsQuery {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate, metrics: &[&'static str]) -> Self {
        Self {
            start_date,
            end_date,
            metrics: metrics.to_vec(),
            dimensions: None,
            filters: None,
            sort: None,
            max_results: None,
        }
    }

    pub fn by(mut self, dimensions: &'static str) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn for_video(mut self, video_id: &str) -> Self {
        self.filters = Some(format!("video=={video_id}"));
        self
    }

    pub fn sorted(mut self, sort: &'static str) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn limit(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("ids", "channel==MINE".to_string()),
            ("startDate", self.start_date.format("%Y-%m-%d").to_string()),
            ("endDate", self.end_date.format("%Y-%m-%d").to_string()),
            ("metrics", self.metrics.join(",")),
        ];
        if let Some(dimensions) = self.dimensions {
            params.push(("dimensions", dimensions.to_string()));
        }
        if let Some(sort) = self.sort.or(self.dimensions) {
            params.push(("sort", sort.to_string()));
        }
        if let Some(filters) = &self.filters {
            params.push(("filters", filters.clone()));
        }
        if let Some(max_results) = self.max_results {
            params.push(("maxResults", max_results.to_string()));
        }
        params
    }
}

/// Owner-scoped operations used by the channel management and analytics tools.
#[async_trait]
pub trait ChannelApi: Send + Sync {
    async fn my_channel(&self) -> Result<Value, ApiError>;
    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Value, ApiError>;
    async fn videos(&self, video_ids: &[String], part: &str) -> Result<Value, ApiError>;
    /// Replaces the video's snippet wholesale (`videos.update`, part=snippet).
    async fn update_video_snippet(&self, video_id: &str, snippet: Value) -> Result<Value, ApiError>;
    async fn analytics_report(&self, query: &AnalyticsQuery) -> Result<Value, ApiError>;
}

#[derive(Debug, Clone)]
pub struct YouTubeChannelClient {
    http: reqwest::Client,
    credentials: CredentialManager,
    data_base_url: String,
    analytics_base_url: String,
}

impl YouTubeChannelClient {
    pub fn new(http: reqwest::Client, credentials: CredentialManager) -> Self {
        Self {
            http,
            credentials,
            data_base_url: YOUTUBE_API_BASE.to_string(),
            analytics_base_url: YOUTUBE_ANALYTICS_API_BASE.to_string(),
        }
    }

    async fn authorized(
        &self,
        method: reqwest::Method,
        url: String,
    ) -> Result<reqwest::RequestBuilder, ApiError> {
        let token = self.credentials.access_token().await?;
        debug!(method = %method, url = %url, "youtube owner request");
        Ok(self.http.request(method, url).bearer_auth(token))
    }
}

#[async_trait]
impl ChannelApi for YouTubeChannelClient {
    async fn my_channel(&self) -> Result<Value, ApiError> {
        let response = self
            .authorized(
                reqwest::Method::GET,
                format!("{}/channels", self.data_base_url),
            )
            .await?
            .query(&[("part", "snippet,statistics,contentDetails"), ("mine", "true")])
            .send()
            .await?;
        let body = read_json(response).await?;

        body.get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned()
            .ok_or_else(|| ApiError::not_found("no channel is associated with this account"))
    }

    async fn playlist_items(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let mut query = vec![
            ("part", "snippet,contentDetails".to_string()),
            ("playlistId", playlist_id.to_string()),
            ("maxResults", max_results.clamp(1, MAX_RESULTS_LIMIT).to_string()),
        ];
        if let Some(page_token) = page_token.filter(|token| !token.is_empty()) {
            query.push(("pageToken", page_token.to_string()));
        }

        let response = self
            .authorized(
                reqwest::Method::GET,
                format!("{}/playlistItems", self.data_base_url),
            )
            .await?
            .query(&query)
            .send()
            .await?;
        read_json(response).await
    }

    async fn videos(&self, video_ids: &[String], part: &str) -> Result<Value, ApiError> {
        let response = self
            .authorized(reqwest::Method::GET, format!("{}/videos", self.data_base_url))
            .await?
            .query(&[("part", part.to_string()), ("id", video_ids.join(","))])
            .send()
            .await?;
        read_json(response).await
    }

    async fn update_video_snippet(&self, video_id: &str, snippet: Value) -> Result<Value, ApiError> {
        let body = serde_json::json!({ "id": video_id, "snippet": snippet });
        let response = self
            .authorized(reqwest::Method::PUT, format!("{}/videos", self.data_base_url))
            .await?
            .query(&[("part", "snippet")])
            .json(&body)
            .send()
            .await?;
        read_json(response).await
    }

    async fn analytics_report(&self, query: &AnalyticsQuery) -> Result<Value, ApiError> {
        let response = self
            .authorized(
                reqwest::Method::GET,
                format!("{}/reports", self.analytics_base_url),
            )
            .await?
            .query(&query.params())
            .send()
            .await?;
        read_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_parameters_fall_back_to_defaults() {
        assert_eq!(normalize_max_results(0), 10);
        assert_eq!(normalize_max_results(51), 10);
        assert_eq!(normalize_max_results(25), 25);
        assert_eq!(normalize_order("viewCount"), "viewCount");
        assert_eq!(normalize_order("popularity"), "relevance");
    }

    #[tokio::test]
    async fn missing_api_key_short_circuits() {
        let client = YouTubeDataClient::new(reqwest::Client::new(), None);
        let err = client
            .search("rust", 10, "relevance", None)
            .await
            .expect_err("no key");
        assert_eq!(err.to_string(), "YouTube API key is required");
        assert!(err.is_local());

        let err = client.videos(&[]).await.expect_err("no key");
        assert!(matches!(err, ApiError::MissingCredential { .. }));
    }

    #[tokio::test]
    async fn empty_id_list_is_rejected_before_the_request() {
        let client = YouTubeDataClient::new(reqwest::Client::new(), Some("key".to_string()));
        let err = client.videos(&[]).await.expect_err("no ids");
        assert_eq!(err.to_string(), "At least one video ID is required");
    }

    #[test]
    fn analytics_query_targets_own_channel() {
        let query = AnalyticsQuery::new(
            NaiveDate::from_ymd_opt(2024, 1, 1).expect("date"),
            NaiveDate::from_ymd_opt(2024, 1, 31).expect("date"),
            &["views", "likes"],
        )
        .by("day")
        .for_video("abc");
        let params = query.params();
        assert!(params.contains(&("ids", "channel==MINE".to_string())));
        assert!(params.contains(&("startDate", "2024-01-01".to_string())));
        assert!(params.contains(&("metrics", "views,likes".to_string())));
        assert!(params.contains(&("filters", "video==abc".to_string())));
        assert!(params.contains(&("sort", "day".to_string())));
    }

    #[test]
    fn breakdown_queries_sort_and_limit() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).expect("date");
        let params = AnalyticsQuery::new(date, date, &["views"])
            .by("country")
            .sorted("-views")
            .limit(20)
            .params();
        assert!(params.contains(&("sort", "-views".to_string())));
        assert!(params.contains(&("maxResults", "20".to_string())));

        let totals = AnalyticsQuery::new(date, date, &["views"]).params();
        assert!(totals.iter().all(|(key, _)| *key != "dimensions" && *key != "sort"));
    }
}
