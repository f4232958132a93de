//! Public YouTube search and popularity analysis (API key only)

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use chrono::Utc;
use regex::Regex;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::clients::youtube::YouTubeDataClient;
use crate::domain::into_payload;
use crate::domain::utils::{count, parse_iso8601_duration, round2, str_field, truncate_chars};
use crate::errors::{ApiError, RegistryError};
use crate::mcp::registry::ToolRegistry;

const DEFAULT_MAX_RESULTS: u32 = 10;
const DEFAULT_REGION: &str = "US";
const DESCRIPTION_PREVIEW_CHARS: usize = 200;
const TOP_KEYWORDS: usize = 10;
const TOP_CHANNELS: usize = 5;
const MIN_KEYWORD_CHARS: usize = 4;

#[macros::mcp_tool(
    name = "search_youtube_videos",
    description = "Search YouTube videos by keyword and analyze popularity factors"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct SearchYoutubeVideosTool {
    pub query: String,
    /// 1-50, default 10
    pub max_results: Option<u32>,
    /// relevance, date, rating, viewCount or title
    pub order: Option<String>,
    /// RFC 3339 timestamp, e.g. 2023-01-01T00:00:00Z
    pub published_after: Option<String>,
}

#[macros::mcp_tool(
    name = "get_youtube_video_details",
    description = "Get detailed information about YouTube videos"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetYoutubeVideoDetailsTool {
    pub video_ids: Vec<String>,
}

#[macros::mcp_tool(
    name = "analyze_youtube_video",
    description = "Analyze specific YouTube video in detail"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct AnalyzeYoutubeVideoTool {
    pub video_id: String,
}

#[macros::mcp_tool(
    name = "analyze_youtube_videos",
    description = "Search YouTube videos and build an aggregate popularity report"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct AnalyzeYoutubeVideosTool {
    pub query: String,
    pub max_results: Option<u32>,
    /// default viewCount
    pub order: Option<String>,
}

#[macros::mcp_tool(
    name = "get_youtube_trending_analysis",
    description = "Get trending YouTube videos and analyze trends"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GetYoutubeTrendingAnalysisTool {
    /// ISO 3166-1 alpha-2 region, default US
    pub region_code: Option<String>,
    pub max_results: Option<u32>,
}

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w+\b").expect("word pattern is valid"))
}

fn items(response: &Value) -> &[Value] {
    response
        .get("items")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Condensed per-video view used by the reports.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoSummary {
    pub title: String,
    pub channel: String,
    pub published: String,
    pub views: u64,
    pub likes: u64,
    pub comments: u64,
    pub duration: String,
    pub url: String,
    pub description_preview: String,
    #[serde(skip)]
    duration_seconds: u64,
}

impl VideoSummary {
    pub fn from_video(video: &Value) -> Self {
        let snippet = video.get("snippet").unwrap_or(&Value::Null);
        let statistics = video.get("statistics").unwrap_or(&Value::Null);
        let duration = video
            .pointer("/contentDetails/duration")
            .and_then(Value::as_str)
            .unwrap_or_default();

        Self {
            title: str_field(snippet, "title").to_string(),
            channel: str_field(snippet, "channelTitle").to_string(),
            published: str_field(snippet, "publishedAt").to_string(),
            views: count(statistics, "viewCount"),
            likes: count(statistics, "likeCount"),
            comments: count(statistics, "commentCount"),
            duration: duration.to_string(),
            url: format!("https://www.youtube.com/watch?v={}", str_field(video, "id")),
            description_preview: truncate_chars(
                str_field(snippet, "description"),
                DESCRIPTION_PREVIEW_CHARS,
            ),
            duration_seconds: parse_iso8601_duration(duration),
        }
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round2(part as f64 / whole as f64 * 100.0)
    }
}

/// Engagement breakdown for a single video.
pub fn video_engagement(video: &Value) -> Value {
    let summary = VideoSummary::from_video(video);
    let tags = video
        .pointer("/snippet/tags")
        .cloned()
        .unwrap_or_else(|| json!([]));

    let mut insights = Vec::new();
    let like_rate = percentage(summary.likes, summary.views);
    let comment_rate = percentage(summary.comments, summary.views);
    if summary.views > 0 {
        insights.push(format!("Like rate: {like_rate:.2}% of viewers liked the video"));
        insights.push(format!("Comment rate: {comment_rate:.2}% of viewers commented"));
    }
    insights.push(format!(
        "Duration: {:.1} minutes",
        summary.duration_seconds as f64 / 60.0
    ));

    json!({
        "video_id": str_field(video, "id"),
        "title": summary.title,
        "channel": summary.channel,
        "published_at": summary.published,
        "url": summary.url,
        "duration": summary.duration,
        "duration_seconds": summary.duration_seconds,
        "statistics": {
            "views": summary.views,
            "likes": summary.likes,
            "comments": summary.comments,
        },
        "engagement": {
            "like_rate": like_rate,
            "comment_rate": comment_rate,
            "engagement_rate": percentage(summary.likes + summary.comments, summary.views),
        },
        "tags": tags,
        "description_preview": summary.description_preview,
        "insights": insights,
    })
}

/// Counts with first-appearance tie breaking.
struct Tally<'a> {
    entries: Vec<(&'a str, u64, u64)>,
    index: HashMap<&'a str, usize>,
}

impl<'a> Tally<'a> {
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn add(&mut self, key: &'a str, weight: u64) {
        match self.index.get(key) {
            Some(&position) => {
                self.entries[position].1 += 1;
                self.entries[position].2 += weight;
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((key, 1, weight));
            }
        }
    }

    /// Sorted descending by `rank`, stable for ties.
    fn top(mut self, limit: usize, rank: impl Fn(&(&'a str, u64, u64)) -> u64) -> Vec<(&'a str, u64, u64)> {
        self.entries.sort_by_key(|entry| std::cmp::Reverse(rank(entry)));
        self.entries.truncate(limit);
        self.entries
    }
}

/// Aggregate report over a set of `videos` resources.
///
/// `context` is merged into the top level so callers can record what the
/// report was built from (a search query or a region).
pub fn analysis_report(videos: &[Value], context: Value) -> Result<Value, ApiError> {
    if videos.is_empty() {
        return Err(ApiError::not_found("No video details available for analysis"));
    }

    let mut summaries: Vec<VideoSummary> = videos.iter().map(VideoSummary::from_video).collect();
    let total = summaries.len() as f64;
    let total_views: u64 = summaries.iter().map(|video| video.views).sum();
    let total_likes: u64 = summaries.iter().map(|video| video.likes).sum();
    let total_comments: u64 = summaries.iter().map(|video| video.comments).sum();
    let total_seconds: u64 = summaries.iter().map(|video| video.duration_seconds).sum();

    let lowered: Vec<String> = videos
        .iter()
        .map(|video| {
            let snippet = video.get("snippet").unwrap_or(&Value::Null);
            format!(
                "{} {}",
                str_field(snippet, "title"),
                str_field(snippet, "description")
            )
            .to_lowercase()
        })
        .collect();
    let mut keywords = Tally::new();
    for text in &lowered {
        for word in word_pattern().find_iter(text) {
            if word.as_str().chars().count() >= MIN_KEYWORD_CHARS {
                keywords.add(word.as_str(), 0);
            }
        }
    }
    let top_keywords = keywords.top(TOP_KEYWORDS, |(_, frequency, _)| *frequency);

    let mut channels = Tally::new();
    for summary in &summaries {
        channels.add(summary.channel.as_str(), summary.views);
    }
    let top_channels: Vec<Value> = channels
        .top(TOP_CHANNELS, |(_, _, views)| *views)
        .into_iter()
        .map(|(channel, video_count, views)| {
            json!({"channel": channel, "video_count": video_count, "total_views": views})
        })
        .collect();

    summaries.sort_by_key(|video| std::cmp::Reverse(video.views));
    let insights = generate_insights(&summaries, &top_keywords, &top_channels);

    let mut report = json!({
        "analysis_date": Utc::now().to_rfc3339(),
        "total_videos_analyzed": summaries.len(),
        "metrics": {
            "total_views": total_views,
            "total_likes": total_likes,
            "total_comments": total_comments,
            "average_views": round2(total_views as f64 / total),
            "average_likes": round2(total_likes as f64 / total),
            "average_comments": round2(total_comments as f64 / total),
            "average_duration_minutes": round2(total_seconds as f64 / total / 60.0),
        },
        "top_keywords": top_keywords
            .iter()
            .map(|(word, frequency, _)| json!({"word": word, "frequency": frequency}))
            .collect::<Vec<_>>(),
        "top_channels": top_channels,
        "video_summaries": summaries,
        "insights": insights,
    });

    if let (Some(report), Value::Object(context)) = (report.as_object_mut(), context) {
        for (key, value) in context {
            report.insert(key, value);
        }
    }
    Ok(report)
}

fn generate_insights(
    videos: &[VideoSummary],
    keywords: &[(&str, u64, u64)],
    channels: &[Value],
) -> Vec<String> {
    let Some(top_video) = videos.first() else {
        return vec!["No videos available for insight generation.".to_string()];
    };

    let mut insights = vec![format!(
        "Most popular video: '{}' with {} views",
        top_video.title, top_video.views
    )];

    if let Some(channel) = channels.first() {
        insights.push(format!(
            "Top performing channel: '{}' with {} videos and {} total views",
            str_field(channel, "channel"),
            channel["video_count"],
            channel["total_views"]
        ));
    }

    if let Some((word, frequency, _)) = keywords.first() {
        insights.push(format!(
            "Most frequent keyword: '{word}' appears {frequency} times across video titles and descriptions"
        ));
    }

    let average_minutes = |group: &[&VideoSummary]| {
        group.iter().map(|video| video.duration_seconds).sum::<u64>() as f64
            / group.len() as f64
            / 60.0
    };
    let all: Vec<&VideoSummary> = videos.iter().collect();
    insights.push(format!(
        "Average video duration: {:.1} minutes",
        average_minutes(&all)
    ));

    let total_views: u64 = videos.iter().map(|video| video.views).sum();
    let total_likes: u64 = videos.iter().map(|video| video.likes).sum();
    if total_views > 0 {
        insights.push(format!(
            "Overall engagement rate (likes/views): {:.2}%",
            total_likes as f64 / total_views as f64 * 100.0
        ));
    }

    if videos.len() >= 3 {
        let bands: [(&str, fn(u64) -> bool); 3] = [
            ("High", |views| views > 100_000),
            ("Medium", |views| (10_000..=100_000).contains(&views)),
            ("Low", |views| views < 10_000),
        ];
        for (name, in_band) in bands {
            let group: Vec<&VideoSummary> = videos.iter().filter(|video| in_band(video.views)).collect();
            if !group.is_empty() {
                insights.push(format!(
                    "{name} performing videos (n={}) average {:.1} minutes",
                    group.len(),
                    average_minutes(&group)
                ));
            }
        }
    }

    insights
}

pub async fn analyze_videos(
    client: &YouTubeDataClient,
    query: &str,
    max_results: u32,
    order: &str,
) -> Result<Value, ApiError> {
    let search = client.search(query, max_results, order, None).await?;
    let video_ids: Vec<String> = items(&search)
        .iter()
        .filter_map(|item| item.pointer("/id/videoId").and_then(Value::as_str))
        .map(str::to_string)
        .collect();
    if video_ids.is_empty() {
        return Err(ApiError::not_found("No videos found for the given query"));
    }

    let details = client.videos(&video_ids).await?;
    analysis_report(items(&details), json!({ "query": query }))
}

pub async fn analyze_video(client: &YouTubeDataClient, video_id: &str) -> Result<Value, ApiError> {
    let video_id = video_id.trim();
    if video_id.is_empty() {
        return Err(ApiError::validation("video_id must not be empty"));
    }
    let details = client.videos(&[video_id.to_string()]).await?;
    items(&details)
        .first()
        .map(video_engagement)
        .ok_or_else(|| ApiError::not_found(format!("Video not found: {video_id}")))
}

pub async fn trending_analysis(
    client: &YouTubeDataClient,
    region_code: &str,
    max_results: u32,
) -> Result<Value, ApiError> {
    let popular = client.most_popular(region_code, max_results).await?;
    analysis_report(
        items(&popular),
        json!({ "region_code": region_code.to_ascii_uppercase() }),
    )
}

pub fn register(registry: &mut ToolRegistry, client: Arc<YouTubeDataClient>) -> Result<(), RegistryError> {
    let youtube = client.clone();
    registry.register_fn(SearchYoutubeVideosTool::tool(), move |params: SearchYoutubeVideosTool| {
        let youtube = youtube.clone();
        async move {
            Ok(into_payload(
                youtube
                    .search(
                        &params.query,
                        params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
                        params.order.as_deref().unwrap_or("relevance"),
                        params.published_after.as_deref(),
                    )
                    .await,
            ))
        }
    })?;

    let youtube = client.clone();
    registry.register_fn(
        GetYoutubeVideoDetailsTool::tool(),
        move |params: GetYoutubeVideoDetailsTool| {
            let youtube = youtube.clone();
            async move { Ok(into_payload(youtube.videos(&params.video_ids).await)) }
        },
    )?;

    let youtube = client.clone();
    registry.register_fn(AnalyzeYoutubeVideoTool::tool(), move |params: AnalyzeYoutubeVideoTool| {
        let youtube = youtube.clone();
        async move { Ok(into_payload(analyze_video(&youtube, &params.video_id).await)) }
    })?;

    let youtube = client.clone();
    registry.register_fn(AnalyzeYoutubeVideosTool::tool(), move |params: AnalyzeYoutubeVideosTool| {
        let youtube = youtube.clone();
        async move {
            Ok(into_payload(
                analyze_videos(
                    &youtube,
                    &params.query,
                    params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
                    params.order.as_deref().unwrap_or("viewCount"),
                )
                .await,
            ))
        }
    })?;

    let youtube = client;
    registry.register_fn(
        GetYoutubeTrendingAnalysisTool::tool(),
        move |params: GetYoutubeTrendingAnalysisTool| {
            let youtube = youtube.clone();
            async move {
                let region = params
                    .region_code
                    .filter(|region| !region.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_REGION.to_string());
                Ok(into_payload(
                    trending_analysis(
                        &youtube,
                        region.trim(),
                        params.max_results.unwrap_or(DEFAULT_MAX_RESULTS),
                    )
                    .await,
                ))
            }
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, channel: &str, title: &str, views: u64, likes: u64, duration: &str) -> Value {
        json!({
            "id": id,
            "snippet": {
                "title": title,
                "channelTitle": channel,
                "publishedAt": "2024-05-01T00:00:00Z",
                "description": "async rust tutorial",
                "tags": ["rust"],
            },
            "statistics": {
                "viewCount": views.to_string(),
                "likeCount": likes.to_string(),
                "commentCount": "10",
            },
            "contentDetails": {"duration": duration},
        })
    }

    fn sample() -> Vec<Value> {
        vec![
            video("a", "Ferris", "Tokio deep dive", 5_000, 50, "PT10M"),
            video("b", "Crab TV", "Rust async basics", 250_000, 9_000, "PT20M"),
            video("c", "Ferris", "Async traits explained", 40_000, 800, "PT30M"),
        ]
    }

    #[test]
    fn report_aggregates_and_sorts_by_views() {
        let report = analysis_report(&sample(), json!({"query": "rust"})).expect("report");

        assert_eq!(report["query"], "rust");
        assert_eq!(report["total_videos_analyzed"], 3);
        assert_eq!(report["metrics"]["total_views"], 295_000);
        assert_eq!(report["metrics"]["average_duration_minutes"], 20.0);
        assert_eq!(report["video_summaries"][0]["title"], "Rust async basics");
        assert_eq!(report["video_summaries"][2]["views"], 5_000);
        assert_eq!(report["video_summaries"][0]["url"], "https://www.youtube.com/watch?v=b");
        assert_eq!(report["top_channels"][0]["channel"], "Crab TV");
        assert_eq!(report["top_channels"][1]["video_count"], 2);
        assert_eq!(report["top_keywords"][0]["word"], "async");
        assert_eq!(report["top_keywords"][0]["frequency"], 5);

        let insights = report["insights"].as_array().expect("insights");
        assert!(insights[0]
            .as_str()
            .expect("text")
            .starts_with("Most popular video: 'Rust async basics'"));
        assert!(insights
            .iter()
            .any(|line| line.as_str() == Some("High performing videos (n=1) average 20.0 minutes")));
    }

    #[test]
    fn empty_video_list_is_an_error() {
        let err = analysis_report(&[], json!({})).expect_err("empty");
        assert_eq!(err.to_string(), "not found: No video details available for analysis");
    }

    #[test]
    fn engagement_rates_are_percentages() {
        let result = video_engagement(&video("z", "Ch", "T", 1_000, 50, "PT1H2M3S"));
        assert_eq!(result["video_id"], "z");
        assert_eq!(result["duration_seconds"], 3723);
        assert_eq!(result["engagement"]["like_rate"], 5.0);
        assert_eq!(result["engagement"]["comment_rate"], 1.0);
        assert_eq!(result["engagement"]["engagement_rate"], 6.0);
    }

    #[tokio::test]
    async fn missing_key_becomes_error_payload() {
        let mut registry = ToolRegistry::new();
        register(
            &mut registry,
            Arc::new(YouTubeDataClient::new(reqwest::Client::new(), None)),
        )
        .expect("register");

        let arguments = json!({"query": "rust"}).as_object().cloned();
        let result = registry
            .call("analyze_youtube_videos", arguments)
            .await
            .expect("payload");
        assert_eq!(result, json!({"error": "YouTube API key is required"}));
    }
}
