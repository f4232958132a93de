//! Title and publishing heuristics over the channel's own uploads.
//!
//! Nothing here calls a model: suggestions come from fixed templates scored
//! by simple rules, and patterns are counted from the upload list.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use regex::Regex;
use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::clients::youtube::ChannelApi;
use crate::domain::channel::list_my_videos;
use crate::domain::into_payload;
use crate::domain::utils::round2;
use crate::errors::{ApiError, RegistryError};
use crate::mcp::registry::ToolRegistry;

const SCANNED_UPLOADS: u32 = 50;
const MAX_TITLE_CHARS: usize = 100;
const MAX_SUGGESTIONS: usize = 5;
const TOP_TAGS: usize = 10;
const TOP_WORDS: usize = 10;
const POWER_WORDS: [&str; 7] = [
    "must watch",
    "latest",
    "complete",
    "ultimate",
    "best",
    "essential",
    "definitive",
];
const EMOTIONAL_TRIGGERS: [&str; 5] = ["shocking", "moving", "hilarious", "legendary", "unbelievable"];
const STOP_WORDS: [&str; 12] = [
    "the", "and", "for", "with", "you", "your", "how", "what", "why", "this", "that", "from",
];
const THEMES: [(&str, &[&str]); 4] = [
    ("tutorial", &["how to", "tutorial", "guide", "step by step"]),
    ("review", &["review", "vs", "comparison", "best"]),
    ("entertainment", &["challenge", "tried", "experiment", "prank"]),
    ("news", &["news", "latest", "announced", "update"]),
];

#[macros::mcp_tool(
    name = "generate_buzz_title",
    description = "Suggest attention-grabbing titles for one of your videos"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GenerateBuzzTitleTool {
    pub video_id: String,
}

#[macros::mcp_tool(
    name = "generate_optimized_titles",
    description = "Suggest scored title variants for a video, optionally for a target audience"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GenerateOptimizedTitlesTool {
    pub video_id: String,
    /// young, business, parents or seniors
    pub target_audience: Option<String>,
}

#[macros::mcp_tool(
    name = "analyze_success_patterns",
    description = "Find what your most viewed uploads have in common"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct AnalyzeSuccessPatternsTool {}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct VideoCounts {
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub comment_count: u64,
}

impl VideoCounts {
    fn engagement_rate(&self) -> Option<f64> {
        (self.view_count > 0)
            .then(|| (self.like_count + self.comment_count) as f64 / self.view_count as f64 * 100.0)
    }
}

/// The parts of an upload record the heuristics look at.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Upload {
    pub video_id: String,
    pub title: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub published_at: String,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub statistics: VideoCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TitleIdea {
    pub title: String,
    pub strategy: &'static str,
    pub expected_ctr_boost: &'static str,
    pub score: u32,
}

fn bracket_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"【[^】]*】|\[[^\]]*\]").expect("bracket pattern is valid"))
}

/// The title without its bracketed tags such as `[NEW]`.
pub fn base_title(title: &str) -> String {
    let stripped = bracket_pattern().replace_all(title, "");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

async fn uploads(api: &dyn ChannelApi) -> Result<Vec<Upload>, ApiError> {
    let page = list_my_videos(api, Some(SCANNED_UPLOADS), None).await?;
    let videos = page.get("videos").cloned().unwrap_or_else(|| json!([]));
    serde_json::from_value(videos).map_err(|err| ApiError::decode(format!("unexpected video record: {err}")))
}

async fn find_upload(api: &dyn ChannelApi, video_id: &str) -> Result<Upload, ApiError> {
    let video_id = video_id.trim();
    if video_id.is_empty() {
        return Err(ApiError::validation("video_id must not be empty"));
    }
    uploads(api)
        .await?
        .into_iter()
        .find(|upload| upload.video_id == video_id)
        .ok_or_else(|| ApiError::not_found(format!("Video not found: {video_id}")))
}

/// The current title first, then up to four template variants.
pub fn buzz_titles(title: &str, views: u64, year: i32) -> Vec<String> {
    let base = base_title(title);
    let lower = base.to_lowercase();
    let length = base.chars().count();

    let mut candidates = Vec::new();
    if length < 30 {
        candidates.push(format!("[Must watch] {base} [{year} update]"));
    }
    if lower.contains("how to") {
        candidates.push(format!("I tried {base}... and the result was shocking"));
    }
    if !lower.contains("tips") && length < 20 {
        candidates.push(format!("Tips for {base} you can't afford to miss"));
    }
    if lower.contains("beginner") || lower.contains("intro") {
        candidates.push(format!("{base} | 3 points from a pro"));
    }
    if views > 10_000 {
        candidates.push(format!("[{}K views] {base} is unreal", views / 1000));
    }

    let mut suggestions = vec![title.to_string()];
    suggestions.extend(
        candidates
            .into_iter()
            .filter(|candidate| candidate.chars().count() <= MAX_TITLE_CHARS),
    );
    suggestions.truncate(MAX_SUGGESTIONS);
    suggestions
}

/// Click-through heuristics: 40 to 60 characters, power words, digits,
/// bracketed tags and a question or exclamation.
pub fn title_score(title: &str) -> u32 {
    let length = title.chars().count();
    let lower = title.to_lowercase();
    let mut score = match length {
        40..=60 => 20,
        30..=70 => 10,
        _ => 0,
    };
    score += 5 * POWER_WORDS.iter().filter(|word| lower.contains(*word)).count() as u32;
    if title.chars().any(|c| c.is_ascii_digit()) {
        score += 10;
    }
    if (title.contains('[') && title.contains(']')) || (title.contains('【') && title.contains('】')) {
        score += 5;
    }
    if title.contains('!') || title.contains('！') {
        score += 3;
    }
    if title.contains('?') || title.contains('？') {
        score += 5;
    }
    score
}

fn audience_title(base: &str, audience: &str) -> Option<String> {
    match audience.trim().to_lowercase().as_str() {
        "young" => Some(format!("[Gen Z must watch] {base} hits different")),
        "business" => Some(format!("{base} | 3 rules successful people follow")),
        "parents" => Some(format!("[Save this] {base} to make home life easier")),
        "seniors" => Some(format!("[Explained simply] {base}: the basics and beyond")),
        _ => None,
    }
}

/// Template titles ranked by [`title_score`], best five first.
pub fn optimized_titles(upload: &Upload, target_audience: Option<&str>, today: NaiveDate) -> Vec<TitleIdea> {
    let base = base_title(&upload.title);
    let views = upload.statistics.view_count;
    let trigger = EMOTIONAL_TRIGGERS[base.chars().count() % EMOTIONAL_TRIGGERS.len()];

    let mut ideas: Vec<(String, &'static str, &'static str)> = Vec::new();
    if views > 10_000 {
        ideas.push((
            format!("[{}K views] The truth about {base}", views / 1000),
            "Social proof",
            "+15-20%",
        ));
    }
    ideas.push((format!("{base} took a {trigger} turn..."), "Emotional hook", "+10-15%"));
    ideas.push((
        format!("Why is everyone talking about {base}? The reason is wild"),
        "Curiosity gap",
        "+12-18%",
    ));
    ideas.push((format!("5 key lessons from {base}"), "List format", "+8-12%"));
    if let Some(title) = target_audience.and_then(|audience| audience_title(&base, audience)) {
        ideas.push((title, "Tailored to the target audience", "+20-25%"));
    }
    ideas.push((
        format!("[{} {} update] The complete guide to {base}", today.format("%B"), today.year()),
        "Freshness",
        "+10-15%",
    ));

    let mut ideas: Vec<TitleIdea> = ideas
        .into_iter()
        .map(|(title, strategy, expected_ctr_boost)| TitleIdea {
            score: title_score(&title),
            title,
            strategy,
            expected_ctr_boost,
        })
        .collect();
    ideas.sort_by(|a, b| b.score.cmp(&a.score));
    ideas.truncate(MAX_SUGGESTIONS);
    ideas
}

fn share(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round2(count as f64 / total as f64 * 100.0)
    }
}

fn most_common<K: Ord + Clone>(values: impl IntoIterator<Item = K>) -> Option<K> {
    let mut counts: BTreeMap<K, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let best = counts.values().copied().max()?;
    counts.into_iter().find(|(_, count)| *count == best).map(|(key, _)| key)
}

fn ranked<'a>(values: impl IntoIterator<Item = &'a str>, limit: usize) -> Vec<String> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for value in values {
        *counts.entry(value).or_default() += 1;
    }
    let mut counts: Vec<(&str, usize)> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts.into_iter().take(limit).map(|(value, _)| value.to_string()).collect()
}

fn title_patterns(top: &[Upload]) -> Value {
    let lengths: usize = top.iter().map(|upload| upload.title.chars().count()).sum();
    let words: Vec<String> = top
        .iter()
        .flat_map(|upload| upload.title.split_whitespace())
        .map(|word| {
            word.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|word| word.chars().count() >= 3 && !STOP_WORDS.contains(&word.as_str()))
        .collect();
    json!({
        "average_length": round2(lengths as f64 / top.len().max(1) as f64),
        "use_brackets": share(top.iter().filter(|upload| upload.title.contains('[') || upload.title.contains('【')).count(), top.len()),
        "use_numbers": share(top.iter().filter(|upload| upload.title.chars().any(|c| c.is_ascii_digit())).count(), top.len()),
        "common_words": ranked(words.iter().map(String::as_str), TOP_WORDS),
    })
}

fn length_patterns(top: &[Upload]) -> Value {
    let lengths: Vec<u64> = top.iter().map(|upload| upload.duration).collect();
    let average = lengths.iter().sum::<u64>() as f64 / lengths.len().max(1) as f64;
    let shortest = lengths.iter().copied().min().unwrap_or(0);
    let longest = lengths.iter().copied().max().unwrap_or(0);
    json!({
        "average_seconds": round2(average),
        "optimal_range": format!("{}-{} minutes", shortest / 60, longest / 60),
        "most_common": format!("about {} minutes", (average / 60.0).floor()),
    })
}

fn publishing_patterns(top: &[Upload]) -> Value {
    let published: Vec<DateTime<Utc>> = top
        .iter()
        .filter_map(|upload| DateTime::parse_from_rfc3339(&upload.published_at).ok())
        .map(|time| time.with_timezone(&Utc))
        .collect();
    let (Some(day), Some(hour)) = (
        most_common(published.iter().map(|time| time.format("%A").to_string())),
        most_common(published.iter().map(|time| time.format("%H").to_string())),
    ) else {
        return json!({"message": "not enough data"});
    };

    let first = published.iter().min().copied();
    let last = published.iter().max().copied();
    let months = match (first, last) {
        (Some(first), Some(last)) => ((last - first).num_days() as f64 / 30.0).max(1.0),
        _ => 1.0,
    };
    json!({
        "best_day": day,
        "best_hour": format!("{hour}:00 UTC"),
        "frequency": format!("{:.1} videos/month", published.len() as f64 / months),
    })
}

fn tag_patterns(top: &[Upload]) -> Vec<String> {
    ranked(top.iter().flat_map(|upload| upload.tags.iter().map(String::as_str)), TOP_TAGS)
}

fn engagement_patterns(top: &[Upload]) -> Value {
    let rates: Vec<f64> = top
        .iter()
        .filter_map(|upload| upload.statistics.engagement_rate())
        .collect();
    if rates.is_empty() {
        return json!({"average_rate": 0});
    }

    let high: Vec<&Upload> = top
        .iter()
        .filter(|upload| upload.statistics.engagement_rate().is_some_and(|rate| rate > 5.0))
        .collect();
    let questions = high.iter().filter(|upload| upload.title.contains('?')).count();
    let mut factors = Vec::new();
    if high.len() as f64 > top.len() as f64 / 2.0 {
        factors.push("Active conversation with viewers");
    }
    if !high.is_empty() && questions as f64 > high.len() as f64 / 3.0 {
        factors.push("Question-style titles");
    }
    if factors.is_empty() {
        factors.push("Consistently strong content");
    }

    json!({
        "average_rate": round2(rates.iter().sum::<f64>() / rates.len() as f64),
        "highest_rate": round2(rates.iter().copied().fold(0.0, f64::max)),
        "engagement_factors": factors,
    })
}

fn content_themes(top: &[Upload]) -> Vec<&'static str> {
    let themes: Vec<&'static str> = THEMES
        .iter()
        .filter(|(_, words)| {
            let matching = top
                .iter()
                .filter(|upload| {
                    let title = upload.title.to_lowercase();
                    words.iter().any(|word| title.contains(word))
                })
                .count();
            matching as f64 > top.len() as f64 / 4.0
        })
        .map(|(theme, _)| *theme)
        .collect();
    if themes.is_empty() {
        vec!["variety"]
    } else {
        themes
    }
}

fn recommendations(patterns: &Value) -> Vec<String> {
    let mut advice = Vec::new();
    let number = |pointer: &str| patterns.pointer(pointer).and_then(Value::as_f64).unwrap_or(0.0);

    if number("/title_patterns/use_brackets") > 70.0 {
        advice.push("Keep using bracketed tags in titles".to_string());
    }
    if number("/title_patterns/average_length") > 50.0 {
        advice.push("Detailed titles work: keep them above 50 characters".to_string());
    }
    let seconds = number("/optimal_length/average_seconds");
    if seconds > 600.0 {
        advice.push("Videos over 10 minutes perform best".to_string());
    } else if seconds > 0.0 && seconds < 300.0 {
        advice.push("Short videos under 5 minutes perform best".to_string());
    }
    if let (Some(day), Some(hour)) = (
        patterns.pointer("/best_publishing_time/best_day").and_then(Value::as_str),
        patterns.pointer("/best_publishing_time/best_hour").and_then(Value::as_str),
    ) {
        advice.push(format!("Publish on {day} around {hour}"));
    }
    if number("/engagement_factors/average_rate") > 5.0 {
        advice.push("Engagement is high: keep talking with viewers".to_string());
    }
    advice
}

/// Patterns shared by the top fifth of uploads by views.
pub fn success_patterns(mut uploads: Vec<Upload>) -> Result<Value, ApiError> {
    if uploads.is_empty() {
        return Err(ApiError::not_found("No uploaded videos to analyze"));
    }
    uploads.sort_by(|a, b| b.statistics.view_count.cmp(&a.statistics.view_count));
    let top_count = (uploads.len() / 5).max(1);
    let top = &uploads[..top_count];

    let patterns = json!({
        "title_patterns": title_patterns(top),
        "optimal_length": length_patterns(top),
        "best_publishing_time": publishing_patterns(top),
        "tag_patterns": tag_patterns(top),
        "engagement_factors": engagement_patterns(top),
        "content_themes": content_themes(top),
    });
    Ok(json!({
        "videos_analyzed": uploads.len(),
        "top_performers_count": top_count,
        "recommendations": recommendations(&patterns),
        "success_patterns": patterns,
    }))
}

pub async fn buzz_title_report(api: &dyn ChannelApi, video_id: &str, today: NaiveDate) -> Result<Value, ApiError> {
    let upload = find_upload(api, video_id).await?;
    let counts = upload.statistics;
    Ok(json!({
        "current_title": upload.title,
        "suggestions": buzz_titles(&upload.title, counts.view_count, today.year()),
        "current_stats": {
            "views": counts.view_count,
            "likes": counts.like_count,
            "comments": counts.comment_count,
        },
    }))
}

pub async fn optimized_title_report(
    api: &dyn ChannelApi,
    video_id: &str,
    target_audience: Option<&str>,
    today: NaiveDate,
) -> Result<Value, ApiError> {
    let upload = find_upload(api, video_id).await?;
    Ok(json!({
        "video_id": upload.video_id,
        "current_title": upload.title,
        "target_audience": target_audience,
        "suggestions": optimized_titles(&upload, target_audience, today),
    }))
}

pub fn register(registry: &mut ToolRegistry, channel: Arc<dyn ChannelApi>) -> Result<(), RegistryError> {
    let api = channel.clone();
    registry.register_fn(GenerateBuzzTitleTool::tool(), move |params: GenerateBuzzTitleTool| {
        let api = api.clone();
        async move {
            let today = Utc::now().date_naive();
            Ok(into_payload(buzz_title_report(api.as_ref(), &params.video_id, today).await))
        }
    })?;

    let api = channel.clone();
    registry.register_fn(
        GenerateOptimizedTitlesTool::tool(),
        move |params: GenerateOptimizedTitlesTool| {
            let api = api.clone();
            async move {
                let today = Utc::now().date_naive();
                Ok(into_payload(
                    optimized_title_report(
                        api.as_ref(),
                        &params.video_id,
                        params.target_audience.as_deref(),
                        today,
                    )
                    .await,
                ))
            }
        },
    )?;

    let api = channel;
    registry.register_fn(
        AnalyzeSuccessPatternsTool::tool(),
        move |_params: AnalyzeSuccessPatternsTool| {
            let api = api.clone();
            async move {
                Ok(into_payload(uploads(api.as_ref()).await.and_then(success_patterns)))
            }
        },
    )
}
