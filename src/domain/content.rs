//! Video copy generated from the transcript: descriptions, SEO tags, social
//! posts and the metadata updates that publish them.
//!
//! Like the semantic tools, every handler answers `{"success": true, …}` or
//! `{"success": false, "error": …, "message": …}`.

use std::sync::Arc;

use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{info, warn};

use crate::chapters::report::format_timestamp;
use crate::chapters::summarizer::{extract_json_object, AnalysisError, ChapterAnalyzer};
use crate::clients::gemini::TextGenerator;
use crate::clients::transcript::TranscriptSource;
use crate::clients::youtube::ChannelApi;
use crate::domain::channel::{update_video_metadata, VideoUpdate};
use crate::domain::semantic::{chapter_request, failure, SemanticContext};
use crate::domain::utils::{round2, truncate_chars};
use crate::errors::{ApiError, RegistryError};
use crate::mcp::registry::ToolRegistry;

const PLAN_TRANSCRIPT_CHARS: usize = 2000;
const TAG_TRANSCRIPT_ENTRIES: usize = 20;
const TAG_TRANSCRIPT_CHARS: usize = 1000;
const MAX_TAG_CHARS: usize = 100;
const DEFAULT_MAX_TAGS: u32 = 30;
const TAG_LIMIT: u32 = 500;
const DESCRIPTION_CHAPTER_SECONDS: u32 = 300;
const CHAPTER_RULE_WIDTH: usize = 40;
const SEPARATOR_WIDTH: usize = 20;
const THUMBNAIL_TITLE_CHARS: usize = 20;
const DEFAULT_PLATFORMS: [&str; 3] = ["twitter", "facebook", "linkedin"];

#[derive(Debug, Error)]
pub enum ContentError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Chapters(#[from] AnalysisError),
    #[error("Gemini reply did not contain a usable content plan")]
    UnreadablePlan,
}

#[macros::mcp_tool(
    name = "generate_video_content_automatically",
    description = "Generate a full video description, titles and hashtags from the transcript"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GenerateVideoContentAutomaticallyTool {
    pub video_id: String,
    /// Add a chapter list (default true)
    pub include_chapters: Option<bool>,
    /// Open with the short summary (default true)
    pub include_summary: Option<bool>,
    /// Close with hashtags (default true)
    pub include_hashtags: Option<bool>,
    /// professional, casual, educational or marketing (default professional)
    pub tone: Option<String>,
    /// Extra section headings to leave room for
    pub custom_sections: Option<Vec<String>>,
    /// Overrides GEMINI_API_KEY
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "generate_seo_optimized_tags",
    description = "Generate SEO tags for a video from its transcript"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GenerateSeoOptimizedTagsTool {
    pub video_id: String,
    /// Between 1 and 500 (default 30)
    pub max_tags: Option<u32>,
    /// Ask for trending search terms too (default true)
    pub include_trending: Option<bool>,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "update_youtube_video_metadata",
    description = "Generate title, description and tags for a video and write them to YouTube"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct UpdateYoutubeVideoMetadataTool {
    pub video_id: String,
    /// Replace the title with a generated one (default false)
    pub update_title: Option<bool>,
    /// Replace the description (default true)
    pub update_description: Option<bool>,
    /// Replace the tags (default true)
    pub update_tags: Option<bool>,
    /// Which generated title to use (default 0)
    pub title_index: Option<u32>,
    /// Preview without writing (default false)
    pub dry_run: Option<bool>,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "generate_social_media_content",
    description = "Write posts promoting a video for each social platform"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GenerateSocialMediaContentTool {
    pub video_id: String,
    /// twitter, facebook, linkedin or instagram (default the first three)
    pub platforms: Option<Vec<String>>,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "analyze_video_content_for_optimization",
    description = "Analyze a video's content and suggest SEO and engagement improvements"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct AnalyzeVideoContentForOptimizationTool {
    pub video_id: String,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "generate_youtube_thumbnail_suggestions",
    description = "Suggest thumbnail concepts and text for a video"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GenerateYoutubeThumbnailSuggestionsTool {
    pub video_id: String,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "batch_update_channel_videos",
    description = "Regenerate descriptions and tags for several videos at once"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct BatchUpdateChannelVideosTool {
    pub video_ids: Vec<String>,
    /// Default true
    pub update_descriptions: Option<bool>,
    /// Default true
    pub update_tags: Option<bool>,
    /// Preview without writing (default true)
    pub dry_run: Option<bool>,
    pub api_key: Option<String>,
}

/// Copy the model writes for one video. Missing fields stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentPlan {
    pub title_suggestions: Vec<String>,
    pub short_description: String,
    pub detailed_summary: String,
    pub key_points: Vec<String>,
    pub target_audience: String,
    pub learning_outcomes: Vec<String>,
    pub hashtags: Vec<String>,
    pub related_topics: Vec<String>,
    pub seo_keywords: Vec<String>,
    pub call_to_action: String,
    pub timestamps_summary: String,
}

impl ContentPlan {
    fn headline(&self) -> &str {
        self.title_suggestions
            .first()
            .map_or(self.short_description.as_str(), String::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Tone {
    #[default]
    Professional,
    Casual,
    Educational,
    Marketing,
}

impl Tone {
    /// Unknown names fall back to professional.
    pub fn from_name(name: Option<&str>) -> Self {
        match name.map(|name| name.trim().to_ascii_lowercase()).as_deref() {
            Some("casual") => Self::Casual,
            Some("educational") => Self::Educational,
            Some("marketing") => Self::Marketing,
            _ => Self::Professional,
        }
    }

    fn instruction(self) -> &'static str {
        match self {
            Self::Professional => "professional and trustworthy",
            Self::Casual => "friendly and approachable",
            Self::Educational => "clear and instructive",
            Self::Marketing => "engaging and persuasive",
        }
    }
}

#[derive(Debug, Clone)]
pub struct DescriptionOptions {
    pub include_chapters: bool,
    pub include_summary: bool,
    pub include_hashtags: bool,
    pub tone: Tone,
    pub custom_sections: Vec<String>,
}

impl Default for DescriptionOptions {
    fn default() -> Self {
        Self {
            include_chapters: true,
            include_summary: true,
            include_hashtags: true,
            tone: Tone::default(),
            custom_sections: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedContent {
    pub video_id: String,
    pub description: String,
    pub plan: ContentPlan,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeneratedUpdate {
    pub update_title: bool,
    pub update_description: bool,
    pub update_tags: bool,
    pub title_index: usize,
    pub dry_run: bool,
}

fn plan_prompt(transcript: &str, duration_seconds: f64, tone: Tone) -> String {
    format!(
        "Analyze this YouTube video transcript and write the copy for the video page.\n\n\
         Video length: {duration}\n\
         Tone: {tone}\n\n\
         Transcript (excerpt):\n{excerpt}\n\n\
         Answer with one JSON object containing:\n\
         - \"title_suggestions\": 3 to 5 engaging titles (array)\n\
         - \"short_description\": a one or two sentence hook\n\
         - \"detailed_summary\": a summary of 200 to 300 words\n\
         - \"key_points\": the main points (array)\n\
         - \"target_audience\": who the video is for\n\
         - \"learning_outcomes\": what viewers will learn (array)\n\
         - \"hashtags\": 5 to 10 hashtags starting with # (array)\n\
         - \"related_topics\": related subjects (array)\n\
         - \"seo_keywords\": search keywords (array)\n\
         - \"call_to_action\": a closing call to action\n\
         - \"timestamps_summary\": one line on how the video is structured\n",
        duration = format_timestamp(duration_seconds),
        tone = tone.instruction(),
        excerpt = truncate_chars(transcript, PLAN_TRANSCRIPT_CHARS),
    )
}

fn tags_prompt(transcript: &str, max_tags: u32, include_trending: bool) -> String {
    let trending = if include_trending {
        ", and include currently trending search terms where they fit"
    } else {
        ""
    };
    format!(
        "Generate up to {max_tags} YouTube SEO tags for this video.\n\n\
         Transcript (excerpt):\n{excerpt}\n\n\
         Mix broad and specific keywords{trending}. Keep each tag under {MAX_TAG_CHARS} characters.\n\
         Return the tags only, separated by commas.",
        excerpt = truncate_chars(transcript, TAG_TRANSCRIPT_CHARS),
    )
}

/// The plan in a model reply, which may wrap the JSON in prose or fences.
pub fn parse_plan(reply: &str) -> Option<ContentPlan> {
    let candidate = extract_json_object(reply).unwrap_or_else(|| reply.trim());
    let plan: ContentPlan = serde_json::from_str(candidate).ok()?;
    if plan.detailed_summary.trim().is_empty() && plan.short_description.trim().is_empty() {
        return None;
    }
    Some(plan)
}

/// Comma-separated tags, trimmed and de-duplicated, without over-long ones.
pub fn parse_tags(reply: &str, max_tags: usize) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in reply.split(',').map(|tag| tag.trim().trim_matches('"').trim()) {
        if tag.is_empty() || tag.chars().count() >= MAX_TAG_CHARS || tags.iter().any(|seen| seen == tag) {
            continue;
        }
        tags.push(tag.to_string());
        if tags.len() == max_tags {
            break;
        }
    }
    tags
}

fn has_kana(tag: &str) -> bool {
    tag.chars()
        .any(|c| ('\u{3040}'..='\u{309F}').contains(&c) || ('\u{30A0}'..='\u{30FF}').contains(&c))
}

pub fn tag_analysis(tags: &[String]) -> Value {
    let (japanese, english): (Vec<&String>, Vec<&String>) = tags.iter().partition(|tag| has_kana(tag));
    let total = tags.len();
    let (ratio, average_length) = if total == 0 {
        (0.0, 0.0)
    } else {
        let characters: usize = tags.iter().map(|tag| tag.chars().count()).sum();
        (
            round2(japanese.len() as f64 / total as f64 * 100.0),
            round2(characters as f64 / total as f64),
        )
    };
    json!({
        "japanese_tags": japanese,
        "english_tags": english,
        "japanese_ratio": ratio,
        "average_length": average_length,
    })
}

fn separator() -> String {
    "―".repeat(SEPARATOR_WIDTH)
}

/// Lays the plan out as a description: summary, learning outcomes,
/// chapters, custom sections, call to action and hashtags.
pub fn compose_description(plan: &ContentPlan, chapters: &[String], options: &DescriptionOptions) -> String {
    let mut lines: Vec<String> = Vec::new();

    if options.include_summary && !plan.short_description.is_empty() {
        lines.push(plan.short_description.clone());
        lines.push(String::new());
    }
    if !plan.detailed_summary.is_empty() {
        lines.push(plan.detailed_summary.clone());
        lines.push(String::new());
    }
    if !plan.learning_outcomes.is_empty() {
        lines.push("📚 What you will learn:".to_string());
        lines.extend(plan.learning_outcomes.iter().map(|outcome| format!("• {outcome}")));
        lines.push(String::new());
    }
    if options.include_chapters && !chapters.is_empty() {
        lines.push("📋 Chapters".to_string());
        lines.push("=".repeat(CHAPTER_RULE_WIDTH));
        lines.extend(chapters.iter().cloned());
        lines.push(String::new());
    }
    for section in &options.custom_sections {
        lines.push(format!("[{section}]"));
        lines.push("(add details here)".to_string());
        lines.push(String::new());
    }
    if !plan.call_to_action.is_empty() {
        lines.push(separator());
        lines.push(plan.call_to_action.clone());
        lines.push(String::new());
    }
    if options.include_hashtags && !plan.hashtags.is_empty() {
        lines.push(separator());
        lines.push(plan.hashtags.join(" "));
    }

    lines.join("\n").trim_end().to_string()
}

fn first_n(items: &[String], n: usize) -> Vec<&str> {
    items.iter().take(n).map(String::as_str).collect()
}

/// One post per supported platform, plus the names that were not recognized.
pub fn social_posts(video_id: &str, plan: &ContentPlan, platforms: &[String]) -> (Map<String, Value>, Vec<String>) {
    let link = format!("https://youtu.be/{video_id}");
    let mut posts = Map::new();
    let mut unsupported = Vec::new();

    for platform in platforms {
        let name = platform.trim().to_ascii_lowercase();
        let post = match name.as_str() {
            "twitter" => format!(
                "{}\n\n▶️ {link}\n\n{}",
                plan.short_description,
                first_n(&plan.hashtags, 5).join(" ")
            ),
            "facebook" => format!(
                "{}\n\n{}\n\n{}\n\n🎥 Watch the video: {link}\n\n{}",
                plan.headline(),
                plan.detailed_summary,
                first_n(&plan.key_points, 3)
                    .iter()
                    .map(|point| format!("✅ {point}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                first_n(&plan.hashtags, 8).join(" ")
            ),
            "linkedin" => format!(
                "{}\n\n{}\n\nIn this video:\n{}\n\nFor: {}\n\n▶️ {link}\n\n{}",
                plan.headline(),
                plan.detailed_summary,
                first_n(&plan.learning_outcomes, 3)
                    .iter()
                    .map(|outcome| format!("• {outcome}"))
                    .collect::<Vec<_>>()
                    .join("\n"),
                plan.target_audience,
                first_n(&plan.hashtags, 5).join(" ")
            ),
            "instagram" => format!(
                "{}\n\n{}\n\n🔗 Link in bio\n\n{}",
                plan.headline(),
                plan.short_description,
                plan.hashtags.join(" ")
            ),
            _ => {
                unsupported.push(platform.clone());
                continue;
            }
        };
        posts.insert(name, Value::String(post.trim().to_string()));
    }

    (posts, unsupported)
}

pub fn optimization_suggestions(generated: &GeneratedContent) -> Value {
    let plan = &generated.plan;
    json!({
        "title_optimization": {
            "suggestions": plan.title_suggestions,
            "recommendation": "Keep titles under 60 characters and lead with the search keyword",
        },
        "description_optimization": {
            "length": generated.description.chars().count(),
            "recommendation": "The first 125 characters show in search results",
            "has_chapters": generated.description.contains("📋 Chapters"),
            "call_to_action": plan.call_to_action,
        },
        "hashtag_optimization": {
            "count": plan.hashtags.len(),
            "recommended_count": "10 to 15",
            "hashtags": plan.hashtags,
        },
        "seo_analysis": {
            "keywords": plan.seo_keywords,
            "target_audience": plan.target_audience,
            "related_topics": plan.related_topics,
        },
        "engagement_tips": [
            "Hook viewers within the first 15 seconds",
            "Use chapters to keep long videos watchable",
            "Point to related videos and the subscribe button on the end screen",
            "Reply to comments to keep the conversation going",
        ],
    })
}

pub fn thumbnail_concepts(plan: &ContentPlan) -> Value {
    json!({
        "design_concepts": [
            {
                "concept": "Explainer",
                "description": "Screenshot of the code or tool in the background with the key message on top",
                "colors": ["blue", "white", "gray"],
                "text_suggestions": first_n(&plan.key_points, 2),
            },
            {
                "concept": "Presenter",
                "description": "The speaker in front with a short, curiosity-raising caption",
                "colors": ["warm tones", "high contrast"],
                "text_suggestions": ["Did you know this?", "Must watch!"],
            },
            {
                "concept": "Before and after",
                "description": "Show the change or result side by side",
                "colors": ["green", "red", "contrasting pair"],
                "text_suggestions": ["Before → After", "Old → New"],
            },
        ],
        "text_recommendations": {
            "main_title": plan.short_description.chars().take(THUMBNAIL_TITLE_CHARS).collect::<String>(),
            "subtitle_options": first_n(&plan.key_points, 3),
            "keywords_for_text": first_n(&plan.seo_keywords, 5),
        },
        "visual_elements": {
            "recommended_colors": ["#FF4444", "#4444FF", "#44FF44"],
            "font_suggestions": ["bold", "clean sans-serif"],
            "layout_tips": [
                "Main text in the top left or top right corner",
                "Place people to one side",
                "Use a background that shows what the video is about",
            ],
        },
    })
}

pub struct ContentGenerator<'a> {
    transcripts: &'a dyn TranscriptSource,
    generator: &'a dyn TextGenerator,
}

impl<'a> ContentGenerator<'a> {
    pub fn new(transcripts: &'a dyn TranscriptSource, generator: &'a dyn TextGenerator) -> Self {
        Self {
            transcripts,
            generator,
        }
    }

    /// Joined text of the first `entries` transcript entries and the total length.
    async fn transcript_text(&self, video_id: &str, entries: usize) -> Result<(String, f64), ContentError> {
        if video_id.is_empty() {
            return Err(ApiError::validation("video_id must not be empty").into());
        }
        let transcript = self
            .transcripts
            .fetch(video_id)
            .await
            .map_err(AnalysisError::Transcript)?;
        if transcript.is_empty() {
            return Err(AnalysisError::EmptyTranscript {
                video_id: video_id.to_string(),
            }
            .into());
        }

        let duration = transcript.iter().map(|entry| entry.end()).fold(0.0, f64::max);
        let text = transcript
            .iter()
            .take(entries)
            .map(|entry| entry.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Ok((text, duration))
    }

    pub async fn content_plan(&self, video_id: &str, tone: Tone) -> Result<ContentPlan, ContentError> {
        let (text, duration) = self.transcript_text(video_id, usize::MAX).await?;
        let reply = self.generator.generate(&plan_prompt(&text, duration, tone)).await?;
        parse_plan(&reply).ok_or(ContentError::UnreadablePlan)
    }

    pub async fn generate_description(
        &self,
        video_id: &str,
        options: &DescriptionOptions,
    ) -> Result<GeneratedContent, ContentError> {
        let video_id = video_id.trim();
        let plan = self.content_plan(video_id, options.tone).await?;

        let chapters = if options.include_chapters {
            let analyzer = ChapterAnalyzer::new(self.transcripts, self.generator);
            let request = chapter_request(video_id.to_string(), Some(DESCRIPTION_CHAPTER_SECONDS), None, None);
            analyzer
                .generate_semantic_chapters(&request)
                .await?
                .chapters
                .iter()
                .map(|chapter| format!("{} {}", chapter.start_timestamp, chapter.analysis.title))
                .collect()
        } else {
            Vec::new()
        };

        Ok(GeneratedContent {
            video_id: video_id.to_string(),
            description: compose_description(&plan, &chapters, options),
            plan,
        })
    }

    pub async fn optimized_tags(
        &self,
        video_id: &str,
        max_tags: u32,
        include_trending: bool,
    ) -> Result<Vec<String>, ContentError> {
        if !(1..=TAG_LIMIT).contains(&max_tags) {
            return Err(ApiError::validation(format!("max_tags must be between 1 and {TAG_LIMIT}")).into());
        }
        let (text, _) = self.transcript_text(video_id.trim(), TAG_TRANSCRIPT_ENTRIES).await?;
        let reply = self
            .generator
            .generate(&tags_prompt(&text, max_tags, include_trending))
            .await?;
        Ok(parse_tags(&reply, max_tags as usize))
    }
}

fn preview_values(update: &VideoUpdate) -> Map<String, Value> {
    let mut values = Map::new();
    if let Some(title) = &update.title {
        values.insert("title".to_string(), json!(title));
    }
    if let Some(description) = &update.description {
        values.insert("description".to_string(), json!(description));
    }
    if let Some(tags) = &update.tags {
        values.insert("tags".to_string(), json!(tags));
    }
    values
}

/// Generates fresh copy for a video and, unless `dry_run`, writes it back.
pub async fn update_with_generated_content(
    content: &ContentGenerator<'_>,
    api: &dyn ChannelApi,
    video_id: &str,
    options: GeneratedUpdate,
) -> Result<Value, ContentError> {
    if !(options.update_title || options.update_description || options.update_tags) {
        return Err(ApiError::validation(
            "Nothing to update: enable update_title, update_description or update_tags",
        )
        .into());
    }

    let generated = content
        .generate_description(video_id, &DescriptionOptions::default())
        .await?;
    let mut update = VideoUpdate {
        video_id: generated.video_id.clone(),
        ..VideoUpdate::default()
    };
    if options.update_title {
        let title = generated.plan.title_suggestions.get(options.title_index).ok_or_else(|| {
            ApiError::validation(format!(
                "title_index {} is out of range ({} titles generated)",
                options.title_index,
                generated.plan.title_suggestions.len()
            ))
        })?;
        update.title = Some(title.clone());
    }
    if options.update_description {
        update.description = Some(generated.description.clone());
    }
    if options.update_tags {
        update.tags = Some(content.optimized_tags(video_id, DEFAULT_MAX_TAGS, true).await?);
    }

    let values = preview_values(&update);
    if options.dry_run {
        return Ok(json!({
            "success": true,
            "video_id": generated.video_id,
            "dry_run": true,
            "preview": values,
            "message": "Preview only; the video was not changed",
        }));
    }

    update_video_metadata(api, &update).await?;
    info!(video_id = %generated.video_id, fields = values.len(), "generated metadata published");
    Ok(json!({
        "success": true,
        "video_id": generated.video_id,
        "dry_run": false,
        "updated_fields": values.keys().cloned().collect::<Vec<_>>(),
        "new_values": values,
        "message": "Video metadata updated with generated content",
    }))
}

pub async fn generated_content(content: &ContentGenerator<'_>, video_id: &str, options: &DescriptionOptions) -> Value {
    match content.generate_description(video_id, options).await {
        Ok(generated) => {
            let plan = &generated.plan;
            json!({
                "success": true,
                "video_id": generated.video_id,
                "description": generated.description,
                "title_suggestions": plan.title_suggestions,
                "hashtags": plan.hashtags,
                "seo_keywords": plan.seo_keywords,
                "target_audience": plan.target_audience,
                "character_count": generated.description.chars().count(),
                "content_data": plan,
                "message": "Generated the video description",
            })
        }
        Err(err) => failure(err, "Content generation"),
    }
}

pub async fn seo_tags(content: &ContentGenerator<'_>, video_id: &str, max_tags: u32, include_trending: bool) -> Value {
    match content.optimized_tags(video_id, max_tags, include_trending).await {
        Ok(tags) => json!({
            "success": true,
            "video_id": video_id.trim(),
            "tags": tags,
            "tag_count": tags.len(),
            "tag_analysis": tag_analysis(&tags),
            "message": format!("Generated {} SEO tags", tags.len()),
        }),
        Err(err) => failure(err, "Tag generation"),
    }
}

pub async fn generated_metadata_update(
    content: &ContentGenerator<'_>,
    api: &dyn ChannelApi,
    video_id: &str,
    options: GeneratedUpdate,
) -> Value {
    update_with_generated_content(content, api, video_id, options)
        .await
        .unwrap_or_else(|err| failure(err, "Metadata update"))
}

pub async fn social_media_content(content: &ContentGenerator<'_>, video_id: &str, platforms: &[String]) -> Value {
    let video_id = video_id.trim();
    match content.content_plan(video_id, Tone::Marketing).await {
        Ok(plan) => {
            let (posts, unsupported) = social_posts(video_id, &plan, platforms);
            json!({
                "success": true,
                "video_id": video_id,
                "message": format!("Generated posts for {} platforms", posts.len()),
                "posts": posts,
                "platforms": platforms,
                "unsupported_platforms": unsupported,
            })
        }
        Err(err) => failure(err, "Social post generation"),
    }
}

pub async fn content_optimization(content: &ContentGenerator<'_>, video_id: &str) -> Value {
    match content
        .generate_description(video_id, &DescriptionOptions::default())
        .await
    {
        Ok(generated) => json!({
            "success": true,
            "video_id": generated.video_id,
            "content_analysis": generated.plan,
            "optimization_suggestions": optimization_suggestions(&generated),
            "message": "Content optimization analysis complete",
        }),
        Err(err) => failure(err, "Optimization analysis"),
    }
}

pub async fn thumbnail_suggestions(content: &ContentGenerator<'_>, video_id: &str) -> Value {
    let video_id = video_id.trim();
    match content.content_plan(video_id, Tone::default()).await {
        Ok(plan) => json!({
            "success": true,
            "video_id": video_id,
            "thumbnail_suggestions": thumbnail_concepts(&plan),
            "message": "Generated thumbnail suggestions",
        }),
        Err(err) => failure(err, "Thumbnail suggestion"),
    }
}

/// Updates each video on its own; titles are never touched in bulk.
pub async fn batch_update_channel_videos(
    content: &ContentGenerator<'_>,
    api: &dyn ChannelApi,
    video_ids: &[String],
    update_descriptions: bool,
    update_tags: bool,
    dry_run: bool,
) -> Value {
    if video_ids.is_empty() {
        return failure(ApiError::validation("At least one video ID is required"), "Batch update");
    }

    let options = GeneratedUpdate {
        update_title: false,
        update_description: update_descriptions,
        update_tags,
        title_index: 0,
        dry_run,
    };
    let mut results = Map::new();
    let mut succeeded = 0;

    for video_id in video_ids {
        let entry = match update_with_generated_content(content, api, video_id, options).await {
            Ok(result) => {
                succeeded += 1;
                result
            }
            Err(err) => {
                warn!(video_id = %video_id, error = %err, "batch update entry failed");
                json!({"success": false, "error": err.to_string()})
            }
        };
        results.insert(video_id.clone(), entry);
    }

    let verb = if dry_run { "previewed" } else { "updated" };
    json!({
        "success": true,
        "total_videos": video_ids.len(),
        "successful_updates": succeeded,
        "failed_updates": video_ids.len() - succeeded,
        "dry_run": dry_run,
        "detailed_results": results,
        "message": format!("{succeeded}/{} videos {verb}", video_ids.len()),
    })
}

pub fn register(
    registry: &mut ToolRegistry,
    context: Arc<SemanticContext>,
    channel: Arc<dyn ChannelApi>,
) -> Result<(), RegistryError> {
    let ctx = context.clone();
    registry.register_fn(
        GenerateVideoContentAutomaticallyTool::tool(),
        move |params: GenerateVideoContentAutomaticallyTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Content generation")),
                };
                let options = DescriptionOptions {
                    include_chapters: params.include_chapters.unwrap_or(true),
                    include_summary: params.include_summary.unwrap_or(true),
                    include_hashtags: params.include_hashtags.unwrap_or(true),
                    tone: Tone::from_name(params.tone.as_deref()),
                    custom_sections: params.custom_sections.unwrap_or_default(),
                };
                let content = ContentGenerator::new(ctx.transcripts(), &generator);
                Ok(generated_content(&content, &params.video_id, &options).await)
            }
        },
    )?;

    let ctx = context.clone();
    registry.register_fn(
        GenerateSeoOptimizedTagsTool::tool(),
        move |params: GenerateSeoOptimizedTagsTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Tag generation")),
                };
                let content = ContentGenerator::new(ctx.transcripts(), &generator);
                Ok(seo_tags(
                    &content,
                    &params.video_id,
                    params.max_tags.unwrap_or(DEFAULT_MAX_TAGS),
                    params.include_trending.unwrap_or(true),
                )
                .await)
            }
        },
    )?;

    let (ctx, api) = (context.clone(), channel.clone());
    registry.register_fn(
        UpdateYoutubeVideoMetadataTool::tool(),
        move |params: UpdateYoutubeVideoMetadataTool| {
            let (ctx, api) = (ctx.clone(), api.clone());
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Metadata update")),
                };
                let options = GeneratedUpdate {
                    update_title: params.update_title.unwrap_or(false),
                    update_description: params.update_description.unwrap_or(true),
                    update_tags: params.update_tags.unwrap_or(true),
                    title_index: params.title_index.unwrap_or(0) as usize,
                    dry_run: params.dry_run.unwrap_or(false),
                };
                let content = ContentGenerator::new(ctx.transcripts(), &generator);
                Ok(generated_metadata_update(&content, api.as_ref(), &params.video_id, options).await)
            }
        },
    )?;

    let ctx = context.clone();
    registry.register_fn(
        GenerateSocialMediaContentTool::tool(),
        move |params: GenerateSocialMediaContentTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Social post generation")),
                };
                let platforms = params
                    .platforms
                    .unwrap_or_else(|| DEFAULT_PLATFORMS.iter().map(|name| name.to_string()).collect());
                let content = ContentGenerator::new(ctx.transcripts(), &generator);
                Ok(social_media_content(&content, &params.video_id, &platforms).await)
            }
        },
    )?;

    let ctx = context.clone();
    registry.register_fn(
        AnalyzeVideoContentForOptimizationTool::tool(),
        move |params: AnalyzeVideoContentForOptimizationTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Optimization analysis")),
                };
                let content = ContentGenerator::new(ctx.transcripts(), &generator);
                Ok(content_optimization(&content, &params.video_id).await)
            }
        },
    )?;

    let ctx = context.clone();
    registry.register_fn(
        GenerateYoutubeThumbnailSuggestionsTool::tool(),
        move |params: GenerateYoutubeThumbnailSuggestionsTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Thumbnail suggestion")),
                };
                let content = ContentGenerator::new(ctx.transcripts(), &generator);
                Ok(thumbnail_suggestions(&content, &params.video_id).await)
            }
        },
    )?;

    let (ctx, api) = (context, channel);
    registry.register_fn(
        BatchUpdateChannelVideosTool::tool(),
        move |params: BatchUpdateChannelVideosTool| {
            let (ctx, api) = (ctx.clone(), api.clone());
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Batch update")),
                };
                let content = ContentGenerator::new(ctx.transcripts(), &generator);
                Ok(batch_update_channel_videos(
                    &content,
                    api.as_ref(),
                    &params.video_ids,
                    params.update_descriptions.unwrap_or(true),
                    params.update_tags.unwrap_or(true),
                    params.dry_run.unwrap_or(true),
                )
                .await)
            }
        },
    )
}
