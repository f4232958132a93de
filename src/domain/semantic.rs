//! Transcript analysis tools backed by Gemini.
//!
//! Every tool answers `{"success": true, …}` or
//! `{"success": false, "error": …, "message": …}`; none of them fail the
//! JSON-RPC call.

use std::collections::BTreeSet;
use std::fmt::Display;
use std::sync::Arc;

use rust_mcp_sdk::macros;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::chapters::report::{chapter_timestamps, format_for_youtube_description, key_topics};
use crate::chapters::segmenter::{Granularity, DEFAULT_SEGMENT_DURATION};
use crate::chapters::summarizer::{ChapterAnalyzer, ChapterRequest};
use crate::clients::gemini::{GeminiClient, TextGenerator};
use crate::clients::transcript::TranscriptSource;
use crate::domain::utils::truncate_chars;
use crate::errors::{ApiError, RegistryError};
use crate::mcp::registry::ToolRegistry;

const KEY_TOPIC_SEGMENT_DURATION: u32 = 600;
const STATUS_PROMPT: &str = "Hello, this is an API test.";
const STATUS_PREVIEW_CHARS: usize = 100;
const MISSING_KEY: &str = "GEMINI_API_KEY environment variable is required";

#[macros::mcp_tool(
    name = "analyze_video_transcript_semantic",
    description = "Analyze a YouTube video transcript with Gemini and generate meaningful chapters"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct AnalyzeVideoTranscriptSemanticTool {
    pub video_id: String,
    /// Segment length in seconds (default 300)
    pub segment_duration: Option<u32>,
    /// fine, medium, coarse or custom (default medium)
    pub granularity: Option<String>,
    /// Extra analysis instruction; required for the custom granularity
    pub custom_prompt: Option<String>,
    /// Overrides GEMINI_API_KEY
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "generate_youtube_description_with_chapters",
    description = "Generate a table of contents for a YouTube description from semantic analysis"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GenerateYoutubeDescriptionWithChaptersTool {
    pub video_id: String,
    pub segment_duration: Option<u32>,
    pub granularity: Option<String>,
    pub custom_prompt: Option<String>,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "generate_chapter_timestamps_only",
    description = "Generate only timestamps and titles for YouTube chapters"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct GenerateChapterTimestampsOnlyTool {
    pub video_id: String,
    pub segment_duration: Option<u32>,
    pub granularity: Option<String>,
    pub custom_prompt: Option<String>,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "extract_video_key_topics",
    description = "Extract the main topics and key points of a video"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ExtractVideoKeyTopicsTool {
    pub video_id: String,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "batch_analyze_channel_videos",
    description = "Run semantic analysis over several videos at once"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct BatchAnalyzeChannelVideosTool {
    pub video_ids: Vec<String>,
    pub api_key: Option<String>,
}

#[macros::mcp_tool(
    name = "check_gemini_api_status",
    description = "Check that the Gemini API is reachable with the configured key"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct CheckGeminiApiStatusTool {
    pub api_key: Option<String>,
}

/// What the semantic tools need besides their arguments.
pub struct SemanticContext {
    http: reqwest::Client,
    api_key: Option<String>,
    model: String,
    transcripts: Arc<dyn TranscriptSource>,
}

impl SemanticContext {
    pub fn new(
        http: reqwest::Client,
        api_key: Option<String>,
        model: impl Into<String>,
        transcripts: Arc<dyn TranscriptSource>,
    ) -> Self {
        Self {
            http,
            api_key,
            model: model.into(),
            transcripts,
        }
    }

    pub fn transcripts(&self) -> &dyn TranscriptSource {
        self.transcripts.as_ref()
    }

    /// A per-call client; a non-blank `override_key` beats the configured key.
    pub fn generator(&self, override_key: Option<String>) -> Result<GeminiClient, ApiError> {
        let key = override_key
            .filter(|key| !key.trim().is_empty())
            .or_else(|| self.api_key.clone())
            .ok_or(ApiError::missing_credential(MISSING_KEY))?;
        Ok(GeminiClient::new(self.http.clone(), key, self.model.clone()))
    }
}

pub fn failure(err: impl Display, action: &str) -> Value {
    warn!(action, error = %err, "semantic tool failed");
    json!({
        "success": false,
        "error": err.to_string(),
        "message": format!("{action} failed: {err}"),
    })
}

pub fn chapter_request(
    video_id: String,
    segment_duration: Option<u32>,
    granularity: Option<String>,
    custom_prompt: Option<String>,
) -> ChapterRequest {
    ChapterRequest {
        video_id,
        segment_duration: segment_duration.unwrap_or(DEFAULT_SEGMENT_DURATION),
        granularity: granularity.unwrap_or_else(|| Granularity::default().to_string()),
        custom_prompt,
    }
}

pub async fn analyze_transcript(analyzer: &ChapterAnalyzer<'_>, request: &ChapterRequest) -> Value {
    match analyzer.generate_semantic_chapters(request).await {
        Ok(report) => json!({
            "success": true,
            "video_id": report.video_id,
            "message": format!("Generated {} semantic chapters", report.total_chapters),
            "analysis": report,
        }),
        Err(err) => failure(err, "Semantic analysis"),
    }
}

pub async fn description_with_chapters(analyzer: &ChapterAnalyzer<'_>, request: &ChapterRequest) -> Value {
    match analyzer.generate_semantic_chapters(request).await {
        Ok(report) => json!({
            "success": true,
            "video_id": report.video_id,
            "description_text": format_for_youtube_description(&report),
            "chapters_count": report.total_chapters,
            "duration": report.total_duration_formatted,
            "message": "Generated a table of contents for the video description",
        }),
        Err(err) => failure(err, "Description generation"),
    }
}

pub async fn timestamps_only(analyzer: &ChapterAnalyzer<'_>, request: &ChapterRequest) -> Value {
    match analyzer.generate_semantic_chapters(request).await {
        Ok(report) => {
            let chapters: Vec<Value> = report
                .chapters
                .iter()
                .map(|chapter| {
                    json!({
                        "timestamp": chapter.start_timestamp,
                        "title": chapter.analysis.title,
                        "category": chapter.analysis.topic_category,
                    })
                })
                .collect();
            json!({
                "success": true,
                "video_id": report.video_id,
                "chapter_timestamps": chapter_timestamps(&report),
                "chapters": chapters,
                "total_chapters": report.total_chapters,
                "message": "Generated timestamps for YouTube chapters",
            })
        }
        Err(err) => failure(err, "Chapter generation"),
    }
}

pub async fn video_key_topics(analyzer: &ChapterAnalyzer<'_>, video_id: String) -> Value {
    let request = chapter_request(video_id, Some(KEY_TOPIC_SEGMENT_DURATION), None, None);
    match analyzer.generate_semantic_chapters(&request).await {
        Ok(report) => {
            let topics = key_topics(&report);
            json!({
                "success": true,
                "video_id": report.video_id,
                "duration": report.total_duration_formatted,
                "topics_by_category": topics.topics_by_category,
                "top_keywords": topics.top_keywords,
                "technical_levels": topics.technical_levels,
                "total_chapters": report.total_chapters,
                "message": "Extracted key topics and key points",
            })
        }
        Err(err) => failure(err, "Topic extraction"),
    }
}

/// Analyzes each video on its own; one failure is recorded and skipped.
pub async fn batch_analyze(analyzer: &ChapterAnalyzer<'_>, video_ids: &[String]) -> Value {
    let mut results = Map::new();
    let mut succeeded = 0;

    for video_id in video_ids {
        let request = chapter_request(video_id.clone(), None, None, None);
        let entry = match analyzer.generate_semantic_chapters(&request).await {
            Ok(report) => {
                succeeded += 1;
                let topics: BTreeSet<&str> = report
                    .chapters
                    .iter()
                    .map(|chapter| chapter.analysis.topic_category.as_str())
                    .collect();
                let levels: BTreeSet<&str> = report
                    .chapters
                    .iter()
                    .map(|chapter| chapter.analysis.technical_level.as_str())
                    .collect();
                json!({
                    "success": true,
                    "duration": report.total_duration_formatted,
                    "chapters_count": report.total_chapters,
                    "topics": topics,
                    "tech_levels": levels,
                })
            }
            Err(err) => {
                warn!(video_id = %video_id, error = %err, "batch analysis entry failed");
                json!({"success": false, "error": err.to_string()})
            }
        };
        results.insert(video_id.clone(), entry);
    }

    json!({
        "success": true,
        "total_videos": video_ids.len(),
        "successful_analyses": succeeded,
        "results": results,
        "message": format!("Analyzed {succeeded}/{} videos", video_ids.len()),
    })
}

pub async fn gemini_status(generator: &dyn TextGenerator) -> Value {
    match generator.generate(STATUS_PROMPT).await {
        Ok(text) => json!({
            "success": true,
            "api_key_status": "valid",
            "model": generator.model(),
            "test_response": truncate_chars(&text, STATUS_PREVIEW_CHARS),
            "message": "Gemini API is working",
        }),
        Err(err) => failure(err, "Gemini API check"),
    }
}

pub fn register(registry: &mut ToolRegistry, context: Arc<SemanticContext>) -> Result<(), RegistryError> {
    let ctx = context.clone();
    registry.register_fn(
        AnalyzeVideoTranscriptSemanticTool::tool(),
        move |params: AnalyzeVideoTranscriptSemanticTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Semantic analysis")),
                };
                let request = chapter_request(
                    params.video_id,
                    params.segment_duration,
                    params.granularity,
                    params.custom_prompt,
                );
                let analyzer = ChapterAnalyzer::new(ctx.transcripts.as_ref(), &generator);
                Ok(analyze_transcript(&analyzer, &request).await)
            }
        },
    )?;

    let ctx = context.clone();
    registry.register_fn(
        GenerateYoutubeDescriptionWithChaptersTool::tool(),
        move |params: GenerateYoutubeDescriptionWithChaptersTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Description generation")),
                };
                let request = chapter_request(
                    params.video_id,
                    params.segment_duration,
                    params.granularity,
                    params.custom_prompt,
                );
                let analyzer = ChapterAnalyzer::new(ctx.transcripts.as_ref(), &generator);
                Ok(description_with_chapters(&analyzer, &request).await)
            }
        },
    )?;

    let ctx = context.clone();
    registry.register_fn(
        GenerateChapterTimestampsOnlyTool::tool(),
        move |params: GenerateChapterTimestampsOnlyTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Chapter generation")),
                };
                let request = chapter_request(
                    params.video_id,
                    params.segment_duration,
                    params.granularity,
                    params.custom_prompt,
                );
                let analyzer = ChapterAnalyzer::new(ctx.transcripts.as_ref(), &generator);
                Ok(timestamps_only(&analyzer, &request).await)
            }
        },
    )?;

    let ctx = context.clone();
    registry.register_fn(ExtractVideoKeyTopicsTool::tool(), move |params: ExtractVideoKeyTopicsTool| {
        let ctx = ctx.clone();
        async move {
            let generator = match ctx.generator(params.api_key) {
                Ok(generator) => generator,
                Err(err) => return Ok(failure(err, "Topic extraction")),
            };
            let analyzer = ChapterAnalyzer::new(ctx.transcripts.as_ref(), &generator);
            Ok(video_key_topics(&analyzer, params.video_id).await)
        }
    })?;

    let ctx = context.clone();
    registry.register_fn(
        BatchAnalyzeChannelVideosTool::tool(),
        move |params: BatchAnalyzeChannelVideosTool| {
            let ctx = ctx.clone();
            async move {
                let generator = match ctx.generator(params.api_key) {
                    Ok(generator) => generator,
                    Err(err) => return Ok(failure(err, "Batch analysis")),
                };
                let analyzer = ChapterAnalyzer::new(ctx.transcripts.as_ref(), &generator);
                Ok(batch_analyze(&analyzer, &params.video_ids).await)
            }
        },
    )?;

    let ctx = context;
    registry.register_fn(CheckGeminiApiStatusTool::tool(), move |params: CheckGeminiApiStatusTool| {
        let ctx = ctx.clone();
        async move {
            let generator = match ctx.generator(params.api_key) {
                Ok(generator) => generator,
                Err(err) => return Ok(failure(err, "Gemini API check")),
            };
            Ok(gemini_status(&generator).await)
        }
    })
}
