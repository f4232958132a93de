use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::chapters::report::{format_timestamp, Chapter, ChapterReport};
use crate::chapters::segmenter::{
    resolve_segment_duration, segment_transcript, Granularity, Segment,
};
use crate::clients::{gemini::TextGenerator, transcript::TranscriptSource};
use crate::errors::ApiError;

pub const FALLBACK_CATEGORY: &str = "Other";
pub const FALLBACK_TITLE: &str = "Section";
pub const FALLBACK_TECHNICAL_LEVEL: &str = "general";
const FALLBACK_SUMMARY_CHARS: usize = 50;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("{0}")]
    InvalidRequest(ApiError),
    #[error("failed to fetch transcript: {0}")]
    Transcript(ApiError),
    #[error("transcript for video {video_id} is empty")]
    EmptyTranscript { video_id: String },
}

/// The model's verdict on one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentAnalysis {
    #[serde(default = "default_category")]
    pub topic_category: String,
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default = "default_technical_level")]
    pub technical_level: String,
    #[serde(default)]
    pub contains_demo: bool,
    #[serde(default)]
    pub contains_code: bool,
}

fn default_category() -> String {
    FALLBACK_CATEGORY.to_string()
}

fn default_title() -> String {
    FALLBACK_TITLE.to_string()
}

fn default_technical_level() -> String {
    FALLBACK_TECHNICAL_LEVEL.to_string()
}

impl SegmentAnalysis {
    /// Stand-in used when the model fails or answers with something unparseable.
    pub fn fallback(segment_text: &str) -> Self {
        let summary = if segment_text.chars().count() > FALLBACK_SUMMARY_CHARS {
            let head: String = segment_text.chars().take(FALLBACK_SUMMARY_CHARS).collect();
            format!("{head}...")
        } else {
            segment_text.to_string()
        };

        Self {
            topic_category: default_category(),
            title: default_title(),
            summary,
            key_points: Vec::new(),
            technical_level: default_technical_level(),
            contains_demo: false,
            contains_code: false,
        }
    }
}

struct PromptTargets {
    title_chars: u32,
    summary_chars: u32,
    key_points: u32,
    instruction: &'static str,
}

fn prompt_targets(granularity: Granularity) -> PromptTargets {
    match granularity {
        Granularity::Fine => PromptTargets {
            title_chars: 20,
            summary_chars: 100,
            key_points: 5,
            instruction: "Analyze in fine detail and capture even small changes of topic.",
        },
        Granularity::Coarse => PromptTargets {
            title_chars: 10,
            summary_chars: 30,
            key_points: 2,
            instruction: "Extract only the most important subject.",
        },
        Granularity::Medium | Granularity::Custom => PromptTargets {
            title_chars: 15,
            summary_chars: 50,
            key_points: 3,
            instruction: "Extract the main topics and concepts.",
        },
    }
}

pub fn build_prompt(segment: &Segment, granularity: Granularity, custom_prompt: Option<&str>) -> String {
    let range = format!(
        "{} - {}",
        format_timestamp(segment.start_time),
        format_timestamp(segment.end_time)
    );

    if let Some(instruction) = custom_prompt.filter(|prompt| !prompt.trim().is_empty()) {
        return format!(
            "Analyze the following part of a YouTube video transcript.\n\n\
             Transcript:\n\"{text}\"\n\n\
             Time: {range}\n\n\
             {instruction}\n\n\
             Answer in JSON only, with these fields:\n\
             - topic_category: content category\n\
             - title: title\n\
             - summary: summary\n\
             - key_points: important points (array)\n\
             - technical_level: technical level\n\
             - contains_demo: whether a demo is shown\n\
             - contains_code: whether code is explained\n",
            text = segment.text,
        );
    }

    let targets = prompt_targets(granularity);
    format!(
        "The following is the transcript of part of a YouTube video. {instruction}\n\
         Return the information below as JSON.\n\n\
         Transcript:\n\"{text}\"\n\n\
         Time: {range}\n\n\
         Fields:\n\
         1. topic_category: the content category of this segment (e.g. \"Introduction\", \"Technical explanation\", \"Demo\", \"Implementation\", \"Q&A\", \"Summary\")\n\
         2. title: a short title suitable for a YouTube chapter list (at most {title} characters)\n\
         3. summary: a summary of the content (at most {summary} characters)\n\
         4. key_points: important points (array, at most {key_points} items)\n\
         5. technical_level: one of \"beginner\", \"intermediate\", \"advanced\", \"general\"\n\
         6. contains_demo: whether a demonstration is included (true/false)\n\
         7. contains_code: whether code is explained (true/false)\n\n\
         Respond with JSON only. No explanations.\n\n\
         Example:\n\
         {{\n  \"topic_category\": \"Technical explanation\",\n  \"title\": \"AWS Lambda basics\",\n  \"summary\": \"Explains the basic concepts of serverless functions\",\n  \"key_points\": [\"serverless\", \"Lambda functions\", \"runtime\"],\n  \"technical_level\": \"beginner\",\n  \"contains_demo\": false,\n  \"contains_code\": true\n}}\n",
        instruction = targets.instruction,
        text = segment.text,
        title = targets.title_chars,
        summary = targets.summary_chars,
        key_points = targets.key_points,
    )
}

/// Finds the first balanced `{…}` in free-form model output.
///
/// Falls back to the span between the first `{` and the last `}` when no
/// balanced object is found.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let begin = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[begin..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[begin..=begin + offset]);
                }
            }
            _ => {}
        }
    }

    let end = text.rfind('}')?;
    (end > begin).then(|| &text[begin..=end])
}

pub fn parse_analysis(text: &str) -> Option<SegmentAnalysis> {
    let candidate = extract_json_object(text).unwrap_or(text.trim());
    let value: Value = serde_json::from_str(candidate).ok()?;
    if !value.is_object() {
        return None;
    }
    serde_json::from_value(value).ok()
}

#[derive(Debug, Clone, Default)]
pub struct ChapterRequest {
    pub video_id: String,
    pub segment_duration: u32,
    pub granularity: String,
    pub custom_prompt: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct AnalysisPlan {
    granularity: Granularity,
    segment_duration: u32,
}

impl ChapterRequest {
    fn plan(&self) -> Result<AnalysisPlan, ApiError> {
        let video_id = self.video_id.trim();
        if video_id.is_empty() {
            return Err(ApiError::validation("video_id must not be empty"));
        }
        let granularity: Granularity = self.granularity.parse()?;
        let segment_duration = resolve_segment_duration(
            granularity,
            self.segment_duration,
            self.custom_prompt.as_deref(),
        )?;
        Ok(AnalysisPlan {
            granularity,
            segment_duration,
        })
    }

    fn custom_prompt(&self) -> Option<&str> {
        self.custom_prompt
            .as_deref()
            .filter(|prompt| !prompt.trim().is_empty())
    }
}

/// Runs transcript fetch, segmentation and per-segment summarization.
pub struct ChapterAnalyzer<'a> {
    transcripts: &'a dyn TranscriptSource,
    generator: &'a dyn TextGenerator,
}

impl<'a> ChapterAnalyzer<'a> {
    pub fn new(transcripts: &'a dyn TranscriptSource, generator: &'a dyn TextGenerator) -> Self {
        Self {
            transcripts,
            generator,
        }
    }

    pub async fn analyze_segment(
        &self,
        segment: &Segment,
        granularity: Granularity,
        custom_prompt: Option<&str>,
    ) -> SegmentAnalysis {
        let prompt = build_prompt(segment, granularity, custom_prompt);
        match self.generator.generate(&prompt).await {
            Ok(text) => parse_analysis(&text).unwrap_or_else(|| {
                warn!(start = segment.start_time, "model output is not a JSON object, using fallback");
                SegmentAnalysis::fallback(&segment.text)
            }),
            Err(err) => {
                warn!(start = segment.start_time, error = %err, "segment analysis failed, using fallback");
                SegmentAnalysis::fallback(&segment.text)
            }
        }
    }

    pub async fn generate_semantic_chapters(
        &self,
        request: &ChapterRequest,
    ) -> Result<ChapterReport, AnalysisError> {
        let plan = request.plan().map_err(AnalysisError::InvalidRequest)?;
        let video_id = request.video_id.trim();
        info!(
            video_id = %video_id,
            granularity = %plan.granularity,
            segment_duration = plan.segment_duration,
            model = %self.generator.model(),
            "semantic analysis started"
        );

        let transcript = self
            .transcripts
            .fetch(video_id)
            .await
            .map_err(AnalysisError::Transcript)?;
        let Some(last) = transcript.last() else {
            return Err(AnalysisError::EmptyTranscript {
                video_id: video_id.to_string(),
            });
        };
        let total_duration = last.end();

        let segments = segment_transcript(&transcript, plan.segment_duration);
        info!(entries = transcript.len(), segments = segments.len(), "transcript segmented");

        let mut chapters = Vec::with_capacity(segments.len());
        for (position, segment) in segments.iter().enumerate() {
            let analysis = self
                .analyze_segment(segment, plan.granularity, request.custom_prompt())
                .await;
            let chapter = Chapter::new(position + 1, segment, analysis);
            info!(
                segment = chapter.index,
                total = segments.len(),
                title = %chapter.analysis.title,
                category = %chapter.analysis.topic_category,
                "segment analyzed"
            );
            chapters.push(chapter);
        }

        Ok(ChapterReport::new(
            video_id,
            total_duration,
            plan.segment_duration,
            plan.granularity,
            request.custom_prompt.is_some(),
            chapters,
        ))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::chapters::segmenter::TranscriptEntry;

    struct FixedTranscript(Vec<TranscriptEntry>);

    #[async_trait]
    impl TranscriptSource for FixedTranscript {
        async fn fetch(&self, _video_id: &str) -> Result<Vec<TranscriptEntry>, ApiError> {
            Ok(self.0.clone())
        }
    }

    struct UnreachableTranscript;

    #[async_trait]
    impl TranscriptSource for UnreachableTranscript {
        async fn fetch(&self, _video_id: &str) -> Result<Vec<TranscriptEntry>, ApiError> {
            panic!("transcript must not be fetched");
        }
    }

    /// Replies in turn; an `Err` entry simulates an API failure.
    struct ScriptedGenerator {
        replies: Vec<Result<&'static str, &'static str>>,
        calls: AtomicUsize,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<&'static str, &'static str>>) -> Self {
            Self {
                replies,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for ScriptedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String, ApiError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            match self.replies.get(call).copied().unwrap_or(Err("exhausted")) {
                Ok(text) => Ok(text.to_string()),
                Err(message) => Err(ApiError::upstream("Gemini", message)),
            }
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    fn entry(start: f64, duration: f64, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            start,
            duration,
            text: text.to_string(),
        }
    }

    fn segment(text: &str) -> Segment {
        Segment {
            start_time: 65.0,
            end_time: 3725.0,
            text: text.to_string(),
            transcript_entries: Vec::new(),
        }
    }

    fn request(granularity: &str, custom_prompt: Option<&str>) -> ChapterRequest {
        ChapterRequest {
            video_id: "abc123".to_string(),
            segment_duration: 300,
            granularity: granularity.to_string(),
            custom_prompt: custom_prompt.map(str::to_string),
        }
    }

    #[test]
    fn extracts_object_from_prose() {
        let text = "Sure! Here it is:\n```json\n{\"title\": \"Intro {1}\", \"n\": {\"a\": 1}}\n```\nThanks {bye}";
        assert_eq!(
            extract_json_object(text),
            Some("{\"title\": \"Intro {1}\", \"n\": {\"a\": 1}}")
        );
        assert_eq!(extract_json_object("no braces"), None);
    }

    #[test]
    fn unbalanced_output_falls_back_to_outer_span() {
        assert_eq!(extract_json_object("{ {\"a\": 1} "), Some("{ {\"a\": 1}"));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let analysis = parse_analysis("{\"title\": \"Setup\"}").expect("analysis");
        assert_eq!(analysis.title, "Setup");
        assert_eq!(analysis.topic_category, FALLBACK_CATEGORY);
        assert_eq!(analysis.technical_level, FALLBACK_TECHNICAL_LEVEL);
        assert!(analysis.key_points.is_empty());
        assert_eq!(parse_analysis("I cannot answer that"), None);
    }

    #[test]
    fn fallback_truncates_long_text() {
        let long = "x".repeat(80);
        let fallback = SegmentAnalysis::fallback(&long);
        assert_eq!(fallback.summary, format!("{}...", "x".repeat(50)));
        assert_eq!(fallback.title, "Section");
        assert_eq!(fallback.topic_category, "Other");
        assert!(!fallback.contains_code);

        assert_eq!(SegmentAnalysis::fallback("short").summary, "short");
    }

    #[test]
    fn prompt_embeds_range_and_granularity_targets() {
        let prompt = build_prompt(&segment("we deploy the service"), Granularity::Fine, None);
        assert!(prompt.contains("00:01:05 - 01:02:05"));
        assert!(prompt.contains("we deploy the service"));
        assert!(prompt.contains("at most 20 characters"));
        assert!(prompt.contains("at most 100 characters"));
        assert!(prompt.contains("at most 5 items"));

        let coarse = build_prompt(&segment("t"), Granularity::Coarse, None);
        assert!(coarse.contains("at most 10 characters"));
        assert!(coarse.contains("at most 2 items"));
    }

    #[test]
    fn custom_prompt_replaces_targets() {
        let prompt = build_prompt(
            &segment("t"),
            Granularity::Custom,
            Some("Focus on teaching value."),
        );
        assert!(prompt.contains("Focus on teaching value."));
        assert!(!prompt.contains("at most"));
    }

    #[tokio::test]
    async fn invalid_plan_fails_before_fetching() {
        let generator = ScriptedGenerator::new(vec![]);
        let analyzer = ChapterAnalyzer::new(&UnreachableTranscript, &generator);

        let err = analyzer
            .generate_semantic_chapters(&request("custom", None))
            .await
            .expect_err("custom needs a prompt");
        assert!(matches!(err, AnalysisError::InvalidRequest(_)));

        let err = analyzer
            .generate_semantic_chapters(&request("extreme", None))
            .await
            .expect_err("unknown granularity");
        assert!(err.to_string().contains("granularity"));
    }

    #[tokio::test]
    async fn empty_transcript_is_an_error() {
        let generator = ScriptedGenerator::new(vec![]);
        let transcripts = FixedTranscript(Vec::new());
        let analyzer = ChapterAnalyzer::new(&transcripts, &generator);

        let err = analyzer
            .generate_semantic_chapters(&request("medium", None))
            .await
            .expect_err("empty");
        assert!(matches!(err, AnalysisError::EmptyTranscript { .. }));
    }

    #[tokio::test]
    async fn one_failing_segment_does_not_abort_the_run() {
        let transcripts = FixedTranscript(vec![
            entry(0.0, 100.0, "welcome to the talk"),
            entry(100.0, 100.0, "today we cover rust"),
            entry(310.0, 50.0, "this part fails"),
            entry(650.0, 40.0, "wrapping up"),
        ]);
        let generator = ScriptedGenerator::new(vec![
            Ok("Here you go: {\"topic_category\": \"Introduction\", \"title\": \"Welcome\", \"summary\": \"Opening\", \"key_points\": [\"rust\"], \"technical_level\": \"beginner\"}"),
            Err("quota exceeded"),
            Ok("not json at all"),
        ]);
        let analyzer = ChapterAnalyzer::new(&transcripts, &generator);

        let report = analyzer
            .generate_semantic_chapters(&request("medium", None))
            .await
            .expect("report");

        assert_eq!(report.total_chapters, 3);
        assert_eq!(report.total_duration_seconds, 690.0);
        assert_eq!(report.segment_duration, 300);
        assert!(!report.custom_prompt_used);

        let indexes: Vec<_> = report.chapters.iter().map(|c| c.index).collect();
        assert_eq!(indexes, vec![1, 2, 3]);
        assert_eq!(report.chapters[0].analysis.title, "Welcome");
        assert_eq!(report.chapters[0].end_seconds, 200.0);
        assert_eq!(report.chapters[1].analysis.title, FALLBACK_TITLE);
        assert_eq!(report.chapters[1].analysis.summary, "this part fails");
        assert_eq!(report.chapters[2].analysis.topic_category, FALLBACK_CATEGORY);
        assert_eq!(generator.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn coarse_granularity_widens_the_window() {
        let transcripts = FixedTranscript(vec![
            entry(0.0, 100.0, "a"),
            entry(400.0, 100.0, "b"),
        ]);
        let generator = ScriptedGenerator::new(vec![Ok("{}")]);
        let analyzer = ChapterAnalyzer::new(&transcripts, &generator);

        let report = analyzer
            .generate_semantic_chapters(&request("coarse", None))
            .await
            .expect("report");
        assert_eq!(report.segment_duration, 600);
        assert_eq!(report.total_chapters, 1);
        assert_eq!(report.granularity, Granularity::Coarse);
    }
}
