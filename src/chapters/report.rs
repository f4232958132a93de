use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::chapters::segmenter::{Granularity, Segment};
use crate::chapters::summarizer::SegmentAnalysis;

pub const ANALYSIS_METHOD: &str = "gemini_semantic";

const CATEGORY_ORDER: [&str; 7] = [
    "Introduction",
    "Technical explanation",
    "Demo",
    "Implementation",
    "Q&A",
    "Summary",
    "Other",
];
const TOP_KEYWORDS: usize = 10;

/// `HH:MM:SS`, truncating fractional seconds.
pub fn format_timestamp(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chapter {
    pub index: usize,
    pub start_seconds: f64,
    pub end_seconds: f64,
    pub start_timestamp: String,
    pub end_timestamp: String,
    pub duration_seconds: f64,
    pub original_text: String,
    #[serde(flatten)]
    pub analysis: SegmentAnalysis,
}

impl Chapter {
    pub fn new(index: usize, segment: &Segment, analysis: SegmentAnalysis) -> Self {
        Self {
            index,
            start_seconds: segment.start_time,
            end_seconds: segment.end_time,
            start_timestamp: format_timestamp(segment.start_time),
            end_timestamp: format_timestamp(segment.end_time),
            duration_seconds: segment.duration(),
            original_text: segment.text.clone(),
            analysis,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChapterReport {
    pub video_id: String,
    pub total_duration_seconds: f64,
    pub total_duration_formatted: String,
    pub total_chapters: usize,
    pub analysis_method: &'static str,
    pub segment_duration: u32,
    pub granularity: Granularity,
    pub custom_prompt_used: bool,
    pub chapters: Vec<Chapter>,
}

impl ChapterReport {
    pub fn new(
        video_id: &str,
        total_duration_seconds: f64,
        segment_duration: u32,
        granularity: Granularity,
        custom_prompt_used: bool,
        chapters: Vec<Chapter>,
    ) -> Self {
        Self {
            video_id: video_id.to_string(),
            total_duration_seconds,
            total_duration_formatted: format_timestamp(total_duration_seconds),
            total_chapters: chapters.len(),
            analysis_method: ANALYSIS_METHOD,
            segment_duration,
            granularity,
            custom_prompt_used,
            chapters,
        }
    }

    /// Categories in presentation order: the known ones first, then the rest
    /// as they first appear.
    fn grouped_by_category(&self) -> Vec<(&str, Vec<&Chapter>)> {
        let mut groups: Vec<(&str, Vec<&Chapter>)> = Vec::new();
        for chapter in &self.chapters {
            let category = chapter.analysis.topic_category.as_str();
            match groups.iter_mut().find(|(name, _)| *name == category) {
                Some((_, members)) => members.push(chapter),
                None => groups.push((category, vec![chapter])),
            }
        }

        groups.sort_by_key(|(name, _)| {
            CATEGORY_ORDER
                .iter()
                .position(|known| known == name)
                .unwrap_or(CATEGORY_ORDER.len())
        });
        groups
    }

    fn technical_levels(&self) -> BTreeSet<&str> {
        self.chapters
            .iter()
            .map(|chapter| chapter.analysis.technical_level.as_str())
            .collect()
    }
}

fn level_label(level: &str) -> &str {
    match level {
        "beginner" => "For beginners",
        "intermediate" => "For intermediate viewers",
        "advanced" => "For advanced viewers",
        "general" => "For a general audience",
        other => other,
    }
}

/// Renders a table of contents that can be pasted into a video description.
pub fn format_for_youtube_description(report: &ChapterReport) -> String {
    let mut lines = vec![
        "📋 Table of Contents".to_string(),
        "=".repeat(40),
        String::new(),
    ];

    for (category, chapters) in report.grouped_by_category() {
        lines.push(format!("## {category}"));
        for chapter in chapters {
            let mut line = format!("{} {}", chapter.start_timestamp, chapter.analysis.title);
            if !chapter.analysis.summary.is_empty() {
                line.push_str(" - ");
                line.push_str(&chapter.analysis.summary);
            }
            lines.push(line);
        }
        lines.push(String::new());
    }

    let levels = report.technical_levels();
    if !levels.is_empty() {
        lines.push("🎯 Technical level:".to_string());
        for level in levels {
            lines.push(format!("  • {}", level_label(level)));
        }
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push("🤖 This table of contents was generated automatically".to_string());
    lines.push(format!("📺 Duration: {}", report.total_duration_formatted));
    lines.push(format!("📊 Chapters: {}", report.total_chapters));
    lines.join("\n")
}

/// One `HH:MM:SS title` line per chapter.
pub fn chapter_timestamps(report: &ChapterReport) -> String {
    report
        .chapters
        .iter()
        .map(|chapter| format!("{} {}", chapter.start_timestamp, chapter.analysis.title))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeywordFrequency {
    pub keyword: String,
    pub frequency: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyTopics {
    pub topics_by_category: Map<String, Value>,
    pub top_keywords: Vec<KeywordFrequency>,
    pub technical_levels: Vec<String>,
}

pub fn key_topics(report: &ChapterReport) -> KeyTopics {
    let mut topics_by_category = Map::new();
    for (category, chapters) in report.grouped_by_category() {
        let entries = chapters
            .iter()
            .map(|chapter| {
                json!({
                    "title": chapter.analysis.title,
                    "summary": chapter.analysis.summary,
                    "timestamp": chapter.start_timestamp,
                    "key_points": chapter.analysis.key_points,
                })
            })
            .collect();
        topics_by_category.insert(category.to_string(), Value::Array(entries));
    }

    // (count, first position) so ties keep the order of first appearance.
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    let points = report
        .chapters
        .iter()
        .flat_map(|chapter| chapter.analysis.key_points.iter());
    for (position, point) in points.enumerate() {
        counts.entry(point.as_str()).or_insert((0, position)).0 += 1;
    }
    let mut ranked: Vec<_> = counts.into_iter().collect();
    ranked.sort_by(|(_, (count_a, first_a)), (_, (count_b, first_b))| {
        count_b.cmp(count_a).then(first_a.cmp(first_b))
    });

    KeyTopics {
        topics_by_category,
        top_keywords: ranked
            .into_iter()
            .take(TOP_KEYWORDS)
            .map(|(keyword, (frequency, _))| KeywordFrequency {
                keyword: keyword.to_string(),
                frequency,
            })
            .collect(),
        technical_levels: report
            .technical_levels()
            .into_iter()
            .map(str::to_string)
            .collect(),
    }
}
