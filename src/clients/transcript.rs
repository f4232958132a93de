//! Caption retrieval from the public watch page
//!
//! The watch page embeds the player response, whose `captionTracks` list
//! points at timed-text XML documents. One track is chosen by language
//! preference and decoded into [`TranscriptEntry`] values.

use async_trait::async_trait;
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::debug;

use crate::chapters::segmenter::TranscriptEntry;
use crate::errors::ApiError;

const WATCH_URL: &str = "https://www.youtube.com/watch";
const CAPTION_TRACKS_KEY: &str = "\"captionTracks\":";

#[async_trait]
pub trait TranscriptSource: Send + Sync {
    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptEntry>, ApiError>;
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CaptionTrack {
    pub base_url: String,
    pub language_code: String,
    #[serde(default)]
    pub kind: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WatchPageTranscripts {
    http: reqwest::Client,
    languages: Vec<String>,
}

impl WatchPageTranscripts {
    pub fn new(http: reqwest::Client, languages: Vec<String>) -> Self {
        Self { http, languages }
    }

    async fn get_text(&self, request: reqwest::RequestBuilder) -> Result<String, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let url = response.url().to_string();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url,
                body: String::new(),
            });
        }
        Ok(body)
    }
}

#[async_trait]
impl TranscriptSource for WatchPageTranscripts {
    async fn fetch(&self, video_id: &str) -> Result<Vec<TranscriptEntry>, ApiError> {
        let page = self
            .get_text(
                self.http
                    .get(WATCH_URL)
                    .query(&[("v", video_id)])
                    .header("Accept-Language", "en-US,en;q=0.8"),
            )
            .await?;

        let tracks = extract_caption_tracks(&page).ok_or_else(|| {
            ApiError::not_found(format!("no transcript is available for video {video_id}"))
        })?;
        let track = choose_track(&tracks, &self.languages).ok_or_else(|| {
            ApiError::not_found(format!("no transcript is available for video {video_id}"))
        })?;
        debug!(video_id = %video_id, language = %track.language_code, "fetching caption track");

        let xml = self.get_text(self.http.get(&track.base_url)).await?;
        Ok(parse_timed_text(&xml))
    }
}

/// Returns the JSON array following `"captionTracks":`, or `None` when the
/// page has no captions.
pub fn extract_caption_tracks(page: &str) -> Option<Vec<CaptionTrack>> {
    let start = page.find(CAPTION_TRACKS_KEY)? + CAPTION_TRACKS_KEY.len();
    let array = balanced_span(&page[start..], '[', ']')?;
    let tracks: Vec<CaptionTrack> = serde_json::from_str(array).ok()?;
    (!tracks.is_empty()).then_some(tracks)
}

/// First track whose language matches the preference order, else the first
/// track of any language.
pub fn choose_track<'a>(tracks: &'a [CaptionTrack], languages: &[String]) -> Option<&'a CaptionTrack> {
    languages
        .iter()
        .find_map(|language| {
            tracks
                .iter()
                .find(|track| track.language_code.eq_ignore_ascii_case(language))
        })
        .or_else(|| tracks.first())
}

/// Decodes `<text start=".." dur="..">` elements; entities are resolved by
/// the HTML parser.
pub fn parse_timed_text(xml: &str) -> Vec<TranscriptEntry> {
    let Ok(selector) = Selector::parse("text") else {
        return Vec::new();
    };
    let document = Html::parse_fragment(xml);

    let mut entries: Vec<TranscriptEntry> = document
        .select(&selector)
        .filter_map(|element| {
            let start = element.value().attr("start")?.parse::<f64>().ok()?;
            let duration = element
                .value()
                .attr("dur")
                .and_then(|dur| dur.parse::<f64>().ok())
                .unwrap_or(0.0);
            let raw: String = element.text().collect();
            let text = decode_residual_entities(&raw)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            (!text.is_empty()).then_some(TranscriptEntry {
                start,
                duration,
                text,
            })
        })
        .collect();

    entries.sort_by(|a, b| a.start.total_cmp(&b.start));
    entries
}

/// Caption text is frequently double-escaped (`&amp;#39;`).
fn decode_residual_entities(text: &str) -> String {
    text.replace("&#39;", "'")
        .replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

/// Slice from the opening delimiter to its matching closer, skipping over
/// JSON string contents.
fn balanced_span(input: &str, open: char, close: char) -> Option<&str> {
    let begin = input.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in input[begin..].char_indices() {
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
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&input[begin..begin + offset + ch.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}
