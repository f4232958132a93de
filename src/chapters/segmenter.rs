use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

pub const DEFAULT_SEGMENT_DURATION: u32 = 300;
pub const FINE_MAX_SEGMENT_DURATION: u32 = 180;
pub const COARSE_MIN_SEGMENT_DURATION: u32 = 600;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub start: f64,
    #[serde(default)]
    pub duration: f64,
    pub text: String,
}

impl TranscriptEntry {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Segment {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub transcript_entries: Vec<TranscriptEntry>,
}

impl Segment {
    fn seeded(entry: &TranscriptEntry) -> Self {
        Self {
            start_time: entry.start,
            end_time: entry.end(),
            text: entry.text.clone(),
            transcript_entries: vec![entry.clone()],
        }
    }

    fn absorb(&mut self, entry: &TranscriptEntry) {
        if !self.text.is_empty() {
            self.text.push(' ');
        }
        self.text.push_str(&entry.text);
        self.end_time = self.end_time.max(entry.end());
        self.transcript_entries.push(entry.clone());
    }

    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Groups consecutive entries into windows of roughly `segment_duration`
/// seconds.
///
/// A new segment starts at the first entry whose start is at least
/// `segment_duration` past the current segment's start. Each segment ends
/// where its last entry ends, so abutting entries give contiguous segments
/// and a single long entry still forms exactly one segment.
pub fn segment_transcript(entries: &[TranscriptEntry], segment_duration: u32) -> Vec<Segment> {
    let window = f64::from(segment_duration);
    let mut segments = Vec::new();
    let mut entries = entries.iter();

    let Some(first) = entries.next() else {
        return segments;
    };
    let mut current = Segment::seeded(first);

    for entry in entries {
        if entry.start - current.start_time >= window {
            let finished = std::mem::replace(&mut current, Segment::seeded(entry));
            segments.push(finished);
        } else {
            current.absorb(entry);
        }
    }

    segments.push(current);
    segments
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    Fine,
    #[default]
    Medium,
    Coarse,
    Custom,
}

impl Granularity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fine => "fine",
            Self::Medium => "medium",
            Self::Coarse => "coarse",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Granularity {
    type Err = ApiError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fine" => Ok(Self::Fine),
            "medium" => Ok(Self::Medium),
            "coarse" => Ok(Self::Coarse),
            "custom" => Ok(Self::Custom),
            other => Err(ApiError::validation(format!(
                "granularity must be one of fine, medium, coarse or custom (got '{other}')"
            ))),
        }
    }
}

/// Effective window length for a granularity preset.
pub fn resolve_segment_duration(
    granularity: Granularity,
    requested: u32,
    custom_prompt: Option<&str>,
) -> Result<u32, ApiError> {
    if requested == 0 {
        return Err(ApiError::validation(
            "segment_duration must be greater than zero",
        ));
    }

    match granularity {
        Granularity::Fine => Ok(requested.min(FINE_MAX_SEGMENT_DURATION)),
        Granularity::Medium => Ok(requested),
        Granularity::Coarse => Ok(requested.max(COARSE_MIN_SEGMENT_DURATION)),
        Granularity::Custom => {
            if custom_prompt.map_or(true, |prompt| prompt.trim().is_empty()) {
                return Err(ApiError::validation(
                    "custom_prompt is required when granularity is 'custom'",
                ));
            }
            Ok(requested)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(start: f64, duration: f64, text: &str) -> TranscriptEntry {
        TranscriptEntry {
            start,
            duration,
            text: text.to_string(),
        }
    }

    #[test]
    fn closes_a_segment_once_the_window_is_exceeded() {
        let entries = vec![
            entry(0.0, 100.0, "a"),
            entry(100.0, 100.0, "b"),
            entry(310.0, 50.0, "c"),
        ];
        let segments = segment_transcript(&entries, 300);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start_time, 0.0);
        assert_eq!(segments[0].end_time, 200.0);
        assert_eq!(segments[0].text, "a b");
        assert_eq!(segments[0].transcript_entries.len(), 2);
        assert_eq!(segments[1].start_time, 310.0);
        assert_eq!(segments[1].end_time, 360.0);
        assert_eq!(segments[1].text, "c");
    }

    #[test]
    fn empty_transcript_has_no_segments() {
        assert!(segment_transcript(&[], 300).is_empty());
    }

    #[test]
    fn entry_longer_than_window_is_one_segment() {
        let segments = segment_transcript(&[entry(5.0, 900.0, "long")], 300);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start_time, 5.0);
        assert_eq!(segments[0].end_time, 905.0);
    }

    #[test]
    fn segments_are_ordered_and_do_not_overlap() {
        let entries: Vec<_> = (0..50)
            .map(|i| entry(f64::from(i) * 30.0, 30.0, &format!("line{i}")))
            .collect();
        let segments = segment_transcript(&entries, 120);

        // 1500 s of uniformly spaced entries at 120 s windows
        assert_eq!(segments.len(), 13);
        let total: usize = segments.iter().map(|s| s.transcript_entries.len()).sum();
        assert_eq!(total, entries.len());

        let rejoined = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let full = entries
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        assert_eq!(rejoined, full);
        for pair in segments.windows(2) {
            assert!(pair[0].end_time <= pair[1].start_time);
            // abutting entries produce contiguous segments
            assert_eq!(pair[0].end_time, pair[1].start_time);
        }
    }

    #[test]
    fn granularity_parses_case_insensitively() {
        assert_eq!("FINE".parse::<Granularity>().expect("fine"), Granularity::Fine);
        assert_eq!(" custom ".parse::<Granularity>().expect("custom"), Granularity::Custom);
        assert!("huge".parse::<Granularity>().is_err());
    }

    #[test]
    fn duration_follows_granularity() {
        assert_eq!(resolve_segment_duration(Granularity::Fine, 300, None).expect("fine"), 180);
        assert_eq!(resolve_segment_duration(Granularity::Fine, 120, None).expect("fine"), 120);
        assert_eq!(resolve_segment_duration(Granularity::Medium, 300, None).expect("medium"), 300);
        assert_eq!(resolve_segment_duration(Granularity::Coarse, 300, None).expect("coarse"), 600);
        assert_eq!(resolve_segment_duration(Granularity::Coarse, 900, None).expect("coarse"), 900);
        assert_eq!(
            resolve_segment_duration(Granularity::Custom, 240, Some("focus on tooling"))
                .expect("custom"),
            240
        );
    }

    #[test]
    fn custom_without_prompt_and_zero_duration_are_rejected() {
        assert!(resolve_segment_duration(Granularity::Custom, 300, None).is_err());
        assert!(resolve_segment_duration(Granularity::Custom, 300, Some("  ")).is_err());
        assert!(resolve_segment_duration(Granularity::Medium, 0, None).is_err());
    }
}
