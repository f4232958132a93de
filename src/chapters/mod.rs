//! Transcript to chapter pipeline: segment, summarize each segment, render.

pub mod report;
pub mod segmenter;
pub mod summarizer;
