use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A segment as returned by the segmentation service, before ids and pages
/// are attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSegment {
    #[serde(rename = "segmentText")]
    pub segment_text: String,
    #[serde(rename = "segmentType", default)]
    pub segment_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    pub id: u32,
    pub text: String,
    pub page_number: Option<u32>,
}

/// Text of one physical page. `number` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageText {
    pub number: u32,
    pub text: String,
}

impl PageText {
    /// Extractors report pages 0-based; storage is 1-based.
    pub fn from_zero_based(index: u32, text: impl Into<String>) -> Self {
        Self {
            number: index.saturating_add(1),
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub path: PathBuf,
    pub full_text: String,
    pub pages: Vec<PageText>,
}

#[derive(Debug, Clone, Copy)]
pub struct RankedCandidate<'a> {
    pub segment: &'a Segment,
    pub score: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerOutcome {
    Answered,
    Insufficient,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub answer_text: String,
    pub outcome: AnswerOutcome,
    pub cited_segment_id: Option<u32>,
    pub cited_text: Option<String>,
    pub cited_page_number: Option<u32>,
    /// Ids of the segments that were placed in the prompt, in ranked order.
    pub candidate_ids: Vec<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QaRecord {
    pub question: String,
    pub answer: String,
    pub segment_id: Option<u32>,
    pub page_number: Option<u32>,
    pub candidate_ids: Vec<u32>,
    pub asked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageHighlight {
    pub page_number: u32,
    pub matched_lines: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HighlightReport {
    pub input: PathBuf,
    pub passage: String,
    pub pages: Vec<PageHighlight>,
}

impl HighlightReport {
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
