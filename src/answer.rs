use anyhow::Result;
use regex::Regex;

use crate::prompt::{CITATION_PREFIX, CITATION_SUFFIX};

const ANSWER_LABEL: &str = "Answer:";

/// What the completion said about its source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Citation {
    Found(u32),
    Missing,
    /// A marker was present but its id could not be read.
    Malformed(String),
}

impl Citation {
    pub fn segment_id(&self) -> Option<u32> {
        match self {
            Self::Found(id) => Some(*id),
            Self::Missing | Self::Malformed(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAnswer {
    pub answer: String,
    pub citation: Citation,
}

/// Parses the answer line and `<ID: n>` citation out of a raw completion.
/// Never fails: anything unreadable degrades to an uncited answer.
pub struct AnswerExtractor {
    marker: Regex,
    loose_marker: Regex,
}

impl AnswerExtractor {
    pub fn new() -> Result<Self> {
        let prefix = regex::escape(CITATION_PREFIX);
        let suffix = regex::escape(CITATION_SUFFIX);
        Ok(Self {
            marker: Regex::new(&format!(r"\s*{prefix}\s*(\d+)\s*{suffix}"))?,
            loose_marker: Regex::new(&format!(r"{prefix}.*?{suffix}"))?,
        })
    }

    pub fn extract(&self, raw_completion: &str) -> ExtractedAnswer {
        let first_line = raw_completion.trim().lines().next().unwrap_or_default().trim();
        let line = first_line
            .strip_prefix(ANSWER_LABEL)
            .unwrap_or(first_line)
            .trim();

        let Some(captures) = self.marker.captures(line) else {
            let citation = match self.loose_marker.find(line) {
                Some(found) => Citation::Malformed(found.as_str().to_string()),
                None => Citation::Missing,
            };
            return ExtractedAnswer {
                answer: line.to_string(),
                citation,
            };
        };

        let digits = captures.get(1).map_or("", |m| m.as_str());
        let Ok(id) = digits.parse::<u32>() else {
            return ExtractedAnswer {
                answer: line.to_string(),
                citation: Citation::Malformed(digits.to_string()),
            };
        };

        ExtractedAnswer {
            answer: self.marker.replace_all(line, "").trim().to_string(),
            citation: Citation::Found(id),
        }
    }
}
