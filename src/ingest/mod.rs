pub mod pages;
pub mod pdf;

use anyhow::Result;

use crate::error::AssistantError;
use crate::models::{PageText, RawSegment, Segment};
use crate::services::Segmenter;

pub use pages::{assign_pages, ZeroOverlapPolicy};

/// The segments of the currently loaded document, ids 1-based and in
/// segmentation order. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct SegmentStore {
    segments: Vec<Segment>,
}

impl SegmentStore {
    pub async fn build(
        segmenter: &dyn Segmenter,
        full_text: &str,
        pages: &[PageText],
        policy: ZeroOverlapPolicy,
    ) -> Result<Self, AssistantError> {
        let raw = segmenter.segment(full_text).await?;
        Ok(Self::from_raw(raw, pages, policy))
    }

    pub fn from_raw(raw: Vec<RawSegment>, pages: &[PageText], policy: ZeroOverlapPolicy) -> Self {
        let mut segments = build_segments(raw);
        assign_pages(&mut segments, pages, policy);
        tracing::info!(
            segments = segments.len(),
            pages = pages.len(),
            "segment store built"
        );
        Self { segments }
    }

    pub fn get(&self, id: u32) -> Option<&Segment> {
        // Ids are dense and sequential, so the position is known.
        let idx = usize::try_from(id).ok()?.checked_sub(1)?;
        self.segments.get(idx).filter(|segment| segment.id == id)
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn build_segments(raw: Vec<RawSegment>) -> Vec<Segment> {
    let mut segments = Vec::with_capacity(raw.len());
    for item in raw {
        let text = item.segment_text.trim();
        if text.is_empty() {
            tracing::debug!(segment_type = ?item.segment_type, "skipping blank segment");
            continue;
        }

        let id = u32::try_from(segments.len() + 1).unwrap_or(u32::MAX);
        segments.push(Segment {
            id,
            text: text.to_string(),
            page_number: None,
        });
    }
    segments
}
