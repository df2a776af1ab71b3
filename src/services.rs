use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

use crate::error::AssistantError;
use crate::models::{ExtractedDocument, HighlightReport, RawSegment};

#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    /// Full text plus per-page text. Pages must be in document order.
    async fn extract(&self, path: &Path) -> Result<ExtractedDocument>;
}

#[async_trait]
pub trait Segmenter: Send + Sync {
    /// Splits text into ordered segments. A non-success status from the
    /// service maps to `AssistantError::SegmentationUnavailable`.
    async fn segment(&self, text: &str) -> Result<Vec<RawSegment>, AssistantError>;
}

#[async_trait]
pub trait ExtractiveScorer: Send + Sync {
    /// Confidence in `[0, 1]` that `context` answers `question`.
    async fn score(&self, question: &str, context: &str) -> Result<f32>;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

#[async_trait]
pub trait Highlighter: Send + Sync {
    async fn highlight(&self, input: &Path, output: &Path, passage: &str)
        -> Result<HighlightReport>;
}
