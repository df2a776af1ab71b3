use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::ingest::pdf::normalize_text;
use crate::models::{HighlightReport, PageHighlight, PageText};
use crate::services::{DocumentExtractor, Highlighter};

/// Locates a cited passage in the document by exact line search on every
/// page and writes the matches as a JSON report. Drawing the annotations is
/// left to the viewer consuming the report.
pub struct PageLineHighlighter {
    extractor: Arc<dyn DocumentExtractor>,
}

impl PageLineHighlighter {
    pub fn new(extractor: Arc<dyn DocumentExtractor>) -> Self {
        Self { extractor }
    }
}

#[async_trait]
impl Highlighter for PageLineHighlighter {
    async fn highlight(
        &self,
        input: &Path,
        output: &Path,
        passage: &str,
    ) -> Result<HighlightReport> {
        let document = self.extractor.extract(input).await?;
        let report = HighlightReport {
            input: input.to_path_buf(),
            passage: passage.to_string(),
            pages: locate_passage(&document.pages, passage),
        };

        let body = serde_json::to_vec_pretty(&report)?;
        tokio::fs::write(output, body)
            .await
            .with_context(|| format!("failed writing highlight report {}", output.display()))?;

        Ok(report)
    }
}

pub fn locate_passage(pages: &[PageText], passage: &str) -> Vec<PageHighlight> {
    let lines: Vec<String> = passage
        .lines()
        .map(normalize_text)
        .filter(|line| !line.is_empty())
        .collect();

    let mut found = Vec::new();
    for page in pages {
        let haystack = normalize_text(&page.text);
        let matched_lines: Vec<String> = lines
            .iter()
            .filter(|line| {
                let hit = haystack.contains(line.as_str());
                if hit {
                    tracing::info!(page = page.number, %line, "text found");
                } else {
                    tracing::debug!(page = page.number, %line, "text not found");
                }
                hit
            })
            .cloned()
            .collect();

        if !matched_lines.is_empty() {
            found.push(PageHighlight {
                page_number: page.number,
                matched_lines,
            });
        }
    }

    if found.is_empty() {
        tracing::warn!("cited passage not found on any page");
    }
    found
}
