use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tokio::process::Command;

use crate::models::{ExtractedDocument, PageText};
use crate::services::DocumentExtractor;

/// Extracts per-page text with poppler's `pdftotext`, falling back to
/// `pdf-extract` (whole document as a single page) when poppler is missing.
#[derive(Clone, Default)]
pub struct PdfTextExtractor;

impl PdfTextExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DocumentExtractor for PdfTextExtractor {
    async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            anyhow::bail!("PDF not found: {}", path.display());
        }

        let mut pages = extract_pages_with_poppler(path).await?;

        if pages.iter().all(|page| page.text.is_empty()) {
            let pdf_path = path.to_path_buf();
            let extracted =
                tokio::task::spawn_blocking(move || pdf_extract::extract_text(&pdf_path))
                    .await
                    .context("PDF extraction task panicked")?
                    .context("failed to extract text from PDF")?;

            pages = vec![PageText::from_zero_based(0, normalize_text(&extracted))];
        }

        Ok(assemble(path.to_path_buf(), pages))
    }
}

fn assemble(path: PathBuf, pages: Vec<PageText>) -> ExtractedDocument {
    let full_text = pages
        .iter()
        .map(|page| page.text.as_str())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    ExtractedDocument {
        path,
        full_text,
        pages,
    }
}

async fn extract_pages_with_poppler(pdf_path: &Path) -> Result<Vec<PageText>> {
    if !has_command("pdftotext").await {
        return Ok(vec![]);
    }

    let page_count = get_pdf_page_count(pdf_path).await.unwrap_or(0);
    let mut pages = Vec::with_capacity(page_count);

    for page in 1..=page_count {
        let output = Command::new("pdftotext")
            .arg("-f")
            .arg(page.to_string())
            .arg("-l")
            .arg(page.to_string())
            .arg("-nopgbrk")
            .arg(pdf_path)
            .arg("-")
            .output()
            .await
            .with_context(|| format!("failed to run pdftotext for page {page}"))?;

        // Blank or failed pages are kept so page numbering stays aligned.
        let text = if output.status.success() {
            normalize_text(&String::from_utf8_lossy(&output.stdout))
        } else {
            String::new()
        };

        pages.push(PageText {
            number: u32::try_from(page).context("page number out of range")?,
            text,
        });
    }

    Ok(pages)
}

async fn get_pdf_page_count(pdf_path: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(pdf_path)
        .output()
        .await
        .context("failed to run pdfinfo")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("pdfinfo exited with non-zero status"));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_page_count(&stdout)
}

fn parse_page_count(pdfinfo: &str) -> Result<usize> {
    let regex = Regex::new(r"(?m)^Pages:\s+(\d+)\s*$")?;
    regex
        .captures(pdfinfo)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<usize>().ok())
        .ok_or_else(|| anyhow::anyhow!("unable to parse page count from pdfinfo"))
}

async fn has_command(binary: &str) -> bool {
    Command::new("which")
        .arg(binary)
        .output()
        .await
        .map(|out| out.status.success() && !out.stdout.is_empty())
        .unwrap_or(false)
}

/// Unifies typographic quotes and collapses whitespace, so segment text and
/// page text tokenize the same way.
pub fn normalize_text(input: &str) -> String {
    input
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{201C}', '\u{201D}'], "\"")
        .replace('\u{00A0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
