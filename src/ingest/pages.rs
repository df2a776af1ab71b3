use std::collections::HashSet;
use std::str::FromStr;

use crate::models::{PageText, Segment};

/// What to do with a segment that shares no word with any page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ZeroOverlapPolicy {
    #[default]
    FirstPage,
    Unassigned,
}

impl FromStr for ZeroOverlapPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "first_page" | "first" => Ok(Self::FirstPage),
            "unassigned" | "none" => Ok(Self::Unassigned),
            other => anyhow::bail!("unknown zero-overlap policy: {other}"),
        }
    }
}

/// Gives each segment the page it shares the most distinct words with.
/// Cost grows with `segments x pages x tokens`.
pub fn assign_pages(segments: &mut [Segment], pages: &[PageText], policy: ZeroOverlapPolicy) {
    let page_tokens: Vec<HashSet<&str>> = pages.iter().map(|page| token_set(&page.text)).collect();

    for segment in segments.iter_mut() {
        segment.page_number = best_page(&segment.text, pages, &page_tokens, policy);
        tracing::debug!(
            segment_id = segment.id,
            page = ?segment.page_number,
            "assigned page"
        );
    }
}

fn best_page(
    text: &str,
    pages: &[PageText],
    page_tokens: &[HashSet<&str>],
    policy: ZeroOverlapPolicy,
) -> Option<u32> {
    let segment_tokens = token_set(text);

    let mut best: Option<(usize, u32)> = None;
    for (page, tokens) in pages.iter().zip(page_tokens) {
        let overlap = segment_tokens.intersection(tokens).count();
        // Strictly greater keeps the earliest page on ties.
        if overlap > best.map_or(0, |(count, _)| count) {
            best = Some((overlap, page.number));
        }
    }

    match best {
        Some((_, number)) => Some(number),
        None => match policy {
            ZeroOverlapPolicy::FirstPage => pages.first().map(|page| page.number),
            ZeroOverlapPolicy::Unassigned => None,
        },
    }
}

fn token_set(text: &str) -> HashSet<&str> {
    text.split_whitespace().collect()
}
