use std::cmp::Ordering;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::ingest::SegmentStore;
use crate::models::RankedCandidate;
use crate::retrieval::RetrievalIndex;
use crate::services::ExtractiveScorer;

pub const DEFAULT_QA_THRESHOLD: f32 = 0.5;
pub const DEFAULT_QA_MAX_CANDIDATES: usize = 10;
pub const DEFAULT_TOP_K: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingMode {
    Extractive,
    Embedding,
}

impl FromStr for RankingMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "extractive" | "heuristic" | "qa" => Ok(Self::Extractive),
            "embedding" | "vector" => Ok(Self::Embedding),
            other => anyhow::bail!("unknown ranking mode: {other}"),
        }
    }
}

/// Selects a bounded, ordered set of candidate segments for a question.
///
/// The two strategies produce scores on different scales (QA confidence vs.
/// cosine similarity); they are never mixed in one ranking.
pub enum Ranker {
    Extractive {
        scorer: Arc<dyn ExtractiveScorer>,
        threshold: f32,
        max_candidates: usize,
    },
    Embedding {
        top_k: usize,
    },
}

impl Ranker {
    pub fn extractive(scorer: Arc<dyn ExtractiveScorer>) -> Self {
        Self::Extractive {
            scorer,
            threshold: DEFAULT_QA_THRESHOLD,
            max_candidates: DEFAULT_QA_MAX_CANDIDATES,
        }
    }

    pub fn embedding(top_k: usize) -> Self {
        Self::Embedding { top_k }
    }

    pub fn mode(&self) -> RankingMode {
        match self {
            Self::Extractive { .. } => RankingMode::Extractive,
            Self::Embedding { .. } => RankingMode::Embedding,
        }
    }

    pub fn needs_index(&self) -> bool {
        matches!(self, Self::Embedding { .. })
    }

    pub fn bound(&self) -> usize {
        match self {
            Self::Extractive { max_candidates, .. } => *max_candidates,
            Self::Embedding { top_k } => *top_k,
        }
    }

    pub async fn rank<'a>(
        &self,
        question: &str,
        store: &'a SegmentStore,
        index: Option<&RetrievalIndex>,
    ) -> Result<Vec<RankedCandidate<'a>>> {
        let mut candidates = match self {
            Self::Extractive {
                scorer, threshold, ..
            } => score_every_segment(scorer.as_ref(), *threshold, question, store).await?,
            Self::Embedding { top_k } => {
                let index = index.context("embedding ranking requires a retrieval index")?;
                nearest_segments(index, *top_k, question, store).await?
            }
        };

        candidates.sort_by(|a, b| compare_scores(a.score, b.score));
        candidates.truncate(self.bound());

        tracing::debug!(
            mode = ?self.mode(),
            ids = ?candidates.iter().map(|c| c.segment.id).collect::<Vec<_>>(),
            "ranked candidates"
        );
        Ok(candidates)
    }
}

/// Runs the QA scorer over every segment. Linear in segment count per
/// question, which is only acceptable at handout scale.
async fn score_every_segment<'a>(
    scorer: &dyn ExtractiveScorer,
    threshold: f32,
    question: &str,
    store: &'a SegmentStore,
) -> Result<Vec<RankedCandidate<'a>>> {
    let mut kept = Vec::new();
    for segment in store.segments() {
        let score = scorer
            .score(question, &segment.text)
            .await
            .with_context(|| format!("failed scoring segment {}", segment.id))?;
        if score > threshold {
            kept.push(RankedCandidate {
                segment,
                score: Some(score),
            });
        }
    }
    Ok(kept)
}

async fn nearest_segments<'a>(
    index: &RetrievalIndex,
    top_k: usize,
    question: &str,
    store: &'a SegmentStore,
) -> Result<Vec<RankedCandidate<'a>>> {
    let hits = index.query(question, top_k).await?;
    Ok(hits
        .into_iter()
        .filter_map(|hit| {
            let segment = store.get(hit.segment_id)?;
            Some(RankedCandidate {
                segment,
                score: hit.score,
            })
        })
        .collect())
}

/// Descending by score; missing scores sort last.
fn compare_scores(a: Option<f32>, b: Option<f32>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::ingest::tests::raw;
    use crate::ingest::ZeroOverlapPolicy;
    use crate::models::PageText;
    use crate::retrieval::tests::KeywordEmbedder;
    use crate::retrieval::MemoryVectorStore;

    /// Scores segments by looking their text up in a table; unknown text
    /// scores zero.
    pub(crate) struct TableScorer {
        pub(crate) scores: HashMap<String, f32>,
    }

    #[async_trait]
    impl ExtractiveScorer for TableScorer {
        async fn score(&self, _question: &str, context: &str) -> Result<f32> {
            Ok(self.scores.get(context).copied().unwrap_or(0.0))
        }
    }

    fn store(texts: &[&str]) -> SegmentStore {
        SegmentStore::from_raw(
            texts.iter().map(|text| raw(text)).collect(),
            &[PageText::from_zero_based(0, texts.join(" "))],
            ZeroOverlapPolicy::FirstPage,
        )
    }

    #[test]
    fn missing_scores_sort_last() {
        let mut scores = vec![None, Some(0.2), Some(0.9), None, Some(0.5)];
        scores.sort_by(|a, b| compare_scores(*a, *b));
        assert_eq!(scores, vec![Some(0.9), Some(0.5), Some(0.2), None, None]);
    }

    #[test]
    fn parses_ranking_modes() {
        assert_eq!("embedding".parse::<RankingMode>().unwrap(), RankingMode::Embedding);
        assert_eq!("Extractive".parse::<RankingMode>().unwrap(), RankingMode::Extractive);
        assert!("bm25".parse::<RankingMode>().is_err());
    }

    #[tokio::test]
    async fn extractive_keeps_only_segments_above_threshold() {
        let store = store(&["Seg one.", "Seg two.", "Seg three."]);
        let scorer = TableScorer {
            scores: HashMap::from([
                ("Seg one.".to_string(), 0.3),
                ("Seg two.".to_string(), 0.8),
                ("Seg three.".to_string(), 0.5),
            ]),
        };
        let ranker = Ranker::extractive(Arc::new(scorer));

        let ranked = ranker.rank("question", &store, None).await.unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].segment.id, 2);
        assert_eq!(ranked[0].score, Some(0.8));
    }

    #[tokio::test]
    async fn extractive_output_never_exceeds_bound() {
        let texts: Vec<String> = (0..25).map(|n| format!("Segment {n}.")).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let store = store(&refs);
        let scorer = TableScorer {
            scores: texts
                .iter()
                .enumerate()
                .map(|(n, text)| (text.clone(), 0.51 + n as f32 / 100.0))
                .collect(),
        };
        let ranker = Ranker::extractive(Arc::new(scorer));

        let ranked = ranker.rank("question", &store, None).await.unwrap();

        assert_eq!(ranked.len(), DEFAULT_QA_MAX_CANDIDATES);
        assert_eq!(ranked[0].segment.id, 25);
        assert!(ranked
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score));
    }

    #[tokio::test]
    async fn extractive_returns_empty_when_nothing_qualifies() {
        let store = store(&["Nothing relevant."]);
        let ranker = Ranker::extractive(Arc::new(TableScorer {
            scores: HashMap::new(),
        }));

        let ranked = ranker.rank("question", &store, None).await.unwrap();
        assert!(ranked.is_empty());
    }

    #[tokio::test]
    async fn embedding_maps_hits_back_to_segments() {
        let store = store(&[
            "The budget is fixed.",
            "Risk owners review the risk log.",
            "Evaluation findings are documented.",
        ]);
        let index = RetrievalIndex::build(
            store.segments(),
            Arc::new(KeywordEmbedder),
            Arc::new(MemoryVectorStore::new()),
        )
        .await
        .unwrap();
        let ranker = Ranker::embedding(1);

        let ranked = ranker
            .rank("Where is the evaluation documented?", &store, Some(&index))
            .await
            .unwrap();

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].segment.id, 3);
    }

    #[tokio::test]
    async fn embedding_without_index_is_an_error() {
        let store = store(&["Only segment."]);
        let err = Ranker::embedding(2).rank("q", &store, None).await;
        assert!(err.is_err());
    }
}
