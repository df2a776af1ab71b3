use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::models::Segment;
use crate::services::Embedder;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub segment_id: u32,
    pub score: Option<f32>,
}

#[derive(Debug, Clone)]
pub struct IndexedVector {
    pub segment_id: u32,
    pub page_number: Option<u32>,
    pub vector: Vec<f32>,
}

/// Similarity-search backend holding the vectors of exactly one document.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Drops whatever the store held and loads `points` in its place.
    async fn replace_all(&self, points: Vec<IndexedVector>) -> Result<()>;
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>>;
}

/// Brute-force cosine similarity. Adequate for a single handout.
#[derive(Clone, Default)]
pub struct MemoryVectorStore {
    points: Arc<RwLock<Vec<IndexedVector>>>,
}

impl MemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VectorStore for MemoryVectorStore {
    async fn replace_all(&self, points: Vec<IndexedVector>) -> Result<()> {
        *self.points.write().await = points;
        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        let points = self.points.read().await;
        let mut scored: Vec<(u32, f32)> = points
            .iter()
            .map(|point| (point.segment_id, cosine_similarity(vector, &point.vector)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(segment_id, score)| VectorHit {
                segment_id,
                score: Some(score),
            })
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Handle to the similarity index of one loaded document. Only hits for the
/// segments it was built from are ever returned.
pub struct RetrievalIndex {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    segment_ids: HashSet<u32>,
}

impl RetrievalIndex {
    pub async fn build(
        segments: &[Segment],
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorStore>,
    ) -> Result<Self> {
        let mut points = Vec::with_capacity(segments.len());
        for segment in segments {
            let vector = embedder
                .embed(&segment.text)
                .await
                .with_context(|| format!("failed embedding for segment {}", segment.id))?;
            points.push(IndexedVector {
                segment_id: segment.id,
                page_number: segment.page_number,
                vector,
            });
        }

        store.replace_all(points).await?;
        tracing::info!(segments = segments.len(), "retrieval index built");

        Ok(Self {
            embedder,
            store,
            segment_ids: segments.iter().map(|segment| segment.id).collect(),
        })
    }

    pub async fn query(&self, question: &str, k: usize) -> Result<Vec<VectorHit>> {
        if k == 0 || self.segment_ids.is_empty() {
            return Ok(vec![]);
        }

        let vector = self
            .embedder
            .embed(question)
            .await
            .context("failed embedding question")?;
        let hits = self.store.search(&vector, k).await?;

        Ok(hits
            .into_iter()
            .filter(|hit| self.segment_ids.contains(&hit.segment_id))
            .take(k)
            .collect())
    }

    pub fn len(&self) -> usize {
        self.segment_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segment_ids.is_empty()
    }
}
