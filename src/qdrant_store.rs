use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::retrieval::{IndexedVector, VectorHit, VectorStore};

const UPSERT_BATCH: usize = 64;

/// Qdrant collection holding the current document's segment vectors. The
/// collection is dropped and recreated on every document load.
#[derive(Clone)]
pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
}

impl QdrantStore {
    pub fn new(base_url: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            collection: collection.into(),
        }
    }

    fn collection_url(&self) -> String {
        format!("{}/collections/{}", self.base_url, self.collection)
    }

    async fn recreate_collection(&self, vector_size: usize) -> Result<()> {
        // Missing collection is fine here.
        let _ = self.client.delete(self.collection_url()).send().await;

        let payload = json!({
            "vectors": {
                "size": vector_size,
                "distance": "Cosine"
            }
        });

        self.client
            .put(self.collection_url())
            .json(&payload)
            .send()
            .await
            .context("failed to contact qdrant while creating collection")?
            .error_for_status()
            .context("qdrant failed to create collection")?;

        Ok(())
    }

    async fn upsert_points(&self, points: &[QdrantPoint]) -> Result<()> {
        let url = format!("{}/points?wait=true", self.collection_url());

        self.client
            .put(url)
            .json(&json!({ "points": points }))
            .send()
            .await
            .context("failed to contact qdrant during upsert")?
            .error_for_status()
            .context("qdrant upsert returned non-success status")?;

        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    async fn replace_all(&self, points: Vec<IndexedVector>) -> Result<()> {
        let Some(first) = points.first() else {
            let _ = self.client.delete(self.collection_url()).send().await;
            return Ok(());
        };
        self.recreate_collection(first.vector.len()).await?;

        let points: Vec<QdrantPoint> = points.into_iter().map(QdrantPoint::from).collect();
        for batch in points.chunks(UPSERT_BATCH) {
            self.upsert_points(batch).await?;
        }

        Ok(())
    }

    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<VectorHit>> {
        if vector.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/points/search", self.collection_url());
        let body = json!({
            "vector": vector,
            "limit": limit,
            "with_payload": true,
        });

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .context("failed to contact qdrant during search")?
            .error_for_status()
            .context("qdrant search returned non-success status")?
            .json::<QdrantSearchResponse>()
            .await
            .context("failed to decode qdrant search response")?;

        Ok(hits_from_response(response))
    }
}

fn hits_from_response(response: QdrantSearchResponse) -> Vec<VectorHit> {
    response
        .result
        .into_iter()
        .filter_map(|point| {
            let payload = point.payload?;
            Some(VectorHit {
                segment_id: payload.segment_id,
                score: point.score,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
struct QdrantPoint {
    id: u64,
    vector: Vec<f32>,
    payload: QdrantPayload,
}

impl From<IndexedVector> for QdrantPoint {
    fn from(point: IndexedVector) -> Self {
        Self {
            id: u64::from(point.segment_id),
            vector: point.vector,
            payload: QdrantPayload {
                segment_id: point.segment_id,
                page_number: point.page_number,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct QdrantPayload {
    segment_id: u32,
    page_number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct QdrantSearchResponse {
    result: Vec<QdrantResultPoint>,
}

#[derive(Debug, Deserialize)]
struct QdrantResultPoint {
    #[serde(default)]
    score: Option<f32>,
    payload: Option<QdrantPayload>,
}
