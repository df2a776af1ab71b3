use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::AssistantError;
use crate::models::RawSegment;
use crate::services::Segmenter;

/// AI21 Studio text segmentation.
#[derive(Clone)]
pub struct Ai21Segmenter {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SegmentationReq<'a> {
    source_type: &'static str,
    source: &'a str,
}

#[derive(Deserialize)]
struct SegmentationResp {
    #[serde(default)]
    segments: Vec<RawSegment>,
}

impl Ai21Segmenter {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Segmenter for Ai21Segmenter {
    async fn segment(&self, text: &str) -> Result<Vec<RawSegment>, AssistantError> {
        let url = format!("{}/segmentation", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(&SegmentationReq {
                source_type: "TEXT",
                source: text,
            })
            .send()
            .await
            .context("failed to call ai21 segmentation endpoint")
            .map_err(|err| AssistantError::collaborator("segment", err))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%status, "segmentation request rejected");
            return Err(AssistantError::SegmentationUnavailable {
                status: status.as_u16(),
            });
        }

        let body = response
            .json::<SegmentationResp>()
            .await
            .context("failed to decode ai21 segmentation response")
            .map_err(|err| AssistantError::collaborator("segment", err))?;

        tracing::info!(segments = body.segments.len(), "segmentation succeeded");
        Ok(body.segments)
    }
}
