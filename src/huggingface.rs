use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ollama::normalize_err_body;
use crate::services::ExtractiveScorer;

/// Extractive question answering on a Hugging Face inference endpoint
/// (a SQuAD-distilled model by default). Only the confidence is used.
#[derive(Clone)]
pub struct HfQaScorer {
    client: Client,
    endpoint: String,
    token: Option<String>,
}

#[derive(Serialize)]
struct QaReq<'a> {
    inputs: QaInputs<'a>,
}

#[derive(Serialize)]
struct QaInputs<'a> {
    question: &'a str,
    context: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum QaResp {
    Single(QaAnswer),
    Many(Vec<QaAnswer>),
}

#[derive(Deserialize)]
struct QaAnswer {
    score: f32,
}

impl HfQaScorer {
    pub fn new(endpoint: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            token,
        }
    }
}

#[async_trait]
impl ExtractiveScorer for HfQaScorer {
    async fn score(&self, question: &str, context: &str) -> Result<f32> {
        let mut request = self.client.post(&self.endpoint).json(&QaReq {
            inputs: QaInputs { question, context },
        });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .context("failed to call question-answering endpoint")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "question-answering endpoint returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let body = response
            .json::<QaResp>()
            .await
            .context("failed to decode question-answering response")?;
        Ok(best_score(body))
    }
}

fn best_score(response: QaResp) -> f32 {
    let score = match response {
        QaResp::Single(answer) => answer.score,
        QaResp::Many(answers) => answers
            .into_iter()
            .map(|answer| answer.score)
            .fold(0.0, f32::max),
    };
    score.clamp(0.0, 1.0)
}
