use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::ollama::normalize_err_body;
use crate::services::{CompletionModel, Embedder};

/// OpenAI text completions and embeddings over plain HTTP.
#[derive(Clone)]
pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    answer_model: String,
    embedding_model: String,
    max_tokens: usize,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        answer_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            answer_model: answer_model.into(),
            embedding_model: embedding_model.into(),
            max_tokens: 2_000,
            temperature: 0.5,
        }
    }

    pub fn with_generation(mut self, max_tokens: usize, temperature: f32) -> Self {
        self.max_tokens = max_tokens;
        self.temperature = temperature;
        self
    }

    async fn post_json<Req: Serialize + ?Sized, Resp: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> Result<Resp> {
        let url = format!("{}/{endpoint}", self.base_url);
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("failed to call openai /{endpoint}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "openai /{endpoint} returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        response
            .json::<Resp>()
            .await
            .with_context(|| format!("failed to decode openai /{endpoint} response"))
    }
}

#[derive(Serialize)]
struct CompletionReq<'a> {
    model: &'a str,
    prompt: &'a str,
    temperature: f32,
    max_tokens: usize,
    top_p: f32,
    frequency_penalty: f32,
    presence_penalty: f32,
}

#[derive(Deserialize)]
struct CompletionResp {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    text: String,
}

#[derive(Serialize)]
struct EmbeddingReq<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResp {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl CompletionModel for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CompletionReq {
            model: &self.answer_model,
            prompt,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
        };

        let response: CompletionResp = self.post_json("completions", &request).await?;
        first_choice_text(response)
    }
}

#[async_trait]
impl Embedder for OpenAiClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = text.trim();
        if input.is_empty() {
            anyhow::bail!("cannot embed empty text input");
        }

        let request = EmbeddingReq {
            model: &self.embedding_model,
            input,
        };
        let response: EmbeddingResp = self.post_json("embeddings", &request).await?;

        response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .ok_or_else(|| anyhow::anyhow!("openai /embeddings returned no data"))
    }
}

fn first_choice_text(response: CompletionResp) -> Result<String> {
    response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.text.trim().to_string())
        .ok_or_else(|| anyhow::anyhow!("openai /completions returned no choices"))
}
