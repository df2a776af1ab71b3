use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::services::{CompletionModel, Embedder};

/// Local Ollama server used for both embeddings and completions.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
    answer_model: String,
    embedding_model: String,
    num_predict: usize,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(
        base_url: impl Into<String>,
        answer_model: impl Into<String>,
        embedding_model: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            answer_model: answer_model.into(),
            embedding_model: embedding_model.into(),
            num_predict: 2_000,
            temperature: 0.5,
        }
    }

    pub fn with_generation(mut self, num_predict: usize, temperature: f32) -> Self {
        self.num_predict = num_predict;
        self.temperature = temperature;
        self
    }

    async fn embed_with_endpoint_fallback(&self, text: &str) -> Result<Vec<f32>> {
        // Newer Ollama releases use /api/embed; older ones only know /api/embeddings.
        match self.embed_modern(text).await {
            Ok(vector) => Ok(vector),
            Err(modern_err) => self.embed_legacy(text).await.map_err(|legacy_err| {
                anyhow::anyhow!(
                    "ollama embedding failed via /api/embed and /api/embeddings. \
                     modern error: {modern_err}; legacy error: {legacy_err}; \
                     ensure the embedding model is pulled (e.g. `ollama pull {}`)",
                    self.embedding_model
                )
            }),
        }
    }

    async fn embed_modern(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbedReq<'a> {
            model: &'a str,
            input: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbedResp {
            embeddings: Vec<Vec<f32>>,
        }

        let url = format!("{}/api/embed", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&EmbedReq {
                model: &self.embedding_model,
                input: text,
            })
            .send()
            .await
            .context("failed to call ollama embed endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "ollama /api/embed returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<EmbedResp>()
            .await
            .context("failed to decode ollama /api/embed response")?;

        response
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("ollama /api/embed returned empty embeddings array"))
    }

    async fn embed_legacy(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(Serialize)]
        struct EmbeddingReq<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        #[derive(Deserialize)]
        struct EmbeddingResp {
            embedding: Vec<f32>,
        }

        let url = format!("{}/api/embeddings", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&EmbeddingReq {
                model: &self.embedding_model,
                prompt: text,
            })
            .send()
            .await
            .context("failed to call ollama embeddings endpoint")?;

        if response.status() != StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "ollama /api/embeddings returned {status}: {}",
                normalize_err_body(&body)
            );
        }

        let response = response
            .json::<EmbeddingResp>()
            .await
            .context("failed to decode ollama embeddings response")?;

        Ok(response.embedding)
    }
}

#[async_trait]
impl Embedder for OllamaClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let input = text.trim();
        if input.is_empty() {
            anyhow::bail!("cannot embed empty text input");
        }
        self.embed_with_endpoint_fallback(input).await
    }
}

#[async_trait]
impl CompletionModel for OllamaClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        #[derive(Serialize)]
        struct GenerateReq<'a> {
            model: &'a str,
            prompt: &'a str,
            stream: bool,
            options: GenerateOptions,
        }

        #[derive(Serialize)]
        struct GenerateOptions {
            num_predict: usize,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct GenerateResp {
            response: String,
        }

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .client
            .post(url)
            .json(&GenerateReq {
                model: &self.answer_model,
                prompt,
                stream: false,
                options: GenerateOptions {
                    num_predict: self.num_predict,
                    temperature: self.temperature,
                },
            })
            .send()
            .await
            .context("failed to call ollama generate endpoint")?
            .error_for_status()
            .context("ollama generate returned non-success status")?
            .json::<GenerateResp>()
            .await
            .context("failed to decode ollama generate response")?;

        Ok(response.response.trim().to_string())
    }
}

/// Pulls the `error` field out of a JSON error body when there is one.
pub(crate) fn normalize_err_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    if let Ok(json) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(err) = json.get("error").and_then(|v| v.as_str()) {
            return err.to_string();
        }
        if let Some(err) = json
            .get("error")
            .and_then(|v| v.get("message"))
            .and_then(|v| v.as_str())
        {
            return err.to_string();
        }
    }

    trimmed.to_string()
}
