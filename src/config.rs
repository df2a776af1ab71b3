use std::env;
use std::str::FromStr;

use crate::ingest::ZeroOverlapPolicy;
use crate::ranking::{RankingMode, DEFAULT_QA_MAX_CANDIDATES, DEFAULT_QA_THRESHOLD, DEFAULT_TOP_K};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    Ollama,
}

impl FromStr for LlmProvider {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => anyhow::bail!("unknown LLM provider: {other}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VectorBackend {
    Memory,
    Qdrant,
}

impl FromStr for VectorBackend {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "qdrant" => Ok(Self::Qdrant),
            other => anyhow::bail!("unknown vector backend: {other}"),
        }
    }
}

/// Credentials handed to adapters at construction. Never written back to the
/// process environment.
#[derive(Clone, Default)]
pub struct ApiKeys {
    pub ai21: Option<String>,
    pub openai: Option<String>,
    pub huggingface: Option<String>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |key: &Option<String>| key.as_ref().map(|_| "<set>");
        f.debug_struct("ApiKeys")
            .field("ai21", &redact(&self.ai21))
            .field("openai", &redact(&self.openai))
            .field("huggingface", &redact(&self.huggingface))
            .finish()
    }
}

#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub ai21_base_url: String,
    pub openai_base_url: String,
    pub hf_inference_url: String,
    pub ollama_base_url: String,
    pub qdrant_base_url: String,
    pub qdrant_collection: String,
}

#[derive(Clone, Debug)]
pub struct ModelConfig {
    pub provider: LlmProvider,
    pub answer_model: String,
    pub embedding_model: String,
    pub max_output_tokens: usize,
    pub temperature: f32,
}

#[derive(Clone, Debug)]
pub struct RetrievalConfig {
    pub mode: RankingMode,
    pub vector_backend: VectorBackend,
    pub top_k: usize,
    pub qa_threshold: f32,
    pub qa_max_candidates: usize,
    pub zero_overlap: ZeroOverlapPolicy,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub keys: ApiKeys,
    pub endpoints: EndpointConfig,
    pub models: ModelConfig,
    pub retrieval: RetrievalConfig,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let provider = parsed_var("LLM_PROVIDER", LlmProvider::OpenAi);
        let (default_answer, default_embedding) = match provider {
            LlmProvider::OpenAi => ("gpt-3.5-turbo-instruct", "text-embedding-ada-002"),
            LlmProvider::Ollama => ("qwen2.5:7b-instruct", "mxbai-embed-large"),
        };

        Self {
            keys: ApiKeys {
                ai21: optional_var("AI21_API_KEY"),
                openai: optional_var("OPENAI_API_KEY"),
                huggingface: optional_var("HF_API_TOKEN"),
            },
            endpoints: EndpointConfig {
                ai21_base_url: env::var("AI21_BASE_URL")
                    .unwrap_or_else(|_| "https://api.ai21.com/studio/v1".to_string()),
                openai_base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                hf_inference_url: env::var("HF_INFERENCE_URL").unwrap_or_else(|_| {
                    "https://api-inference.huggingface.co/models/distilbert-base-cased-distilled-squad"
                        .to_string()
                }),
                ollama_base_url: env::var("OLLAMA_BASE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:11434".to_string()),
                qdrant_base_url: env::var("QDRANT_BASE_URL")
                    .unwrap_or_else(|_| "http://127.0.0.1:6333".to_string()),
                qdrant_collection: env::var("QDRANT_COLLECTION")
                    .unwrap_or_else(|_| "handout_segments".to_string()),
            },
            models: ModelConfig {
                provider,
                answer_model: env::var("ANSWER_MODEL")
                    .unwrap_or_else(|_| default_answer.to_string()),
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| default_embedding.to_string()),
                max_output_tokens: parsed_var("MAX_OUTPUT_TOKENS", 2_000),
                temperature: parsed_var("ANSWER_TEMPERATURE", 0.5),
            },
            retrieval: RetrievalConfig {
                mode: parsed_var("RANKING_MODE", RankingMode::Embedding),
                vector_backend: parsed_var("VECTOR_BACKEND", VectorBackend::Memory),
                top_k: parsed_var("RETRIEVAL_TOP_K", DEFAULT_TOP_K),
                qa_threshold: parsed_var("QA_SCORE_THRESHOLD", DEFAULT_QA_THRESHOLD),
                qa_max_candidates: parsed_var("QA_MAX_CANDIDATES", DEFAULT_QA_MAX_CANDIDATES),
                zero_overlap: parsed_var("ZERO_OVERLAP_POLICY", ZeroOverlapPolicy::FirstPage),
            },
        }
    }
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parsed_var<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_key_debug_is_redacted() {
        let keys = ApiKeys {
            ai21: Some("secret-ai21".to_string()),
            openai: None,
            huggingface: Some("hf_secret".to_string()),
        };

        let rendered = format!("{keys:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("<set>"));
    }

    #[test]
    fn parses_enums_case_insensitively() {
        assert_eq!("OpenAI".parse::<LlmProvider>().unwrap(), LlmProvider::OpenAi);
        assert_eq!(" qdrant ".parse::<VectorBackend>().unwrap(), VectorBackend::Qdrant);
        assert!("pinecone".parse::<VectorBackend>().is_err());
    }
}
