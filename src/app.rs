use std::sync::Arc;

use anyhow::{Context, Result};

use crate::ai21::Ai21Segmenter;
use crate::config::{AppConfig, LlmProvider, VectorBackend};
use crate::highlight::PageLineHighlighter;
use crate::huggingface::HfQaScorer;
use crate::ingest::pdf::PdfTextExtractor;
use crate::ollama::OllamaClient;
use crate::openai::OpenAiClient;
use crate::qdrant_store::QdrantStore;
use crate::ranking::{Ranker, RankingMode};
use crate::retrieval::{MemoryVectorStore, VectorStore};
use crate::services::{CompletionModel, DocumentExtractor, Embedder};
use crate::session::{Collaborators, SessionController};

/// Wires the configured adapters into a ready-to-use session.
pub fn build_session(config: &AppConfig) -> Result<SessionController> {
    let ai21_key = config
        .keys
        .ai21
        .clone()
        .context("AI21_API_KEY must be set for segmentation")?;

    let (embedder, completion) = language_model(config)?;

    let vector_store: Arc<dyn VectorStore> = match config.retrieval.vector_backend {
        VectorBackend::Memory => Arc::new(MemoryVectorStore::new()),
        VectorBackend::Qdrant => Arc::new(QdrantStore::new(
            config.endpoints.qdrant_base_url.clone(),
            config.endpoints.qdrant_collection.clone(),
        )),
    };

    let services = Collaborators {
        extractor: Arc::new(PdfTextExtractor::new()),
        segmenter: Arc::new(Ai21Segmenter::new(
            config.endpoints.ai21_base_url.clone(),
            ai21_key,
        )),
        embedder,
        vector_store,
        completion,
    };

    let session = SessionController::new(services, ranker(config))?
        .with_page_policy(config.retrieval.zero_overlap);
    Ok(session)
}

pub fn build_highlighter() -> PageLineHighlighter {
    let extractor: Arc<dyn DocumentExtractor> = Arc::new(PdfTextExtractor::new());
    PageLineHighlighter::new(extractor)
}

fn ranker(config: &AppConfig) -> Ranker {
    match config.retrieval.mode {
        RankingMode::Embedding => Ranker::embedding(config.retrieval.top_k),
        RankingMode::Extractive => Ranker::Extractive {
            scorer: Arc::new(HfQaScorer::new(
                config.endpoints.hf_inference_url.clone(),
                config.keys.huggingface.clone(),
            )),
            threshold: config.retrieval.qa_threshold,
            max_candidates: config.retrieval.qa_max_candidates,
        },
    }
}

fn language_model(config: &AppConfig) -> Result<(Arc<dyn Embedder>, Arc<dyn CompletionModel>)> {
    let models = &config.models;
    match models.provider {
        LlmProvider::OpenAi => {
            let key = config
                .keys
                .openai
                .clone()
                .context("OPENAI_API_KEY must be set when LLM_PROVIDER=openai")?;
            let client = OpenAiClient::new(
                config.endpoints.openai_base_url.clone(),
                key,
                models.answer_model.clone(),
                models.embedding_model.clone(),
            )
            .with_generation(models.max_output_tokens, models.temperature);
            let embedder: Arc<dyn Embedder> = Arc::new(client.clone());
            let completion: Arc<dyn CompletionModel> = Arc::new(client);
            Ok((embedder, completion))
        }
        LlmProvider::Ollama => {
            let client = OllamaClient::new(
                config.endpoints.ollama_base_url.clone(),
                models.answer_model.clone(),
                models.embedding_model.clone(),
            )
            .with_generation(models.max_output_tokens, models.temperature);
            let embedder: Arc<dyn Embedder> = Arc::new(client.clone());
            let completion: Arc<dyn CompletionModel> = Arc::new(client);
            Ok((embedder, completion))
        }
    }
}
