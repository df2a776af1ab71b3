pub mod ai21;
pub mod answer;
pub mod app;
pub mod config;
pub mod error;
pub mod highlight;
pub mod huggingface;
pub mod ingest;
pub mod models;
pub mod ollama;
pub mod openai;
pub mod prompt;
pub mod qdrant_store;
pub mod ranking;
pub mod retrieval;
pub mod services;
pub mod session;
pub mod transcript;

pub use app::build_session;
pub use config::AppConfig;
pub use error::AssistantError;
pub use session::SessionController;
