use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssistantError {
    #[error("segmentation service unavailable (status {status})")]
    SegmentationUnavailable { status: u16 },
    #[error("no text could be extracted from {}", .path.display())]
    EmptyDocument { path: PathBuf },
    #[error("{stage} call failed: {source:#}")]
    Collaborator {
        stage: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl AssistantError {
    pub fn collaborator(stage: &'static str, source: anyhow::Error) -> Self {
        Self::Collaborator { stage, source }
    }

    /// True when the failure happened while loading a document, meaning nothing
    /// was cached and the next call will reload from scratch.
    pub fn is_load_failure(&self) -> bool {
        match self {
            Self::SegmentationUnavailable { .. } | Self::EmptyDocument { .. } => true,
            Self::Collaborator { stage, .. } => {
                matches!(*stage, "extract" | "segment" | "index")
            }
        }
    }
}
