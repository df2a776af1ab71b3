use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;

use crate::models::{AnswerResult, QaRecord};

/// JSON array of every question asked in a run, rewritten on each append.
#[derive(Debug, Clone)]
pub struct QaTranscript {
    path: PathBuf,
}

impl QaTranscript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> Result<Vec<QaRecord>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(vec![]),
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("transcript {} is not valid JSON", self.path.display())),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(vec![]),
            Err(err) => Err(err)
                .with_context(|| format!("failed reading transcript {}", self.path.display())),
        }
    }

    pub async fn append(&self, question: &str, result: &AnswerResult) -> Result<QaRecord> {
        let mut records = self.load().await?;
        let record = QaRecord {
            question: question.to_string(),
            answer: result.answer_text.clone(),
            segment_id: result.cited_segment_id,
            page_number: result.cited_page_number,
            candidate_ids: result.candidate_ids.clone(),
            asked_at: Utc::now(),
        };
        records.push(record.clone());

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec_pretty(&records)?)
            .await
            .with_context(|| format!("failed writing transcript {}", self.path.display()))?;

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::AnswerOutcome;

    fn answered(text: &str, segment: Option<u32>) -> AnswerResult {
        AnswerResult {
            answer_text: text.to_string(),
            outcome: AnswerOutcome::Answered,
            cited_segment_id: segment,
            cited_text: None,
            cited_page_number: segment.map(|_| 2),
            candidate_ids: segment.into_iter().collect(),
        }
    }

    #[tokio::test]
    async fn appends_records_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = QaTranscript::new(dir.path().join("logs").join("qa.json"));

        transcript
            .append("Who approves the budget?", &answered("Finance.", Some(1)))
            .await
            .unwrap();
        transcript
            .append("Is there an exam?", &answered("Not stated.", None))
            .await
            .unwrap();

        let records = transcript.load().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].segment_id, Some(1));
        assert_eq!(records[0].page_number, Some(2));
        assert_eq!(records[1].question, "Is there an exam?");
        assert_eq!(records[1].segment_id, None);
    }

    #[tokio::test]
    async fn missing_file_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let transcript = QaTranscript::new(dir.path().join("absent.json"));
        assert!(transcript.load().await.unwrap().is_empty());
    }
}
