use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

use crate::answer::{AnswerExtractor, Citation};
use crate::error::AssistantError;
use crate::ingest::{SegmentStore, ZeroOverlapPolicy};
use crate::models::{AnswerOutcome, AnswerResult, RankedCandidate};
use crate::prompt::build_prompt;
use crate::ranking::Ranker;
use crate::retrieval::{RetrievalIndex, VectorStore};
use crate::services::{CompletionModel, DocumentExtractor, Embedder, Segmenter};

pub const INSUFFICIENT_MESSAGE: &str =
    "I couldn't find enough relevant information to answer your question.";

/// Everything the session needs to talk to the outside world.
pub struct Collaborators {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub segmenter: Arc<dyn Segmenter>,
    pub embedder: Arc<dyn Embedder>,
    pub vector_store: Arc<dyn VectorStore>,
    pub completion: Arc<dyn CompletionModel>,
}

/// Segments and index of one document. Built together, dropped together.
pub struct LoadedDocument {
    path: PathBuf,
    store: SegmentStore,
    index: Option<RetrievalIndex>,
}

impl LoadedDocument {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> &SegmentStore {
        &self.store
    }

    pub fn index(&self) -> Option<&RetrievalIndex> {
        self.index.as_ref()
    }
}

pub enum SessionState {
    Unloaded,
    Ready(LoadedDocument),
}

/// Answers questions about one PDF at a time, reusing segmentation and
/// indexing work while the same path is asked about. Callers issue questions
/// serially; there is exactly one writer of the cached document.
pub struct SessionController {
    services: Collaborators,
    ranker: Ranker,
    extractor: AnswerExtractor,
    page_policy: ZeroOverlapPolicy,
    state: SessionState,
}

impl SessionController {
    pub fn new(services: Collaborators, ranker: Ranker) -> Result<Self> {
        Ok(Self {
            services,
            ranker,
            extractor: AnswerExtractor::new()?,
            page_policy: ZeroOverlapPolicy::default(),
            state: SessionState::Unloaded,
        })
    }

    pub fn with_page_policy(mut self, policy: ZeroOverlapPolicy) -> Self {
        self.page_policy = policy;
        self
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn current_document(&self) -> Option<&LoadedDocument> {
        match &self.state {
            SessionState::Ready(doc) => Some(doc),
            SessionState::Unloaded => None,
        }
    }

    /// Loads `path` unless it is already the ready document.
    pub async fn load_document(&mut self, path: &Path) -> Result<(), AssistantError> {
        let doc = self.take_or_load(path).await?;
        self.state = SessionState::Ready(doc);
        Ok(())
    }

    /// Takes the cached document out of the session when it matches `path`,
    /// otherwise loads a fresh one. The session is `Unloaded` until the caller
    /// puts the document back, so a failed load never leaves stale segments
    /// behind.
    async fn take_or_load(&mut self, path: &Path) -> Result<LoadedDocument, AssistantError> {
        match std::mem::replace(&mut self.state, SessionState::Unloaded) {
            SessionState::Ready(doc) if doc.path == path => {
                tracing::debug!(path = %path.display(), "reusing cached segments and index");
                Ok(doc)
            }
            _ => self.load(path).await,
        }
    }

    async fn load(&self, path: &Path) -> Result<LoadedDocument, AssistantError> {
        tracing::info!(path = %path.display(), "loading document");

        let document = self
            .services
            .extractor
            .extract(path)
            .await
            .map_err(|err| AssistantError::collaborator("extract", err))?;
        if document.full_text.trim().is_empty() {
            return Err(AssistantError::EmptyDocument {
                path: path.to_path_buf(),
            });
        }

        let store = SegmentStore::build(
            self.services.segmenter.as_ref(),
            &document.full_text,
            &document.pages,
            self.page_policy,
        )
        .await?;

        let index = if self.ranker.needs_index() {
            let index = RetrievalIndex::build(
                store.segments(),
                Arc::clone(&self.services.embedder),
                Arc::clone(&self.services.vector_store),
            )
            .await
            .map_err(|err| AssistantError::collaborator("index", err))?;
            Some(index)
        } else {
            None
        };

        Ok(LoadedDocument {
            path: path.to_path_buf(),
            store,
            index,
        })
    }

    pub async fn process_pdf_and_get_answer(
        &mut self,
        path: &Path,
        question: &str,
    ) -> Result<AnswerResult, AssistantError> {
        let doc = self.take_or_load(path).await?;
        let result = self.answer(&doc, question).await;
        self.state = SessionState::Ready(doc);
        result
    }

    async fn answer(
        &self,
        doc: &LoadedDocument,
        question: &str,
    ) -> Result<AnswerResult, AssistantError> {
        let candidates = self
            .ranker
            .rank(question, &doc.store, doc.index.as_ref())
            .await
            .map_err(|err| {
                let stage = if self.ranker.needs_index() { "embed" } else { "score" };
                AssistantError::collaborator(stage, err)
            })?;

        if candidates.is_empty() {
            tracing::info!("no segment qualified; skipping completion");
            return Ok(insufficient());
        }

        let prompt = build_prompt(question, &candidates);
        let completion = self
            .services
            .completion
            .complete(&prompt)
            .await
            .map_err(|err| AssistantError::collaborator("complete", err))?;

        let extracted = self.extractor.extract(&completion);
        Ok(resolve_citation(
            &doc.store,
            &candidates,
            extracted.answer,
            extracted.citation,
        ))
    }
}

fn insufficient() -> AnswerResult {
    AnswerResult {
        answer_text: INSUFFICIENT_MESSAGE.to_string(),
        outcome: AnswerOutcome::Insufficient,
        cited_segment_id: None,
        cited_text: None,
        cited_page_number: None,
        candidate_ids: vec![],
    }
}

fn resolve_citation(
    store: &SegmentStore,
    candidates: &[RankedCandidate<'_>],
    answer_text: String,
    citation: Citation,
) -> AnswerResult {
    let candidate_ids = candidates.iter().map(|c| c.segment.id).collect();
    let cited = match &citation {
        Citation::Found(id) => {
            let segment = store.get(*id);
            if segment.is_none() {
                tracing::warn!(segment_id = id, "completion cited an unknown segment");
            }
            segment
        }
        Citation::Malformed(marker) => {
            tracing::warn!(%marker, "could not parse citation marker");
            None
        }
        Citation::Missing => {
            tracing::debug!("completion carried no citation");
            None
        }
    };

    AnswerResult {
        answer_text,
        outcome: AnswerOutcome::Answered,
        cited_segment_id: cited.map(|segment| segment.id),
        cited_text: cited.map(|segment| segment.text.clone()),
        cited_page_number: cited.and_then(|segment| segment.page_number),
        candidate_ids,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::{ExtractedDocument, PageText, RawSegment};
    use crate::ranking::tests::TableScorer;
    use crate::retrieval::tests::KeywordEmbedder;
    use crate::retrieval::MemoryVectorStore;

    struct FakeExtractor {
        docs: HashMap<PathBuf, Vec<&'static str>>,
    }

    #[async_trait]
    impl DocumentExtractor for FakeExtractor {
        async fn extract(&self, path: &Path) -> Result<ExtractedDocument> {
            let pages = self
                .docs
                .get(path)
                .ok_or_else(|| anyhow::anyhow!("no such document"))?;
            let pages: Vec<PageText> = pages
                .iter()
                .enumerate()
                .map(|(idx, text)| PageText::from_zero_based(idx as u32, *text))
                .collect();
            Ok(ExtractedDocument {
                path: path.to_path_buf(),
                full_text: pages
                    .iter()
                    .map(|p| p.text.as_str())
                    .collect::<Vec<_>>()
                    .join("\n"),
                pages,
            })
        }
    }

    /// One segment per sentence-terminated line; can be told to fail.
    #[derive(Default)]
    struct CountingSegmenter {
        calls: AtomicUsize,
        fail_with: Mutex<Option<u16>>,
    }

    #[async_trait]
    impl Segmenter for CountingSegmenter {
        async fn segment(&self, text: &str) -> Result<Vec<RawSegment>, AssistantError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(status) = *self.fail_with.lock().unwrap() {
                return Err(AssistantError::SegmentationUnavailable { status });
            }
            Ok(text
                .split_inclusive(". ")
                .flat_map(|part| part.split('\n'))
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(|part| RawSegment {
                    segment_text: part.to_string(),
                    segment_type: None,
                })
                .collect())
        }
    }

    struct ScriptedCompletion {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl CompletionModel for ScriptedCompletion {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    struct Harness {
        segmenter: Arc<CountingSegmenter>,
        completion: Arc<ScriptedCompletion>,
    }

    const HANDOUT: &str = "handout.pdf";
    const SYLLABUS: &str = "syllabus.pdf";

    fn documents() -> HashMap<PathBuf, Vec<&'static str>> {
        HashMap::from([
            (
                PathBuf::from(HANDOUT),
                vec![
                    "The budget is approved by finance. Risk owners track every risk.",
                    "The evaluation findings are documented in the closure report.",
                ],
            ),
            (
                PathBuf::from(SYLLABUS),
                vec!["Week one covers the schedule baseline."],
            ),
        ])
    }

    fn controller(ranker: Ranker, reply: &str) -> (SessionController, Harness) {
        let segmenter = Arc::new(CountingSegmenter::default());
        let completion = Arc::new(ScriptedCompletion {
            reply: reply.to_string(),
            prompts: Mutex::new(vec![]),
        });
        let services = Collaborators {
            extractor: Arc::new(FakeExtractor { docs: documents() }),
            segmenter: Arc::clone(&segmenter) as Arc<dyn Segmenter>,
            embedder: Arc::new(KeywordEmbedder),
            vector_store: Arc::new(MemoryVectorStore::new()),
            completion: Arc::clone(&completion) as Arc<dyn CompletionModel>,
        };
        let controller = SessionController::new(services, ranker).unwrap();
        (
            controller,
            Harness {
                segmenter,
                completion,
            },
        )
    }

    fn qa_ranker(scores: &[(&str, f32)]) -> Ranker {
        Ranker::extractive(Arc::new(TableScorer {
            scores: scores
                .iter()
                .map(|(text, score)| (text.to_string(), *score))
                .collect(),
        }))
    }

    #[tokio::test]
    async fn end_to_end_extractive_answer_resolves_page() {
        let ranker = qa_ranker(&[
            ("The budget is approved by finance.", 0.3),
            ("Risk owners track every risk.", 0.8),
        ]);
        let (mut session, harness) = controller(ranker, "X. <ID: 2>\nextra reasoning");

        let result = session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "Who tracks risk?")
            .await
            .unwrap();

        assert_eq!(result.answer_text, "X.");
        assert_eq!(result.outcome, AnswerOutcome::Answered);
        assert_eq!(result.cited_segment_id, Some(2));
        assert_eq!(
            result.cited_text.as_deref(),
            Some("Risk owners track every risk.")
        );
        assert_eq!(result.cited_page_number, Some(1));
        assert_eq!(result.candidate_ids, vec![2]);

        let prompts = harness.completion.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("2. \"Risk owners track every risk.\""));
        assert!(!prompts[0].contains("1. \"The budget"));
    }

    #[tokio::test]
    async fn same_path_segments_only_once() {
        let (mut session, harness) = controller(Ranker::embedding(2), "Finance. <ID: 1>");

        for question in ["Who approves the budget?", "Where are findings documented?"] {
            session
                .process_pdf_and_get_answer(Path::new(HANDOUT), question)
                .await
                .unwrap();
        }

        assert_eq!(harness.segmenter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(harness.completion.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn switching_documents_rebuilds_and_drops_old_segments() {
        let (mut session, harness) = controller(Ranker::embedding(2), "Answer. <ID: 3>");

        let first = session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "Where are findings documented?")
            .await
            .unwrap();
        assert_eq!(first.cited_segment_id, Some(3));

        let second = session
            .process_pdf_and_get_answer(Path::new(SYLLABUS), "What does week one cover?")
            .await
            .unwrap();

        assert_eq!(harness.segmenter.calls.load(Ordering::SeqCst), 2);
        let doc = session.current_document().unwrap();
        assert_eq!(doc.path(), Path::new(SYLLABUS));
        assert_eq!(doc.store().len(), 1);
        assert_eq!(doc.index().map(RetrievalIndex::len), Some(1));
        // Segment 3 existed only in the previous document.
        assert_eq!(second.cited_segment_id, None);
        assert_eq!(second.cited_text, None);
        assert_eq!(second.candidate_ids, vec![1]);
    }

    #[tokio::test]
    async fn segmentation_failure_leaves_nothing_cached() {
        let (mut session, harness) = controller(Ranker::embedding(2), "Finance. <ID: 1>");
        *harness.segmenter.fail_with.lock().unwrap() = Some(503);

        let err = session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "Who approves the budget?")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AssistantError::SegmentationUnavailable { status: 503 }
        ));
        assert!(err.is_load_failure());
        assert!(matches!(session.state(), SessionState::Unloaded));

        *harness.segmenter.fail_with.lock().unwrap() = None;
        let result = session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "Who approves the budget?")
            .await
            .unwrap();

        assert_eq!(harness.segmenter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.cited_segment_id, Some(1));
    }

    #[tokio::test]
    async fn failed_switch_discards_previous_document() {
        let (mut session, harness) = controller(Ranker::embedding(2), "Finance. <ID: 1>");
        session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "Who approves the budget?")
            .await
            .unwrap();

        *harness.segmenter.fail_with.lock().unwrap() = Some(500);
        let err = session
            .process_pdf_and_get_answer(Path::new(SYLLABUS), "What does week one cover?")
            .await;

        assert!(err.is_err());
        assert!(session.current_document().is_none());
    }

    #[tokio::test]
    async fn no_candidates_skips_the_language_model() {
        let (mut session, harness) = controller(qa_ranker(&[]), "should never be used <ID: 1>");

        let result = session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "What is the capital of France?")
            .await
            .unwrap();

        assert_eq!(result.answer_text, INSUFFICIENT_MESSAGE);
        assert_eq!(result.outcome, AnswerOutcome::Insufficient);
        assert_eq!(result.cited_segment_id, None);
        assert_eq!(result.cited_text, None);
        assert_eq!(result.cited_page_number, None);
        assert!(harness.completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn uncited_answer_has_no_citation_fields() {
        let (mut session, _harness) = controller(Ranker::embedding(2), "Answer: Finance approves it.");

        let result = session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "Who approves the budget?")
            .await
            .unwrap();

        assert_eq!(result.answer_text, "Finance approves it.");
        assert_eq!(result.outcome, AnswerOutcome::Answered);
        assert_eq!(result.cited_segment_id, None);
        assert_eq!(result.cited_page_number, None);
    }

    #[tokio::test]
    async fn extractive_mode_builds_no_index() {
        let ranker = qa_ranker(&[("Risk owners track every risk.", 0.9)]);
        let (mut session, _harness) = controller(ranker, "Owners. <ID: 2>");

        session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "Who tracks risk?")
            .await
            .unwrap();

        assert!(session.current_document().unwrap().index().is_none());
    }

    /// Embeds document segments but refuses questions.
    struct QuestionRejectingEmbedder;

    #[async_trait]
    impl Embedder for QuestionRejectingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if text.ends_with('?') {
                anyhow::bail!("embedding service timed out");
            }
            KeywordEmbedder.embed(text).await
        }
    }

    #[tokio::test]
    async fn question_embedding_failure_is_tagged_embed_and_keeps_document() {
        let completion = Arc::new(ScriptedCompletion {
            reply: "unused".to_string(),
            prompts: Mutex::new(vec![]),
        });
        let services = Collaborators {
            extractor: Arc::new(FakeExtractor { docs: documents() }),
            segmenter: Arc::new(CountingSegmenter::default()),
            embedder: Arc::new(QuestionRejectingEmbedder),
            vector_store: Arc::new(MemoryVectorStore::new()),
            completion: Arc::clone(&completion) as Arc<dyn CompletionModel>,
        };
        let mut session = SessionController::new(services, Ranker::embedding(2)).unwrap();

        let err = session
            .process_pdf_and_get_answer(Path::new(HANDOUT), "Who tracks risk?")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AssistantError::Collaborator { stage: "embed", .. }
        ));
        assert!(!err.is_load_failure());
        assert!(session.current_document().is_some());
        assert!(completion.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn extraction_failure_is_a_collaborator_error() {
        let (mut session, _harness) = controller(Ranker::embedding(2), "x");

        let err = session
            .process_pdf_and_get_answer(Path::new("missing.pdf"), "q?")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AssistantError::Collaborator {
                stage: "extract",
                ..
            }
        ));
        assert!(err.is_load_failure());
    }
}
