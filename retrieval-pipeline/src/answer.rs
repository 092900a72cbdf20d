use std::{sync::Arc, time::Instant};

use common::{
    error::AppError,
    storage::{chunk_store::ChunkStore, types::hit::Hit},
    utils::{embedding::Embedder, generation::AnswerGenerator},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use crate::{
    config::RetrievalTuning,
    context::build_context,
    post_process::{
        dedupe_sources, retrieval_stats, sources_from_hits, with_image_callout, CitationLinker,
        ConfidenceBadge, ConfidenceThresholds, RetrievalStats, Source, SourceGroup,
    },
    prompt::{build_prompt, AssistanceLevel, InteractionMode, SYSTEM_INSTRUCTION},
    retriever::{RetrievalMethod, Retriever},
};

pub const EMPTY_COURSE_ANSWER: &str = "This course has no indexed materials yet.";
pub const NO_MATCH_ANSWER: &str =
    "I couldn't find any course materials matching your query. Try rephrasing or uploading more notes.";
pub const EMPTY_GENERATION_ANSWER: &str = "Unable to generate an answer.";

/// Steps of a single answer request, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnswerStage {
    CheckCorpus,
    Retrieve,
    Empty,
    HasContext,
    Generate,
    PostProcess,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub course_id: String,
    pub question: String,
    #[serde(default)]
    pub assistance_level: AssistanceLevel,
    #[serde(default)]
    pub mode: InteractionMode,
    #[serde(default)]
    pub k: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerMeta {
    pub assistance_level: AssistanceLevel,
    pub mode: InteractionMode,
    pub retrieval: RetrievalStats,
    pub retrieval_method: RetrievalMethod,
    pub confidence: ConfidenceBadge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerResponse {
    pub answer: String,
    pub sources: Vec<Source>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_dedup: Option<Vec<SourceGroup>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<AnswerMeta>,
}

impl AnswerResponse {
    fn terminal(answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            sources: Vec::new(),
            sources_dedup: None,
            meta: None,
        }
    }
}

/// Retrieval-augmented answering over one course's materials.
pub struct AnswerService {
    store: Arc<dyn ChunkStore>,
    retriever: Retriever,
    generator: Arc<dyn AnswerGenerator>,
    tuning: RetrievalTuning,
    linker: CitationLinker,
}

impl AnswerService {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: Embedder,
        generator: Arc<dyn AnswerGenerator>,
        tuning: RetrievalTuning,
    ) -> Result<Self, AppError> {
        let linker = CitationLinker::new()
            .map_err(|err| AppError::InternalError(format!("citation pattern: {err}")))?;
        Ok(Self {
            retriever: Retriever::new(Arc::clone(&store), embedder),
            store,
            generator,
            tuning,
            linker,
        })
    }

    pub const fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub const fn tuning(&self) -> &RetrievalTuning {
        &self.tuning
    }

    /// Top vector hits for a query without generating anything.
    pub async fn preview(
        &self,
        course_id: &str,
        query: &str,
        k: Option<usize>,
    ) -> Result<Vec<Hit>, AppError> {
        let k = k.filter(|k| *k > 0).unwrap_or(self.tuning.preview_k);
        self.retriever.retrieve_vector(course_id, query, k).await
    }

    #[instrument(skip_all, fields(course_id = %request.course_id, level = %request.assistance_level, mode = %request.mode))]
    pub async fn answer_question(&self, request: AnswerRequest) -> Result<AnswerResponse, AppError> {
        let question = request.question.trim();
        if question.is_empty() {
            return Err(AppError::Validation("Question must not be empty".into()));
        }
        let started = Instant::now();

        debug!(stage = ?AnswerStage::CheckCorpus);
        let chunk_count = self.store.count_chunks(&request.course_id).await?;
        if chunk_count == 0 {
            info!("Course has no indexed chunks");
            return Ok(AnswerResponse::terminal(EMPTY_COURSE_ANSWER));
        }

        let profile = request.assistance_level.profile();
        let k = request.k.filter(|k| *k > 0).unwrap_or(profile.k);

        debug!(stage = ?AnswerStage::Retrieve, k);
        let retrieval = self
            .retriever
            .retrieve_with_fallback(&request.course_id, question, k, self.tuning.hybrid_alpha)
            .await?;
        if retrieval.hits.is_empty() {
            debug!(stage = ?AnswerStage::Empty);
            return Ok(AnswerResponse::terminal(NO_MATCH_ANSWER));
        }

        debug!(stage = ?AnswerStage::HasContext, hits = retrieval.hits.len());
        let context = build_context(&retrieval.hits, &self.tuning);
        let prompt = build_prompt(question, request.assistance_level, request.mode, &context);

        debug!(stage = ?AnswerStage::Generate, prompt_chars = prompt.len());
        let generated = self
            .generator
            .generate(SYSTEM_INSTRUCTION, &prompt, profile.temperature)
            .await?;
        let generated = generated.trim();
        let generated = if generated.is_empty() {
            EMPTY_GENERATION_ANSWER
        } else {
            generated
        };

        debug!(stage = ?AnswerStage::PostProcess);
        let sources = sources_from_hits(&retrieval.hits);
        let answer = self
            .linker
            .link(&with_image_callout(generated, &sources), &sources);
        let sources_dedup = dedupe_sources(&sources);
        let stats = retrieval_stats(&retrieval.hits);
        let confidence = ConfidenceBadge::grade(
            stats.score_mean,
            ConfidenceThresholds::from(&self.tuning),
        );

        info!(
            stage = ?AnswerStage::Done,
            method = %retrieval.method,
            chunks_used = stats.chunks_used,
            docs_used = stats.docs_used,
            confidence = %confidence,
            elapsed = ?started.elapsed(),
            "Answer generated"
        );

        Ok(AnswerResponse {
            answer,
            sources,
            sources_dedup: Some(sources_dedup),
            meta: Some(AnswerMeta {
                assistance_level: request.assistance_level,
                mode: request.mode,
                retrieval: stats,
                retrieval_method: retrieval.method,
                confidence,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retriever::testing::{embedder, raw_hit, ScriptedStore};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Mutex;

    struct MockGenerator {
        reply: String,
        calls: Mutex<Vec<(String, f32)>>,
    }

    impl MockGenerator {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl AnswerGenerator for MockGenerator {
        async fn generate(
            &self,
            system_instruction: &str,
            prompt: &str,
            temperature: f32,
        ) -> Result<String, AppError> {
            assert_eq!(system_instruction, SYSTEM_INSTRUCTION);
            self.calls
                .lock()
                .await
                .push((prompt.to_string(), temperature));
            Ok(self.reply.clone())
        }
    }

    fn request(level: AssistanceLevel) -> AnswerRequest {
        AnswerRequest {
            course_id: "course-1".into(),
            question: "How does heat diffuse?".into(),
            assistance_level: level,
            mode: InteractionMode::Worked,
            k: None,
        }
    }

    fn service(store: Arc<ScriptedStore>, generator: Arc<MockGenerator>) -> AnswerService {
        AnswerService::new(store, embedder(), generator, RetrievalTuning::default())
            .expect("service")
    }

    #[tokio::test]
    async fn empty_course_short_circuits() {
        let store = Arc::new(ScriptedStore::new(0, Vec::new(), Vec::new()));
        let generator = MockGenerator::new("unused");
        let service = service(store.clone(), generator.clone());

        let response = service
            .answer_question(request(AssistanceLevel::ExamPrep))
            .await
            .expect("answer");

        assert_eq!(response.answer, EMPTY_COURSE_ANSWER);
        assert!(response.sources.is_empty());
        assert!(response.meta.is_none());
        assert_eq!(*store.calls.lock().await, vec!["count_chunks"]);
        assert!(generator.calls.lock().await.is_empty());

        let body = serde_json::to_value(&response).expect("serialize");
        assert_eq!(body, json!({ "answer": EMPTY_COURSE_ANSWER, "sources": [] }));
    }

    #[tokio::test]
    async fn no_hits_never_calls_generator() {
        let store = Arc::new(ScriptedStore::new(4, Vec::new(), Vec::new()));
        let generator = MockGenerator::new("unused");
        let service = service(store.clone(), generator.clone());

        let response = service
            .answer_question(request(AssistanceLevel::Novice))
            .await
            .expect("answer");

        assert_eq!(response.answer, NO_MATCH_ANSWER);
        assert!(response.sources.is_empty());
        assert!(response.sources_dedup.is_none());
        assert_eq!(
            *store.calls.lock().await,
            vec!["count_chunks", "vector_search", "hybrid_search"]
        );
        assert!(generator.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn no_vector_hits_and_no_hybrid_support_gives_no_match_answer() {
        let store = Arc::new(ScriptedStore::without_hybrid(4, Vec::new()));
        let generator = MockGenerator::new("unused");
        let service = service(store.clone(), generator.clone());

        let response = service
            .answer_question(request(AssistanceLevel::ExamPrep))
            .await
            .expect("answer");

        assert_eq!(response.answer, NO_MATCH_ANSWER);
        assert!(response.sources.is_empty());
        assert!(response.meta.is_none());
        assert_eq!(
            *store.calls.lock().await,
            vec!["count_chunks", "vector_search", "hybrid_search"]
        );
        assert!(generator.calls.lock().await.is_empty());
    }

    #[tokio::test]
    async fn same_document_hits_collapse_into_one_medium_confidence_group() {
        let store = Arc::new(ScriptedStore::new(
            3,
            vec![
                raw_hit("c1", "d1", json!(0.9)),
                raw_hit("c2", "d1", json!("0.5")),
                raw_hit("c3", "d1", json!(0.5)),
            ],
            Vec::new(),
        ));
        let generator = MockGenerator::new("**TL;DR**: It spreads out [1].\n\nDetails [2][3].");
        let service = service(store, generator.clone());

        let response = service
            .answer_question(request(AssistanceLevel::Advanced))
            .await
            .expect("answer");

        let meta = response.meta.expect("meta");
        assert_eq!(meta.confidence, ConfidenceBadge::Medium);
        assert_eq!(meta.retrieval.score_mean, Some(0.633));
        assert_eq!(meta.retrieval_method, RetrievalMethod::Vector);

        let groups = response.sources_dedup.expect("dedup");
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].markers, vec!["[1]", "[2]", "[3]"]);
        assert_eq!(groups[0].best_score, Some(0.9));

        assert_eq!(response.sources.len(), 3);
        assert!(response
            .answer
            .contains("[[1]](http://files/d1.pdf#page=1)"));

        let calls = generator.calls.lock().await;
        assert_eq!(calls.len(), 1);
        let (prompt, temperature) = &calls[0];
        assert!((temperature - 0.3).abs() < f32::EPSILON);
        assert!(prompt.contains("[1] Doc d1 — p.1\nText of c1"));
        assert!(prompt.contains("[3] Doc d1 — p.1\nText of c3"));
    }

    #[tokio::test]
    async fn explicit_k_limits_hits() {
        let store = Arc::new(ScriptedStore::new(
            3,
            vec![
                raw_hit("c1", "d1", json!(0.9)),
                raw_hit("c2", "d2", json!(0.8)),
                raw_hit("c3", "d3", json!(0.7)),
            ],
            Vec::new(),
        ));
        let service = service(store, MockGenerator::new("Answer [1]."));

        let response = service
            .answer_question(AnswerRequest {
                k: Some(2),
                ..request(AssistanceLevel::Novice)
            })
            .await
            .expect("answer");

        assert_eq!(response.sources.len(), 2);
        assert_eq!(response.sources[1].marker, "[2]");
    }

    #[tokio::test]
    async fn blank_generation_gets_fallback_text() {
        let store = Arc::new(ScriptedStore::new(1, vec![raw_hit("c1", "d1", json!(0.8))], Vec::new()));
        let service = service(store, MockGenerator::new("   "));

        let response = service
            .answer_question(request(AssistanceLevel::ExamPrep))
            .await
            .expect("answer");

        assert_eq!(response.answer, EMPTY_GENERATION_ANSWER);
        assert_eq!(response.sources.len(), 1);
    }

    #[tokio::test]
    async fn image_source_adds_callout() {
        let mut image = raw_hit("c1", "d1", json!(0.8));
        image.url = Some("http://files/owners/o/courses/c/images/d1.png".into());
        image.caption = Some("Phase diagram".into());
        image.page = None;
        let store = Arc::new(ScriptedStore::new(1, vec![image], Vec::new()));
        let service = service(store, MockGenerator::new("See the diagram [1]."));

        let response = service
            .answer_question(request(AssistanceLevel::ExamPrep))
            .await
            .expect("answer");

        assert!(response.answer.starts_with(
            "> 🖼️ Related image: [[1]](http://files/owners/o/courses/c/images/d1.png) — Phase diagram\n\n"
        ));
        assert!(response.sources[0].is_image);
    }

    #[tokio::test]
    async fn rejects_blank_question() {
        let store = Arc::new(ScriptedStore::new(1, Vec::new(), Vec::new()));
        let service = service(store.clone(), MockGenerator::new("unused"));

        let err = service
            .answer_question(AnswerRequest {
                question: "  ".into(),
                ..request(AssistanceLevel::ExamPrep)
            })
            .await
            .expect_err("blank question");

        assert!(matches!(err, AppError::Validation(_)));
        assert!(store.calls.lock().await.is_empty());
    }
}
