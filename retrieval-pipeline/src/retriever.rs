use std::{fmt, sync::Arc};

use common::{
    error::{AppError, StoreError},
    storage::{
        chunk_store::ChunkStore,
        types::hit::{Hit, RawHit},
    },
    utils::embedding::Embedder,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScoreCoercionError {
    #[error("score is not numeric: {0}")]
    NotNumeric(String),
    #[error("score is not finite")]
    NonFinite,
}

/// Reads a store score that may arrive as a JSON number or a numeric string.
#[allow(clippy::cast_possible_truncation)]
pub fn coerce_score(raw: &Value) -> Result<f32, ScoreCoercionError> {
    let value = match raw {
        Value::Number(number) => number
            .as_f64()
            .ok_or_else(|| ScoreCoercionError::NotNumeric(number.to_string()))?,
        Value::String(text) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| ScoreCoercionError::NotNumeric(text.clone()))?,
        other => return Err(ScoreCoercionError::NotNumeric(other.to_string())),
    };

    if !value.is_finite() {
        return Err(ScoreCoercionError::NonFinite);
    }
    Ok(value as f32)
}

fn normalize_hits(raw_hits: Vec<RawHit>) -> Vec<Hit> {
    raw_hits
        .into_iter()
        .map(|raw| {
            let score = match raw.score.as_ref().map(coerce_score) {
                Some(Ok(score)) => Some(score),
                Some(Err(err)) => {
                    warn!(chunk_id = %raw.chunk_id, error = %err, "Dropping unreadable score");
                    None
                }
                None => None,
            };
            Hit::from_raw(raw, score)
        })
        .collect()
}

/// Which search produced the hits handed to the answer stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMethod {
    Vector,
    Hybrid,
}

impl RetrievalMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for RetrievalMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Retrieval {
    pub method: RetrievalMethod,
    pub hits: Vec<Hit>,
}

/// Course-scoped search over the chunk store.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn ChunkStore>,
    embedder: Embedder,
}

impl Retriever {
    pub fn new(store: Arc<dyn ChunkStore>, embedder: Embedder) -> Self {
        Self { store, embedder }
    }

    #[instrument(skip_all, fields(course_id = %course_id, k = k))]
    pub async fn retrieve_vector(
        &self,
        course_id: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<Hit>, AppError> {
        let embedding = self.embedder.embed(query).await?;
        self.vector_hits(course_id, &embedding, k).await
    }

    #[instrument(skip_all, fields(course_id = %course_id, k = k, alpha = alpha))]
    pub async fn retrieve_hybrid(
        &self,
        course_id: &str,
        query: &str,
        k: usize,
        alpha: f32,
    ) -> Result<Vec<Hit>, AppError> {
        let embedding = self.embedder.embed(query).await?;
        self.hybrid_hits(course_id, query, &embedding, k, alpha).await
    }

    /// Vector search first, hybrid search when the vector pass comes back empty.
    ///
    /// The query is embedded once and shared by both passes.
    #[instrument(skip_all, fields(course_id = %course_id, k = k, alpha = alpha))]
    pub async fn retrieve_with_fallback(
        &self,
        course_id: &str,
        query: &str,
        k: usize,
        alpha: f32,
    ) -> Result<Retrieval, AppError> {
        let embedding = self.embedder.embed(query).await?;

        let hits = self.vector_hits(course_id, &embedding, k).await?;
        if !hits.is_empty() {
            info!(hits = hits.len(), "Vector retrieval succeeded");
            return Ok(Retrieval {
                method: RetrievalMethod::Vector,
                hits,
            });
        }

        debug!("Vector retrieval empty; falling back to hybrid search");
        let hits = self
            .hybrid_hits(course_id, query, &embedding, k, alpha)
            .await?;
        info!(hits = hits.len(), "Hybrid retrieval finished");
        Ok(Retrieval {
            method: RetrievalMethod::Hybrid,
            hits,
        })
    }

    async fn vector_hits(
        &self,
        course_id: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<Hit>, AppError> {
        let raw = self.store.vector_search(course_id, embedding, k).await?;
        Ok(normalize_hits(raw))
    }

    async fn hybrid_hits(
        &self,
        course_id: &str,
        query: &str,
        embedding: &[f32],
        k: usize,
        alpha: f32,
    ) -> Result<Vec<Hit>, AppError> {
        match self
            .store
            .hybrid_search(course_id, query, embedding, k, alpha)
            .await
        {
            Ok(raw) => Ok(normalize_hits(raw)),
            Err(StoreError::CapabilityUnavailable(capability)) => {
                warn!(capability, "Hybrid search unavailable; returning no hits");
                Ok(Vec::new())
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use async_trait::async_trait;
    use common::{
        error::StoreError,
        storage::{
            chunk_store::{ChunkInsert, ChunkStore},
            types::{
                chunk::{ChunkMetadata, NewChunk},
                course::Course,
                document::Document,
                hit::RawHit,
            },
        },
        utils::embedding::{Embedder, EmbeddingProvider},
    };
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Mutex;

    pub fn raw_hit(chunk_id: &str, document_id: &str, score: serde_json::Value) -> RawHit {
        RawHit {
            chunk_id: chunk_id.to_string(),
            course_id: "course-1".to_string(),
            document_id: document_id.to_string(),
            text: format!("Text of {chunk_id}"),
            caption: None,
            ocr_text: None,
            meta: ChunkMetadata::pdf_page(1),
            page: Some(1),
            score: Some(score),
            title: Some(format!("Doc {document_id}")),
            url: Some(format!("http://files/{document_id}.pdf")),
        }
    }

    pub fn embedder() -> Embedder {
        Embedder::new(
            Arc::new(EmbeddingProvider::new_hashed(16)),
            16,
            Duration::from_secs(5),
        )
    }

    /// Store returning canned search results and recording every call.
    pub struct ScriptedStore {
        pub chunk_count: u64,
        pub vector: Vec<RawHit>,
        pub hybrid: Result<Vec<RawHit>, &'static str>,
        pub calls: Mutex<Vec<&'static str>>,
        pub course_ids: Mutex<Vec<String>>,
    }

    impl ScriptedStore {
        pub fn new(chunk_count: u64, vector: Vec<RawHit>, hybrid: Vec<RawHit>) -> Self {
            Self {
                chunk_count,
                vector,
                hybrid: Ok(hybrid),
                calls: Mutex::new(Vec::new()),
                course_ids: Mutex::new(Vec::new()),
            }
        }

        pub fn without_hybrid(chunk_count: u64, vector: Vec<RawHit>) -> Self {
            Self {
                hybrid: Err("lexical index"),
                ..Self::new(chunk_count, vector, Vec::new())
            }
        }

        async fn record(&self, call: &'static str, course_id: &str) {
            self.calls.lock().await.push(call);
            self.course_ids.lock().await.push(course_id.to_string());
        }
    }

    #[async_trait]
    impl ChunkStore for ScriptedStore {
        async fn get_or_create_course(
            &self,
            owner_id: &str,
            name: &str,
            term: Option<String>,
        ) -> Result<Course, StoreError> {
            self.calls.lock().await.push("get_or_create_course");
            Ok(Course::new(owner_id.to_string(), name.to_string(), term))
        }

        async fn list_courses(&self, _owner_id: &str) -> Result<Vec<Course>, StoreError> {
            self.calls.lock().await.push("list_courses");
            Ok(Vec::new())
        }

        async fn create_document(&self, document: Document) -> Result<Document, StoreError> {
            self.calls.lock().await.push("create_document");
            Ok(document)
        }

        async fn insert_chunk(&self, _chunk: NewChunk) -> Result<ChunkInsert, StoreError> {
            self.calls.lock().await.push("insert_chunk");
            Ok(ChunkInsert::Inserted("chunk".to_string()))
        }

        async fn count_chunks(&self, course_id: &str) -> Result<u64, StoreError> {
            self.record("count_chunks", course_id).await;
            Ok(self.chunk_count)
        }

        async fn vector_search(
            &self,
            course_id: &str,
            _embedding: &[f32],
            k: usize,
        ) -> Result<Vec<RawHit>, StoreError> {
            self.record("vector_search", course_id).await;
            Ok(self.vector.iter().take(k).cloned().collect())
        }

        async fn hybrid_search(
            &self,
            course_id: &str,
            _query: &str,
            _embedding: &[f32],
            k: usize,
            _alpha: f32,
        ) -> Result<Vec<RawHit>, StoreError> {
            self.record("hybrid_search", course_id).await;
            match &self.hybrid {
                Ok(hits) => Ok(hits.iter().take(k).cloned().collect()),
                Err(capability) => Err(StoreError::CapabilityUnavailable(*capability)),
            }
        }
    }

    pub fn numeric(score: f64) -> serde_json::Value {
        json!(score)
    }
}
