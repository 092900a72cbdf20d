use std::{collections::HashMap, future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Deserialize;
use surrealdb::sql::Thing;
use tracing::{debug, instrument};

use crate::{
    error::StoreError,
    storage::{
        db::SurrealDbClient,
        types::{
            chunk::{deserialize_flexible_id, Chunk, ChunkMetadata, NewChunk},
            course::Course,
            document::Document,
            hit::RawHit,
            StoredObject,
        },
    },
};

/// Result of persisting a chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkInsert {
    Inserted(String),
    /// The document already holds a chunk with the same content hash.
    Duplicate(String),
}

impl ChunkInsert {
    pub fn chunk_id(&self) -> &str {
        match self {
            Self::Inserted(id) | Self::Duplicate(id) => id,
        }
    }
}

/// Persistence and search over courses, documents and chunks.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn get_or_create_course(
        &self,
        owner_id: &str,
        name: &str,
        term: Option<String>,
    ) -> Result<Course, StoreError>;

    async fn list_courses(&self, owner_id: &str) -> Result<Vec<Course>, StoreError>;

    async fn create_document(&self, document: Document) -> Result<Document, StoreError>;

    async fn insert_chunk(&self, chunk: NewChunk) -> Result<ChunkInsert, StoreError>;

    async fn count_chunks(&self, course_id: &str) -> Result<u64, StoreError>;

    /// Top-`k` chunks of the course by cosine similarity to `embedding`.
    async fn vector_search(
        &self,
        course_id: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RawHit>, StoreError>;

    /// Top-`k` chunks by `alpha * vector + (1 - alpha) * lexical`.
    async fn hybrid_search(
        &self,
        course_id: &str,
        query: &str,
        embedding: &[f32],
        k: usize,
        alpha: f32,
    ) -> Result<Vec<RawHit>, StoreError>;
}

#[derive(Debug, Deserialize)]
struct ChunkRow {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    id: String,
    course_id: String,
    document_id: String,
    text: String,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    ocr_text: Option<String>,
    meta: ChunkMetadata,
    #[serde(default)]
    page: Option<u32>,
    #[serde(default)]
    score: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct FtsScoreRow {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    id: String,
    fts_score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DocumentRow {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    id: String,
    title: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdRow {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    id: String,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    count: u64,
}

const CHUNK_COLUMNS: &str = "id, course_id, document_id, text, caption, ocr_text, meta, page, \
     vector::similarity::cosine(embedding, $embedding) AS score";

/// Maps the "no suitable index" failure of a full-text query to a missing capability.
fn lexical_error(err: surrealdb::Error) -> StoreError {
    if err.to_string().contains("no suitable index") {
        StoreError::CapabilityUnavailable("fts_index")
    } else {
        StoreError::Database(err)
    }
}

/// [`ChunkStore`] backed by SurrealDB. Every call runs under `timeout`.
#[derive(Clone)]
pub struct SurrealChunkStore {
    db: Arc<SurrealDbClient>,
    hybrid_enabled: bool,
    timeout: Duration,
}

impl SurrealChunkStore {
    pub fn new(db: Arc<SurrealDbClient>, hybrid_enabled: bool, timeout: Duration) -> Self {
        Self {
            db,
            hybrid_enabled,
            timeout,
        }
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>> + Send,
    {
        tokio::time::timeout(self.timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
    }

    async fn scored_chunks(
        &self,
        course_id: &str,
        embedding: &[f32],
        limit: usize,
    ) -> Result<Vec<ChunkRow>, StoreError> {
        let sql = format!(
            "SELECT {CHUNK_COLUMNS} FROM type::table($table) \
             WHERE course_id = $course_id \
             ORDER BY score DESC \
             LIMIT $limit"
        );

        let mut response = self
            .db
            .query(sql)
            .bind(("table", Chunk::table_name()))
            .bind(("embedding", embedding.to_vec()))
            .bind(("course_id", course_id.to_owned()))
            .bind(("limit", i64::try_from(limit).unwrap_or(i64::MAX)))
            .await?;

        Ok(response.take(0)?)
    }

    async fn lexical_scores(
        &self,
        course_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<FtsScoreRow>, StoreError> {
        let mut response = self
            .db
            .query(
                "SELECT id, (IF search::score(0) != NONE THEN search::score(0) ELSE 0 END) AS fts_score \
                 FROM type::table($table) \
                 WHERE text @0@ $terms AND course_id = $course_id \
                 ORDER BY fts_score DESC \
                 LIMIT $limit",
            )
            .bind(("table", Chunk::table_name()))
            .bind(("terms", query.to_owned()))
            .bind(("course_id", course_id.to_owned()))
            .bind(("limit", i64::try_from(limit).unwrap_or(i64::MAX)))
            .await
            .map_err(lexical_error)?;

        response.take(0).map_err(lexical_error)
    }

    async fn chunks_by_id(
        &self,
        ids: &[String],
        embedding: &[f32],
    ) -> Result<Vec<ChunkRow>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let things: Vec<Thing> = ids
            .iter()
            .map(|id| Thing::from((Chunk::table_name(), id.as_str())))
            .collect();

        let sql = format!("SELECT {CHUNK_COLUMNS} FROM type::table($table) WHERE id IN $things");
        let mut response = self
            .db
            .query(sql)
            .bind(("table", Chunk::table_name()))
            .bind(("embedding", embedding.to_vec()))
            .bind(("things", things))
            .await?;

        Ok(response.take(0)?)
    }

    /// Denormalizes document title and url onto each row.
    async fn attach_documents(&self, rows: Vec<ChunkRow>) -> Result<Vec<RawHit>, StoreError> {
        let mut document_ids: Vec<String> = rows.iter().map(|r| r.document_id.clone()).collect();
        document_ids.sort();
        document_ids.dedup();

        let mut documents: HashMap<String, DocumentRow> = HashMap::new();
        if !document_ids.is_empty() {
            let things: Vec<Thing> = document_ids
                .iter()
                .map(|id| Thing::from((Document::table_name(), id.as_str())))
                .collect();
            let mut response = self
                .db
                .query("SELECT id, title, url FROM type::table($table) WHERE id IN $things")
                .bind(("table", Document::table_name()))
                .bind(("things", things))
                .await?;
            let found: Vec<DocumentRow> = response.take(0)?;
            documents = found.into_iter().map(|d| (d.id.clone(), d)).collect();
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let doc = documents.get(&row.document_id);
                RawHit {
                    chunk_id: row.id,
                    course_id: row.course_id,
                    title: doc.map(|d| d.title.clone()),
                    url: doc.and_then(|d| d.url.clone()),
                    document_id: row.document_id,
                    text: row.text,
                    caption: row.caption,
                    ocr_text: row.ocr_text,
                    meta: row.meta,
                    page: row.page,
                    score: row.score,
                }
            })
            .collect())
    }

    async fn existing_chunk_with_hash(
        &self,
        course_id: &str,
        document_id: &str,
        content_hash: &str,
    ) -> Result<Option<String>, StoreError> {
        let mut response = self
            .db
            .query(
                "SELECT id FROM type::table($table) \
                 WHERE course_id = $course_id AND document_id = $document_id \
                 AND content_hash = $content_hash \
                 LIMIT 1",
            )
            .bind(("table", Chunk::table_name()))
            .bind(("course_id", course_id.to_owned()))
            .bind(("document_id", document_id.to_owned()))
            .bind(("content_hash", content_hash.to_owned()))
            .await?;
        let rows: Vec<IdRow> = response.take(0)?;
        Ok(rows.into_iter().next().map(|row| row.id))
    }
}

#[async_trait]
impl ChunkStore for SurrealChunkStore {
    async fn get_or_create_course(
        &self,
        owner_id: &str,
        name: &str,
        term: Option<String>,
    ) -> Result<Course, StoreError> {
        self.timed(async {
            Ok(Course::get_or_create(owner_id, name, term, &self.db).await?)
        })
        .await
    }

    async fn list_courses(&self, owner_id: &str) -> Result<Vec<Course>, StoreError> {
        self.timed(async { Ok(Course::list_for_owner(owner_id, &self.db).await?) })
            .await
    }

    async fn create_document(&self, document: Document) -> Result<Document, StoreError> {
        self.timed(async {
            let stored = self.db.store_item(document.clone()).await?;
            Ok(stored.unwrap_or(document))
        })
        .await
    }

    #[instrument(skip_all, fields(course_id = %chunk.course_id, document_id = %chunk.document_id))]
    async fn insert_chunk(&self, chunk: NewChunk) -> Result<ChunkInsert, StoreError> {
        self.timed(async {
            if let Some(hash) = chunk.content_hash.as_deref() {
                let existing = self
                    .existing_chunk_with_hash(&chunk.course_id, &chunk.document_id, hash)
                    .await?;
                if let Some(existing) = existing {
                    debug!(chunk_id = %existing, "Skipping chunk with duplicate content hash");
                    return Ok(ChunkInsert::Duplicate(existing));
                }
            }

            let record = Chunk::from(chunk);
            let id = record.id.clone();
            self.db.store_item(record).await?;
            Ok(ChunkInsert::Inserted(id))
        })
        .await
    }

    async fn count_chunks(&self, course_id: &str) -> Result<u64, StoreError> {
        self.timed(async {
            let mut response = self
                .db
                .query("SELECT count() AS count FROM type::table($table) WHERE course_id = $course_id GROUP ALL")
                .bind(("table", Chunk::table_name()))
                .bind(("course_id", course_id.to_owned()))
                .await?;
            let rows: Vec<CountRow> = response.take(0)?;
            Ok(rows.first().map_or(0, |row| row.count))
        })
        .await
    }

    #[instrument(skip_all, fields(course_id = %course_id, k = k))]
    async fn vector_search(
        &self,
        course_id: &str,
        embedding: &[f32],
        k: usize,
    ) -> Result<Vec<RawHit>, StoreError> {
        self.timed(async {
            let rows = self.scored_chunks(course_id, embedding, k).await?;
            debug!(rows = rows.len(), "Vector search completed");
            self.attach_documents(rows).await
        })
        .await
    }

    #[instrument(skip_all, fields(course_id = %course_id, k = k, alpha = alpha))]
    async fn hybrid_search(
        &self,
        course_id: &str,
        query: &str,
        embedding: &[f32],
        k: usize,
        alpha: f32,
    ) -> Result<Vec<RawHit>, StoreError> {
        if !self.hybrid_enabled {
            return Err(StoreError::CapabilityUnavailable("hybrid_search"));
        }

        self.timed(async {
            let alpha = f64::from(alpha.clamp(0.0, 1.0));
            let candidate_limit = k.saturating_mul(4).max(k);

            let lexical = if query.trim().is_empty() {
                Vec::new()
            } else {
                self.lexical_scores(course_id, query, candidate_limit).await?
            };
            let vector_rows = self.scored_chunks(course_id, embedding, candidate_limit).await?;

            let max_lexical = lexical
                .iter()
                .filter_map(|row| row.fts_score)
                .fold(0.0_f64, f64::max);
            let lexical_norm: HashMap<String, f64> = lexical
                .iter()
                .map(|row| {
                    let score = row.fts_score.unwrap_or(0.0);
                    let norm = if max_lexical > 0.0 { score / max_lexical } else { 0.0 };
                    (row.id.clone(), norm)
                })
                .collect();

            let mut candidates: HashMap<String, ChunkRow> =
                vector_rows.into_iter().map(|row| (row.id.clone(), row)).collect();
            let missing: Vec<String> = lexical_norm
                .keys()
                .filter(|id| !candidates.contains_key(*id))
                .cloned()
                .collect();
            for row in self.chunks_by_id(&missing, embedding).await? {
                candidates.insert(row.id.clone(), row);
            }

            let mut blended: Vec<(f64, ChunkRow)> = candidates
                .into_values()
                .map(|mut row| {
                    let vector_score = row
                        .score
                        .as_ref()
                        .and_then(serde_json::Value::as_f64)
                        .unwrap_or(0.0);
                    let lexical_score = lexical_norm.get(&row.id).copied().unwrap_or(0.0);
                    let score = alpha * vector_score + (1.0 - alpha) * lexical_score;
                    row.score = Some(serde_json::Value::from(score));
                    (score, row)
                })
                .collect();
            blended.sort_by(|a, b| b.0.total_cmp(&a.0));
            blended.truncate(k);

            debug!(
                lexical = lexical_norm.len(),
                returned = blended.len(),
                "Hybrid search completed"
            );
            self.attach_documents(blended.into_iter().map(|(_, row)| row).collect())
                .await
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::document::DocumentKind;
    use uuid::Uuid;

    async fn setup(hybrid_enabled: bool) -> SurrealChunkStore {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized().await.expect("init");
        SurrealChunkStore::new(Arc::new(db), hybrid_enabled, Duration::from_secs(10))
    }

    async fn document(store: &SurrealChunkStore, course_id: &str, title: &str) -> Document {
        store
            .create_document(Document::new(
                course_id.to_owned(),
                title.to_owned(),
                DocumentKind::Pdf,
                Some(format!("http://files/{title}.pdf")),
                serde_json::json!({}),
                "owner".into(),
            ))
            .await
            .expect("create document")
    }

    fn new_chunk(course_id: &str, document_id: &str, text: &str, embedding: Vec<f32>) -> NewChunk {
        NewChunk {
            course_id: course_id.to_owned(),
            document_id: document_id.to_owned(),
            text: text.to_owned(),
            caption: None,
            ocr_text: None,
            embedding,
            meta: ChunkMetadata::pdf_page(1),
            page: Some(1),
            content_hash: None,
            owner_id: "owner".into(),
        }
    }

    #[tokio::test]
    async fn vector_search_is_course_scoped_and_ordered() {
        let store = setup(true).await;
        let doc = document(&store, "course-a", "Lecture1").await;
        let foreign = document(&store, "course-b", "Other").await;

        store
            .insert_chunk(new_chunk("course-a", &doc.id, "close", vec![1.0, 0.0, 0.0]))
            .await
            .expect("insert");
        store
            .insert_chunk(new_chunk("course-a", &doc.id, "far", vec![0.0, 1.0, 0.0]))
            .await
            .expect("insert");
        store
            .insert_chunk(new_chunk("course-b", &foreign.id, "foreign", vec![1.0, 0.0, 0.0]))
            .await
            .expect("insert");

        let hits = store
            .vector_search("course-a", &[1.0, 0.0, 0.0], 5)
            .await
            .expect("search");

        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        assert_eq!(texts, vec!["close", "far"]);
        assert_eq!(hits[0].title.as_deref(), Some("Lecture1"));
        assert_eq!(hits[0].url.as_deref(), Some("http://files/Lecture1.pdf"));
        let top = hits[0].score.as_ref().and_then(serde_json::Value::as_f64);
        assert!(top.is_some_and(|s| (s - 1.0).abs() < 1e-6));
    }

    #[tokio::test]
    async fn count_chunks_only_counts_course() {
        let store = setup(true).await;
        assert_eq!(store.count_chunks("course-a").await.expect("count"), 0);

        store
            .insert_chunk(new_chunk("course-a", "doc", "one", vec![1.0, 0.0]))
            .await
            .expect("insert");
        store
            .insert_chunk(new_chunk("course-b", "doc", "two", vec![1.0, 0.0]))
            .await
            .expect("insert");

        assert_eq!(store.count_chunks("course-a").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn same_text_in_two_documents_is_stored_for_both() {
        let store = setup(true).await;
        let first_doc = document(&store, "course-a", "LectureA").await;
        let second_doc = document(&store, "course-a", "LectureB").await;
        let text = "The heat equation is parabolic.";

        for doc in [&first_doc, &second_doc] {
            let mut chunk = new_chunk("course-a", &doc.id, text, vec![1.0, 0.0]);
            chunk.content_hash = Some(crate::utils::text::content_hash(text));
            let outcome = store.insert_chunk(chunk).await.expect("insert");
            assert!(matches!(outcome, ChunkInsert::Inserted(_)));
        }

        let hits = store
            .vector_search("course-a", &[1.0, 0.0], 5)
            .await
            .expect("search");
        let mut titles: Vec<&str> = hits.iter().filter_map(|h| h.title.as_deref()).collect();
        titles.sort_unstable();
        assert_eq!(titles, vec!["LectureA", "LectureB"]);
        assert_eq!(store.count_chunks("course-a").await.expect("count"), 2);
    }

    #[tokio::test]
    async fn duplicate_content_hash_is_not_inserted_twice() {
        let store = setup(true).await;
        let mut chunk = new_chunk("course-a", "doc", "same text", vec![1.0, 0.0]);
        chunk.content_hash = Some("abc123".into());

        let first = store.insert_chunk(chunk.clone()).await.expect("insert");
        let second = store.insert_chunk(chunk).await.expect("insert again");

        assert!(matches!(first, ChunkInsert::Inserted(_)));
        assert_eq!(second, ChunkInsert::Duplicate(first.chunk_id().to_owned()));
        assert_eq!(store.count_chunks("course-a").await.expect("count"), 1);
    }

    #[tokio::test]
    async fn hybrid_search_reports_capability_unavailable_when_disabled() {
        let store = setup(false).await;
        let err = store
            .hybrid_search("course-a", "anything", &[1.0, 0.0], 3, 0.7)
            .await
            .expect_err("disabled");
        assert!(matches!(err, StoreError::CapabilityUnavailable(_)));
    }

    #[tokio::test]
    async fn hybrid_search_without_fulltext_index_is_unavailable() {
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory("test_ns", &database)
            .await
            .expect("Failed to start in-memory surrealdb");
        let store = SurrealChunkStore::new(Arc::new(db), true, Duration::from_secs(10));
        store
            .insert_chunk(new_chunk("course-a", "doc", "robin boundary", vec![1.0, 0.0]))
            .await
            .expect("insert");

        let err = store
            .hybrid_search("course-a", "robin", &[1.0, 0.0], 3, 0.7)
            .await
            .expect_err("no fulltext index");
        assert!(matches!(err, StoreError::CapabilityUnavailable("fts_index")));
    }

    #[tokio::test]
    async fn hybrid_search_blends_lexical_matches() {
        let store = setup(true).await;
        let doc = document(&store, "course-a", "Notes").await;

        let inserts = [
            ("apples and bananas", vec![1.0, 0.0, 0.0]),
            ("Robin boundary condition on the rod", vec![0.8, 0.6, 0.0]),
            ("fourier coefficients", vec![0.0, 0.0, 1.0]),
            ("laplace transform table", vec![0.0, 0.0, 1.0]),
            ("separation of variables", vec![0.0, 0.0, 1.0]),
        ];
        for (text, embedding) in inserts {
            store
                .insert_chunk(new_chunk("course-a", &doc.id, text, embedding))
                .await
                .expect("insert");
        }

        let hits = store
            .hybrid_search("course-a", "robin boundary", &[1.0, 0.0, 0.0], 2, 0.7)
            .await
            .expect("hybrid");

        assert_eq!(hits.len(), 2);
        assert!(hits[0].text.starts_with("Robin boundary"));
        assert_eq!(hits[1].text, "apples and bananas");
    }
}
