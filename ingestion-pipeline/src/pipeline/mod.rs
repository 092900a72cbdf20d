mod config;
mod services;


pub use config::{IngestionConfig, IngestionTuning};
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultIngestionServices, IngestionServices, PageRecognizer};

use std::{path::Path, sync::Arc, time::Instant};

use bytes::Bytes;
use common::{
    error::AppError,
    storage::{
        chunk_store::{ChunkInsert, ChunkStore},
        store::{image_location, pdf_location},
        types::{
            chunk::{ChunkMetadata, NewChunk},
            document::{Document, DocumentKind},
        },
    },
    utils::{embedding::Embedder, text::content_hash},
};
use futures::{stream, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info, instrument, warn};

use crate::{chunker::chunk_text, utils::pdf_ingestion::looks_like_pdf};

const DEFAULT_IMAGE_MIME: &str = "image/png";
const DEFAULT_IMAGE_EXTENSION: &str = "png";

#[derive(Debug, Clone)]
pub struct PdfUpload {
    pub owner_id: String,
    pub course_id: String,
    pub title: String,
    pub bytes: Bytes,
}

#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub owner_id: String,
    pub course_id: String,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Outcome of ingesting one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestionReport {
    pub document_id: String,
    pub url: String,
    pub pages: usize,
    pub chunks_inserted: usize,
    pub duplicates_skipped: usize,
}

/// Chunk text waiting for its embedding.
#[derive(Debug, Clone)]
struct PendingChunk {
    text: String,
    page: u32,
    ocr_text: Option<String>,
}

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    store: Arc<dyn ChunkStore>,
    embedder: Embedder,
    services: Arc<dyn IngestionServices>,
    config: IngestionConfig,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: Embedder,
        services: Arc<dyn IngestionServices>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            services,
            config,
        }
    }

    #[instrument(skip_all, fields(course_id = %upload.course_id, owner_id = %upload.owner_id, bytes = upload.bytes.len()))]
    pub async fn ingest_pdf(&self, upload: PdfUpload) -> Result<IngestionReport, AppError> {
        if !looks_like_pdf(&upload.bytes) {
            return Err(AppError::Validation("Upload is not a PDF".into()));
        }
        let started = Instant::now();

        let mut document = Document::new(
            upload.course_id.clone(),
            upload.title.clone(),
            DocumentKind::Pdf,
            None,
            json!({}),
            upload.owner_id.clone(),
        );
        let location = pdf_location(&upload.owner_id, &upload.course_id, &document.id);
        let url = self
            .services
            .store_original(&location, upload.bytes.clone())
            .await?;
        document.url = Some(url.clone());
        document.meta = json!({ "path": location, "source_type": "pdf" });
        let document = self.store.create_document(document).await?;

        let pages = self.services.extract_pages(&upload.bytes).await?;
        let page_count = pages.len();
        let tuning = &self.config.tuning;

        let mut pending = Vec::new();
        for page in pages {
            let ocr_text = if self.config.ocr_enabled && page.is_weak(tuning.weak_page_min_chars) {
                self.recognize_weak_page(&upload.bytes, page.number).await?
            } else {
                None
            };

            let retrieval_text = match ocr_text.as_deref() {
                Some(ocr) => format!("{}\n{ocr}", page.text),
                None => page.text.clone(),
            };
            if retrieval_text.trim().is_empty() {
                debug!(page = page.number, "Skipping empty page");
                continue;
            }

            for text in chunk_text(&retrieval_text, tuning.chunk_size, tuning.chunk_overlap) {
                pending.push(PendingChunk {
                    text,
                    page: page.number,
                    ocr_text: ocr_text.clone(),
                });
            }
        }

        let (inserted, duplicates) = self.embed_and_store(&document, pending).await?;

        info!(
            document_id = %document.id,
            pages = page_count,
            chunks_inserted = inserted,
            duplicates_skipped = duplicates,
            elapsed = ?started.elapsed(),
            "PDF ingestion completed"
        );

        Ok(IngestionReport {
            document_id: document.id,
            url,
            pages: page_count,
            chunks_inserted: inserted,
            duplicates_skipped: duplicates,
        })
    }

    #[instrument(skip_all, fields(course_id = %upload.course_id, owner_id = %upload.owner_id, bytes = upload.bytes.len()))]
    pub async fn ingest_image(&self, upload: ImageUpload) -> Result<IngestionReport, AppError> {
        if upload.bytes.is_empty() {
            return Err(AppError::Validation("Image upload is empty".into()));
        }

        let mime = resolve_image_mime(upload.content_type.as_deref(), upload.file_name.as_deref());
        let extension = resolve_image_extension(upload.file_name.as_deref(), &mime);
        let title = upload
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| title_from_file_name(upload.file_name.as_deref()));

        let mut document = Document::new(
            upload.course_id.clone(),
            title,
            DocumentKind::Image,
            None,
            json!({}),
            upload.owner_id.clone(),
        );
        let location = image_location(&upload.owner_id, &upload.course_id, &document.id, &extension);
        let url = self
            .services
            .store_original(&location, upload.bytes.clone())
            .await?;
        document.url = Some(url.clone());
        document.meta = json!({ "path": location, "source_type": "image", "mime": mime });
        let document = self.store.create_document(document).await?;

        let description = self.services.describe_image(&upload.bytes, &mime).await?;
        let ocr_text = if self.config.ocr_enabled {
            self.services.transcribe_image(&upload.bytes, &mime).await?
        } else {
            None
        };

        let text = description.retrieval_text(ocr_text.as_deref());
        let embedding = self.embedder.embed(&text).await?;
        let outcome = self
            .store
            .insert_chunk(NewChunk {
                course_id: document.course_id.clone(),
                document_id: document.id.clone(),
                content_hash: Some(content_hash(&text)),
                text,
                caption: Some(description.caption.clone()),
                ocr_text,
                embedding,
                meta: ChunkMetadata::image(description.topic.clone(), description.keywords.clone()),
                page: None,
                owner_id: document.owner_id.clone(),
            })
            .await?;

        let duplicate = matches!(outcome, ChunkInsert::Duplicate(_));
        info!(
            document_id = %document.id,
            chunk_id = %outcome.chunk_id(),
            duplicate,
            "Image ingestion completed"
        );

        Ok(IngestionReport {
            document_id: document.id,
            url,
            pages: 0,
            chunks_inserted: usize::from(!duplicate),
            duplicates_skipped: usize::from(duplicate),
        })
    }

    async fn recognize_weak_page(&self, pdf_bytes: &Bytes, page: u32) -> Result<Option<String>, AppError> {
        if !self.services.can_recognize_pages() {
            warn!(page, "Weak text layer and no page recognizer configured; using text layer as-is");
            return Ok(None);
        }

        let recognized = self.services.recognize_page(pdf_bytes, page).await?;
        Ok(recognized
            .map(|text| text.trim().to_string())
            .filter(|text| !text.is_empty()))
    }

    /// Embeds page chunks with bounded concurrency, then inserts them in order.
    async fn embed_and_store(
        &self,
        document: &Document,
        pending: Vec<PendingChunk>,
    ) -> Result<(usize, usize), AppError> {
        let concurrency = self.config.tuning.embedding_concurrency.max(1);
        let embedded: Vec<(PendingChunk, Vec<f32>)> = stream::iter(pending)
            .map(|chunk| async move {
                let embedding = self.embedder.embed(&chunk.text).await?;
                Ok::<_, AppError>((chunk, embedding))
            })
            .buffered(concurrency)
            .try_collect()
            .await?;

        let mut inserted = 0usize;
        let mut duplicates = 0usize;
        for (chunk, embedding) in embedded {
            let outcome = self
                .store
                .insert_chunk(NewChunk {
                    course_id: document.course_id.clone(),
                    document_id: document.id.clone(),
                    content_hash: Some(content_hash(&chunk.text)),
                    text: chunk.text,
                    caption: None,
                    ocr_text: chunk.ocr_text,
                    embedding,
                    meta: ChunkMetadata::pdf_page(chunk.page),
                    page: Some(chunk.page),
                    owner_id: document.owner_id.clone(),
                })
                .await?;
            match outcome {
                ChunkInsert::Inserted(_) => inserted = inserted.saturating_add(1),
                ChunkInsert::Duplicate(_) => duplicates = duplicates.saturating_add(1),
            }
        }

        Ok((inserted, duplicates))
    }
}

fn resolve_image_mime(content_type: Option<&str>, file_name: Option<&str>) -> String {
    if let Some(ct) = content_type.map(str::trim).filter(|ct| ct.starts_with("image/")) {
        return ct.to_ascii_lowercase();
    }
    file_name
        .and_then(|name| mime_guess::from_path(name).first())
        .filter(|m| m.type_() == mime_guess::mime::IMAGE)
        .map_or_else(|| DEFAULT_IMAGE_MIME.to_string(), |m| m.essence_str().to_string())
}

fn resolve_image_extension(file_name: Option<&str>, mime: &str) -> String {
    let from_name = file_name
        .and_then(|name| Path::new(name).extension())
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(str::to_ascii_lowercase);

    from_name
        .or_else(|| {
            let preferred = match mime {
                "image/png" => Some("png"),
                "image/jpeg" => Some("jpg"),
                "image/gif" => Some("gif"),
                "image/webp" => Some("webp"),
                _ => None,
            };
            preferred
                .or_else(|| {
                    mime_guess::get_mime_extensions_str(mime).and_then(|exts| exts.first().copied())
                })
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_IMAGE_EXTENSION.to_string())
}

fn title_from_file_name(file_name: Option<&str>) -> String {
    file_name
        .and_then(|name| Path::new(name).file_stem())
        .and_then(|stem| stem.to_str())
        .map(|stem| stem.replace('_', " ").trim().to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "Untitled image".to_string())
}
