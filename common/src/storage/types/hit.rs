use serde::{Deserialize, Serialize};

use super::chunk::ChunkMetadata;

/// A retrieval row exactly as the store produced it.
///
/// `score` is left untyped; backends disagree on whether it arrives as a number,
/// a numeric string, or nothing at all.
#[derive(Debug, Clone, PartialEq)]
pub struct RawHit {
    pub chunk_id: String,
    pub course_id: String,
    pub document_id: String,
    pub text: String,
    pub caption: Option<String>,
    pub ocr_text: Option<String>,
    pub meta: ChunkMetadata,
    pub page: Option<u32>,
    pub score: Option<serde_json::Value>,
    pub title: Option<String>,
    pub url: Option<String>,
}

/// One retrieved chunk with a numeric score (None when the raw score could not be read).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    pub chunk_id: String,
    pub course_id: String,
    pub document_id: String,
    pub text: String,
    pub caption: Option<String>,
    pub ocr_text: Option<String>,
    pub meta: ChunkMetadata,
    pub page: Option<u32>,
    pub score: Option<f32>,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl Hit {
    pub fn from_raw(raw: RawHit, score: Option<f32>) -> Self {
        Self {
            chunk_id: raw.chunk_id,
            course_id: raw.course_id,
            document_id: raw.document_id,
            text: raw.text,
            caption: raw.caption,
            ocr_text: raw.ocr_text,
            meta: raw.meta,
            page: raw.page,
            score,
            title: raw.title,
            url: raw.url,
        }
    }
}
