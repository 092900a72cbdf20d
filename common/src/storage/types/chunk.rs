use uuid::Uuid;

use crate::stored_object;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Pdf,
    Image,
}

/// Per-chunk metadata stored alongside the text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

impl ChunkMetadata {
    pub fn pdf_page(page: u32) -> Self {
        Self {
            source_type: SourceType::Pdf,
            page: Some(page),
            topic: None,
            keywords: Vec::new(),
        }
    }

    pub fn image(topic: Option<String>, keywords: Vec<String>) -> Self {
        Self {
            source_type: SourceType::Image,
            page: None,
            topic,
            keywords,
        }
    }
}

stored_object!(Chunk, "chunk", {
    course_id: String,
    document_id: String,
    text: String,
    caption: Option<String>,
    ocr_text: Option<String>,
    embedding: Vec<f32>,
    meta: ChunkMetadata,
    page: Option<u32>,
    content_hash: Option<String>,
    owner_id: String
});

/// Everything needed to persist a chunk; the store assigns id and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewChunk {
    pub course_id: String,
    pub document_id: String,
    pub text: String,
    pub caption: Option<String>,
    pub ocr_text: Option<String>,
    pub embedding: Vec<f32>,
    pub meta: ChunkMetadata,
    pub page: Option<u32>,
    pub content_hash: Option<String>,
    pub owner_id: String,
}

impl From<NewChunk> for Chunk {
    fn from(new: NewChunk) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            course_id: new.course_id,
            document_id: new.document_id,
            text: new.text,
            caption: new.caption,
            ocr_text: new.ocr_text,
            embedding: new.embedding,
            meta: new.meta,
            page: new.page,
            content_hash: new.content_hash,
            owner_id: new.owner_id,
        }
    }
}
