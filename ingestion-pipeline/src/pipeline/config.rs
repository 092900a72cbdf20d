use common::utils::config::AppConfig;

use crate::utils::pdf_ingestion::WEAK_PAGE_MIN_CHARS;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub weak_page_min_chars: usize,
    pub embedding_concurrency: usize,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            chunk_size: 1200,
            chunk_overlap: 200,
            weak_page_min_chars: WEAK_PAGE_MIN_CHARS,
            embedding_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
    pub ocr_enabled: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            tuning: IngestionTuning::default(),
            ocr_enabled: true,
        }
    }
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning {
                chunk_size: config.chunk_size,
                chunk_overlap: config.chunk_overlap,
                ..IngestionTuning::default()
            },
            ocr_enabled: config.ocr_enabled,
        }
    }
}
