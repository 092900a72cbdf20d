#![allow(clippy::missing_docs_in_private_items, clippy::result_large_err)]

pub mod chunker;
pub mod pipeline;
pub mod utils;

pub use chunker::chunk_text;
pub use pipeline::{
    DefaultIngestionServices, ImageUpload, IngestionConfig, IngestionPipeline, IngestionReport,
    IngestionServices, IngestionTuning, PageRecognizer, PdfUpload,
};
