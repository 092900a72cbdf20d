use std::time::Duration;

use async_openai::error::OpenAIError;
use thiserror::Error;
use tokio::task::JoinError;

/// Failures raised at the chunk store boundary.
///
/// `CapabilityUnavailable` is kept apart from transport failures so callers can
/// degrade gracefully when a search mode is not offered by the backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store capability unavailable: {0}")]
    CapabilityUnavailable(&'static str),
    #[error("Store query failed: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),
    #[error("Malformed store response: {0}")]
    Malformed(String),
}

// Core internal errors
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] surrealdb::Error),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("OpenAI error: {0}")]
    OpenAI(#[from] OpenAIError),
    #[error("Embedding error: {0}")]
    Embedding(String),
    #[error("Generation error: {0}")]
    Generation(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Authorization error: {0}")]
    Auth(String),
    #[error("LLM parsing error: {0}")]
    LLMParsing(String),
    #[error("Task join error: {0}")]
    Join(#[from] JoinError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
    #[error("Object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),
    #[error("Anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
    #[error("Ingestion Processing error: {0}")]
    Processing(String),
    #[error("Internal service error: {0}")]
    InternalError(String),
}
