use std::{sync::Arc, time::Duration};

use async_openai::{config::OpenAIConfig, types::CreateChatCompletionRequest, Client};
use async_trait::async_trait;
use bytes::Bytes;
use common::{error::AppError, storage::store::StorageManager};
use tracing::debug;

use crate::utils::{
    image_parsing::{create_description_request, create_transcription_request, ImageDescription},
    pdf_ingestion::{extract_pdf_pages, PageText},
};

/// Recovers text from a rendered PDF page whose text layer is missing or too thin.
#[async_trait]
pub trait PageRecognizer: Send + Sync {
    async fn recognize_page(&self, pdf_bytes: &Bytes, page: u32) -> Result<Option<String>, AppError>;
}

/// External work the ingestion pipeline depends on.
#[async_trait]
pub trait IngestionServices: Send + Sync {
    /// Persists the original upload and returns its public url.
    async fn store_original(&self, location: &str, bytes: Bytes) -> Result<String, AppError>;

    async fn extract_pages(&self, pdf_bytes: &Bytes) -> Result<Vec<PageText>, AppError>;

    fn can_recognize_pages(&self) -> bool;

    async fn recognize_page(&self, pdf_bytes: &Bytes, page: u32) -> Result<Option<String>, AppError>;

    async fn describe_image(&self, bytes: &Bytes, mime: &str) -> Result<ImageDescription, AppError>;

    async fn transcribe_image(&self, bytes: &Bytes, mime: &str) -> Result<Option<String>, AppError>;
}

pub struct DefaultIngestionServices {
    openai_client: Arc<Client<OpenAIConfig>>,
    storage: StorageManager,
    vision_model: String,
    page_recognizer: Option<Arc<dyn PageRecognizer>>,
    timeout: Duration,
}

impl DefaultIngestionServices {
    pub fn new(
        openai_client: Arc<Client<OpenAIConfig>>,
        storage: StorageManager,
        vision_model: String,
        timeout: Duration,
    ) -> Self {
        Self {
            openai_client,
            storage,
            vision_model,
            page_recognizer: None,
            timeout,
        }
    }

    #[must_use]
    pub fn with_page_recognizer(mut self, recognizer: Arc<dyn PageRecognizer>) -> Self {
        self.page_recognizer = Some(recognizer);
        self
    }

    async fn complete(&self, request: CreateChatCompletionRequest) -> Result<String, AppError> {
        let response = tokio::time::timeout(self.timeout, self.openai_client.chat().create(request))
            .await
            .map_err(|_| {
                AppError::Processing(format!("vision call timed out after {:?}", self.timeout))
            })??;

        Ok(response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default())
    }
}

#[async_trait]
impl IngestionServices for DefaultIngestionServices {
    async fn store_original(&self, location: &str, bytes: Bytes) -> Result<String, AppError> {
        self.storage.put(location, bytes).await?;
        Ok(self.storage.public_url(location))
    }

    async fn extract_pages(&self, pdf_bytes: &Bytes) -> Result<Vec<PageText>, AppError> {
        extract_pdf_pages(pdf_bytes.to_vec()).await
    }

    fn can_recognize_pages(&self) -> bool {
        self.page_recognizer.is_some()
    }

    async fn recognize_page(&self, pdf_bytes: &Bytes, page: u32) -> Result<Option<String>, AppError> {
        match &self.page_recognizer {
            Some(recognizer) => recognizer.recognize_page(pdf_bytes, page).await,
            None => Ok(None),
        }
    }

    async fn describe_image(&self, bytes: &Bytes, mime: &str) -> Result<ImageDescription, AppError> {
        let request = create_description_request(&self.vision_model, bytes, mime)?;
        let raw = self.complete(request).await?;
        debug!(chars = raw.len(), "Vision description received");
        Ok(ImageDescription::from_model_output(&raw))
    }

    async fn transcribe_image(&self, bytes: &Bytes, mime: &str) -> Result<Option<String>, AppError> {
        let request = create_transcription_request(&self.vision_model, bytes, mime)?;
        let text = self.complete(request).await?;
        let text = text.trim();
        Ok((!text.is_empty()).then(|| text.to_string()))
    }
}
