use std::{sync::Arc, time::Duration};

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestSystemMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequest, CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::error::AppError;

/// Text generation from a system instruction plus a user prompt.
#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Returns the generated text; an empty string when the model produced nothing.
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, AppError>;
}

pub struct OpenAiGenerator {
    client: Arc<Client<OpenAIConfig>>,
    model: String,
    timeout: Duration,
}

impl OpenAiGenerator {
    pub fn new(client: Arc<Client<OpenAIConfig>>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }
}

pub fn create_chat_request(
    model: &str,
    system_instruction: &str,
    prompt: &str,
    temperature: f32,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    CreateChatCompletionRequestArgs::default()
        .model(model)
        .temperature(temperature)
        .messages([
            ChatCompletionRequestSystemMessage::from(system_instruction).into(),
            ChatCompletionRequestUserMessage::from(prompt).into(),
        ])
        .build()
}

/// First choice's text content, or an empty string.
pub fn first_choice_text(response: CreateChatCompletionResponse) -> String {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .unwrap_or_default()
}

#[async_trait]
impl AnswerGenerator for OpenAiGenerator {
    #[instrument(skip_all, fields(model = %self.model, temperature = temperature))]
    async fn generate(
        &self,
        system_instruction: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, AppError> {
        let request = create_chat_request(&self.model, system_instruction, prompt, temperature)
            .map_err(|e| AppError::Generation(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                AppError::Generation(format!("generation timed out after {:?}", self.timeout))
            })?
            .map_err(|e| AppError::Generation(e.to_string()))?;

        let text = first_choice_text(response);
        debug!(chars = text.len(), "Generation completed");
        Ok(text)
    }
}
