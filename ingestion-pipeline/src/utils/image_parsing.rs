use async_openai::{
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessage,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use super::llm_instructions::{
    get_image_description_schema, IMAGE_DESCRIPTION_INSTRUCTIONS, IMAGE_DESCRIPTION_SYSTEM_MESSAGE,
    IMAGE_TRANSCRIPTION_INSTRUCTIONS,
};

pub const DEFAULT_CAPTION: &str = "(image)";
pub const MAX_KEYWORDS: usize = 6;
pub const MAX_KEYWORD_CHARS: usize = 40;

/// Caption, keywords and topic produced by the vision model for one image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageDescription {
    pub caption: String,
    pub keywords: Vec<String>,
    pub topic: Option<String>,
}

impl Default for ImageDescription {
    fn default() -> Self {
        Self {
            caption: DEFAULT_CAPTION.to_string(),
            keywords: Vec::new(),
            topic: None,
        }
    }
}

impl ImageDescription {
    /// Lenient parse of the model's JSON; anything unreadable falls back to defaults.
    pub fn from_model_output(raw: &str) -> Self {
        let Ok(value) = serde_json::from_str::<Value>(raw.trim()) else {
            return Self::default();
        };

        let caption = value
            .get("caption")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map_or_else(|| DEFAULT_CAPTION.to_string(), str::to_string);

        let keywords = value
            .get("keywords")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .take(MAX_KEYWORDS)
                    .map(|item| {
                        let text = item
                            .as_str()
                            .map_or_else(|| item.to_string(), str::to_string);
                        text.chars().take(MAX_KEYWORD_CHARS).collect::<String>()
                    })
                    .collect()
            })
            .unwrap_or_default();

        let topic = value
            .get("topic")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);

        Self {
            caption,
            keywords,
            topic,
        }
    }

    /// Text indexed for the image: caption, OCR, topic and keywords.
    pub fn retrieval_text(&self, ocr_text: Option<&str>) -> String {
        let keywords = self.keywords.join(" ");
        let parts = [
            self.caption.as_str(),
            ocr_text.unwrap_or_default(),
            self.topic.as_deref().unwrap_or_default(),
            keywords.as_str(),
        ];
        let joined = parts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        if joined.is_empty() {
            DEFAULT_CAPTION.to_string()
        } else {
            joined
        }
    }
}

pub fn image_data_url(bytes: &[u8], mime: &str) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

pub fn create_description_request(
    model: &str,
    image_bytes: &[u8],
    mime: &str,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    let response_format = ResponseFormat::JsonSchema {
        json_schema: ResponseFormatJsonSchema {
            description: Some("Retrieval description of a course image".into()),
            name: "image_description".into(),
            schema: Some(get_image_description_schema()),
            strict: Some(true),
        },
    };

    CreateChatCompletionRequestArgs::default()
        .model(model)
        .messages([
            ChatCompletionRequestSystemMessage::from(IMAGE_DESCRIPTION_SYSTEM_MESSAGE).into(),
            vision_message(IMAGE_DESCRIPTION_INSTRUCTIONS, image_bytes, mime)?.into(),
        ])
        .response_format(response_format)
        .build()
}

pub fn create_transcription_request(
    model: &str,
    image_bytes: &[u8],
    mime: &str,
) -> Result<CreateChatCompletionRequest, OpenAIError> {
    CreateChatCompletionRequestArgs::default()
        .model(model)
        .max_tokens(4096_u32)
        .messages([vision_message(IMAGE_TRANSCRIPTION_INSTRUCTIONS, image_bytes, mime)?.into()])
        .build()
}

fn vision_message(
    instructions: &str,
    image_bytes: &[u8],
    mime: &str,
) -> Result<async_openai::types::ChatCompletionRequestUserMessage, OpenAIError> {
    ChatCompletionRequestUserMessageArgs::default()
        .content(vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text(instructions)
                .build()?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(image_data_url(image_bytes, mime))
                        .detail(ImageDetail::High)
                        .build()?,
                )
                .build()?
                .into(),
        ])
        .build()
}
