use serde_json::json;

pub static IMAGE_DESCRIPTION_SYSTEM_MESSAGE: &str = "You are an expert assistant in image recognition and description for a school study-based retrieval system.";

pub static IMAGE_DESCRIPTION_INSTRUCTIONS: &str = r#"Given an image from course materials, describe it for retrieval.
Return ONLY JSON (no prose) with this shape:
{ "caption": string, "keywords": string[], "topic": string }
caption: one precise sentence for retrieval.
keywords: 3-6 short domain terms.
topic: short course topic like "Heat Equation"."#;

pub static IMAGE_TRANSCRIPTION_INSTRUCTIONS: &str = r#"Transcribe every piece of text visible in this image verbatim, including handwritten notes, axis labels and equation fragments.
Respond with the transcription only. If the image contains no text, respond with an empty message."#;

pub fn get_image_description_schema() -> serde_json::Value {
    json!({
        "type": "object",
        "properties": {
            "caption": { "type": "string" },
            "keywords": {
                "type": "array",
                "items": { "type": "string" }
            },
            "topic": { "type": "string" }
        },
        "required": ["caption", "keywords", "topic"],
        "additionalProperties": false
    })
}
