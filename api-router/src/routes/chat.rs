use axum::{extract::State, response::IntoResponse, Json};
use retrieval_pipeline::{AnswerRequest, AssistanceLevel, InteractionMode};
use serde::Deserialize;

use crate::{api_state::ApiState, error::ApiError};

/// Level and mode arrive as free text; unknown values fall back to the defaults.
#[derive(Debug, Deserialize)]
pub struct ChatIn {
    pub course_id: String,
    pub question: String,
    #[serde(default)]
    pub assistance_level: Option<String>,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub k: Option<usize>,
}

pub async fn chat_ask(
    State(state): State<ApiState>,
    Json(payload): Json<ChatIn>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.course_id.trim().is_empty() {
        return Err(ApiError::ValidationError("course_id is required".to_string()));
    }

    let request = AnswerRequest {
        course_id: payload.course_id.trim().to_string(),
        question: payload.question,
        assistance_level: AssistanceLevel::resolve(payload.assistance_level.as_deref()),
        mode: InteractionMode::resolve(payload.mode.as_deref()),
        k: payload.k,
    };

    let response = state.answers.answer_question(request).await?;

    Ok(Json(response))
}
