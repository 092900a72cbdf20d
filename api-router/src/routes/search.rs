use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::{api_state::ApiState, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PreviewParams {
    pub course_id: String,
    pub q: String,
    #[serde(default)]
    pub k: Option<usize>,
}

/// Raw vector hits for a query, without generation.
pub async fn search_preview(
    State(state): State<ApiState>,
    Query(params): Query<PreviewParams>,
) -> Result<impl IntoResponse, ApiError> {
    if params.q.trim().is_empty() {
        return Err(ApiError::ValidationError("q must not be empty".to_string()));
    }

    let hits = state
        .answers
        .preview(params.course_id.trim(), &params.q, params.k)
        .await?;

    Ok(Json(json!({ "ok": true, "hits": hits })))
}
