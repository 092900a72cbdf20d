use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};
use common::error::AppError;

use crate::{api_state::ApiState, error::ApiError};

/// Serves stored originals at the urls handed out during ingestion.
pub async fn serve_file(
    State(state): State<ApiState>,
    Path(location): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    if location.split('/').any(|segment| segment == "..") {
        return Err(ApiError::ValidationError("Invalid file path".to_string()));
    }

    let bytes = match state.storage.get(&location).await {
        Ok(bytes) => bytes,
        Err(object_store::Error::NotFound { .. }) => {
            return Err(ApiError::NotFound(format!("File {location}")));
        }
        Err(err) => return Err(AppError::from(err).into()),
    };

    let content_type = mime_guess::from_path(&location)
        .first_or_octet_stream()
        .essence_str()
        .to_string();

    Ok(([(header::CONTENT_TYPE, content_type)], bytes))
}
