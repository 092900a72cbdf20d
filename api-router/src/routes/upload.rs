use axum::{extract::State, http::HeaderMap, response::IntoResponse, Json};
use axum_typed_multipart::{FieldData, TryFromMultipart, TypedMultipart};
use bytes::Bytes;
use common::error::AppError;
use ingestion_pipeline::{ImageUpload, PdfUpload};
use serde_json::json;
use tempfile::NamedTempFile;
use tracing::info;

use crate::{api_state::ApiState, error::ApiError, middleware_owner::resolve_owner};

const PDF_CONTENT_TYPES: [&str; 2] = ["application/pdf", "application/x-pdf"];

#[derive(Debug, TryFromMultipart)]
pub struct UploadParams {
    pub course_id: String,
    pub owner_id: Option<String>,
    pub title: Option<String>,
    #[form_data(limit = "104857600")]
    pub file: FieldData<NamedTempFile>,
}

struct ReceivedFile {
    course_id: String,
    file_name: Option<String>,
    content_type: Option<String>,
    title: Option<String>,
    bytes: Bytes,
}

async fn receive(state: &ApiState, input: UploadParams) -> Result<ReceivedFile, ApiError> {
    let course_id = input.course_id.trim().to_string();
    if course_id.is_empty() {
        return Err(ApiError::ValidationError("course_id is required".to_string()));
    }

    let bytes = tokio::fs::read(input.file.contents.path())
        .await
        .map_err(AppError::from)?;
    let limit = state.config.upload_max_body_bytes;
    if bytes.len() > limit {
        return Err(ApiError::PayloadTooLarge(format!(
            "Upload exceeds {limit} bytes"
        )));
    }

    Ok(ReceivedFile {
        course_id,
        file_name: input.file.metadata.file_name.clone(),
        content_type: input.file.metadata.content_type.clone(),
        title: input.title.filter(|t| !t.trim().is_empty()),
        bytes: Bytes::from(bytes),
    })
}

/// Drops leading ASCII whitespace some clients put before the PDF header.
fn strip_leading_whitespace(bytes: Bytes) -> Bytes {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    bytes.slice(start..)
}

pub async fn upload_pdf(
    State(state): State<ApiState>,
    headers: HeaderMap,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = resolve_owner(&headers, input.owner_id.as_deref())?;
    let file = receive(&state, input).await?;

    if let Some(content_type) = file.content_type.as_deref() {
        if !PDF_CONTENT_TYPES.contains(&content_type) {
            return Err(ApiError::UnsupportedMediaType(
                "Only PDF files are allowed.".to_string(),
            ));
        }
    }

    let bytes = strip_leading_whitespace(file.bytes);
    if !bytes.starts_with(b"%PDF-") {
        return Err(ApiError::ValidationError(
            "Uploaded file is not a valid PDF.".to_string(),
        ));
    }

    info!(
        owner_id = %owner.0,
        course_id = %file.course_id,
        bytes = bytes.len(),
        "Received PDF upload"
    );

    let title = file
        .title
        .or_else(|| file.file_name.clone())
        .unwrap_or_else(|| "Untitled.pdf".to_string());
    let report = state
        .ingestion
        .ingest_pdf(PdfUpload {
            owner_id: owner.0,
            course_id: file.course_id.clone(),
            title,
            bytes,
        })
        .await?;

    Ok(Json(json!({
        "ok": true,
        "course_id": file.course_id,
        "filename": file.file_name,
        "result": report,
    })))
}

pub async fn upload_image(
    State(state): State<ApiState>,
    headers: HeaderMap,
    TypedMultipart(input): TypedMultipart<UploadParams>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = resolve_owner(&headers, input.owner_id.as_deref())?;
    let file = receive(&state, input).await?;

    if let Some(content_type) = file.content_type.as_deref() {
        if !content_type.starts_with("image/") && content_type != "application/octet-stream" {
            return Err(ApiError::UnsupportedMediaType(
                "Only image files are allowed.".to_string(),
            ));
        }
    }
    if file.bytes.is_empty() {
        return Err(ApiError::ValidationError("Uploaded image is empty.".to_string()));
    }

    info!(
        owner_id = %owner.0,
        course_id = %file.course_id,
        bytes = file.bytes.len(),
        "Received image upload"
    );

    let report = state
        .ingestion
        .ingest_image(ImageUpload {
            owner_id: owner.0,
            course_id: file.course_id.clone(),
            title: file.title,
            file_name: file.file_name.clone(),
            content_type: file.content_type,
            bytes: file.bytes,
        })
        .await?;

    Ok(Json(json!({
        "ok": true,
        "course_id": file.course_id,
        "filename": file.file_name,
        "result": report,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_whitespace_before_pdf_header() {
        let bytes = strip_leading_whitespace(Bytes::from_static(b" \r\n%PDF-1.4"));
        assert!(bytes.starts_with(b"%PDF-"));
        assert!(strip_leading_whitespace(Bytes::from_static(b"   ")).is_empty());
    }
}
