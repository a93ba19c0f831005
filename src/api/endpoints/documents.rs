//! Document endpoints.
//!
//! `POST /api/upload-document`: multipart upload of one scan, run through
//! the upload dispatcher.
//! `GET /api/document-types`: registered tags.

use axum::extract::{Multipart, State};
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{AnalysisView, ApiContext, DocumentTypeInfo, UploadResponse};
use crate::models::DocumentType;
use crate::pipeline::UploadRequest;

/// Parsed multipart form.
#[derive(Debug, Default)]
struct UploadForm {
    image: Option<(Option<String>, Vec<u8>)>,
    user_id: Option<String>,
    document_type: Option<String>,
    timestamp: Option<String>,
}

async fn read_form(multipart: &mut Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" => {
                let file_name = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read image: {e}")))?;
                form.image = Some((file_name, bytes.to_vec()));
            }
            "userId" | "documentType" | "timestamp" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(format!("Failed to read '{name}': {e}")))?;
                let slot = match name.as_str() {
                    "userId" => &mut form.user_id,
                    "documentType" => &mut form.document_type,
                    _ => &mut form.timestamp,
                };
                *slot = Some(text.trim().to_string()).filter(|t| !t.is_empty());
            }
            _ => {}
        }
    }

    Ok(form)
}

fn parse_user_id(raw: Option<&str>) -> Result<i64, ApiError> {
    let raw = raw.ok_or_else(|| ApiError::BadRequest("userId is required".into()))?;
    raw.parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("userId must be an integer, got '{raw}'")))
}

/// `POST /api/upload-document`
pub async fn upload(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let form = read_form(&mut multipart).await?;

    let (file_name, image) = form.image.unwrap_or_default();
    if image.is_empty() {
        return Err(ApiError::NoFileProvided);
    }
    let user_id = parse_user_id(form.user_id.as_deref())?;
    let document_type = form
        .document_type
        .unwrap_or_else(|| DocumentType::Other.as_str().to_string());
    let timestamp = form
        .timestamp
        .unwrap_or_else(|| chrono::Local::now().to_rfc3339());
    let size = image.len() as u64;

    tracing::info!(user_id, document_type = %document_type, size, "Upload received");

    let request = UploadRequest {
        image,
        file_name,
        user_id,
        document_type,
    };
    let outcome = ctx.dispatcher.handle(&request).await?;

    let message = if outcome.success {
        "Document uploaded and analysed".to_string()
    } else {
        "Document was rejected by the analysis".to_string()
    };
    let (filename, filepath) = match outcome.stored {
        Some(stored) => (Some(stored.filename), Some(stored.filepath)),
        None => (None, None),
    };

    Ok(Json(UploadResponse {
        success: outcome.success,
        message,
        filename,
        filepath,
        size,
        timestamp,
        user_id,
        document_type: outcome.document_type.as_str().to_string(),
        analysis: AnalysisView {
            result: outcome.analysis,
            persistence: outcome.persistence,
        },
        warnings: outcome.warnings,
    }))
}

/// `GET /api/document-types`
pub async fn types(State(ctx): State<ApiContext>) -> Json<Vec<DocumentTypeInfo>> {
    let types = ctx
        .dispatcher
        .registry()
        .entries()
        .map(|entry| DocumentTypeInfo {
            tag: entry.document_type.as_str(),
            shape: entry.output_shape.schema_name(),
            persists: entry.persists(),
        })
        .collect();
    Json(types)
}
