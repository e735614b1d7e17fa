//! Upload, pending review, confirm and discard.

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{AssessmentRecord, RecordSummary, UploadedFile};
use crate::pipeline::import::{resolve_mime, ImportReport, ImportWorkflow};

/// `POST /api/import`: multipart upload of one or more files.
///
/// Every part that carries a filename is treated as a file. Parts are
/// analyzed in the order received.
pub async fn upload(
    State(ctx): State<ApiContext>,
    mut multipart: Multipart,
) -> Result<Json<ImportReport>, ApiError> {
    let mut uploads = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Malformed multipart body: {e}")))?
    {
        let Some(file_name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let declared = field.content_type().map(str::to_string);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Failed to read file data: {e}")))?;

        uploads.push(UploadedFile {
            mime_type: resolve_mime(&file_name, declared.as_deref(), &bytes),
            file_name,
            bytes: bytes.to_vec(),
        });
    }

    if uploads.is_empty() {
        return Err(ApiError::BadRequest("No file provided.".into()));
    }

    tracing::info!(files = uploads.len(), "Import batch received");
    let report = ctx
        .run_blocking(move |core| Ok(ImportWorkflow::new(core).run_batch(uploads)?))
        .await?;
    Ok(Json(report))
}

/// `GET /api/pending`: candidates awaiting confirmation, oldest first.
pub async fn pending(State(ctx): State<ApiContext>) -> Result<Json<Vec<RecordSummary>>, ApiError> {
    let pending = ctx.core.pending()?;
    Ok(Json(pending.iter().map(AssessmentRecord::summary).collect()))
}

/// `POST /api/pending/:id/confirm`: persist and make active.
pub async fn confirm(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<RecordSummary>, ApiError> {
    let record = ctx
        .run_blocking(move |core| Ok(ImportWorkflow::new(core).confirm(&id)?))
        .await?;
    Ok(Json(record.summary()))
}

/// `DELETE /api/pending/:id`: drop without touching the store.
pub async fn discard(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    ImportWorkflow::new(&ctx.core).discard(&id)?;
    Ok(StatusCode::NO_CONTENT)
}
