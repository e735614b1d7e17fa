//! Per-record downloads: original file, markdown, form script.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;

use crate::api::error::ApiError;
use crate::api::types::{attachment, ApiContext};
use crate::archive::{self, FormScriptExport, Language};
use crate::models::AssessmentRecord;

fn find_record(ctx: &ApiContext, id: &str) -> Result<AssessmentRecord, ApiError> {
    ctx.core
        .record(id)?
        .ok_or_else(|| ApiError::NotFound(format!("Record not found: {id}")))
}

fn parse_language(code: Option<&str>) -> Result<&'static Language, ApiError> {
    let code = code.unwrap_or(crate::ai::ORIGINAL_LANGUAGE);
    archive::find_language(code).ok_or_else(|| ApiError::BadRequest(format!("Unsupported language: {code}")))
}

/// `GET /api/records/:id/original`: the uploaded bytes, unmodified.
pub async fn original(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let record = find_record(&ctx, &id)?;
    let file = archive::original_file(&record)
        .map_err(|e| ApiError::Internal(format!("stored file payload is not valid base64: {e}")))?;

    let content_type = HeaderValue::from_str(&file.mime_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
    Ok((
        [(header::CONTENT_TYPE, content_type), attachment(&file.file_name)],
        file.bytes,
    )
        .into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct MarkdownQuery {
    pub lang: Option<String>,
}

/// `GET /api/records/:id/markdown?lang=`: "original" (default) makes no AI call.
pub async fn markdown(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Query(query): Query<MarkdownQuery>,
) -> Result<Response, ApiError> {
    let language = parse_language(query.lang.as_deref())?;
    let record = find_record(&ctx, &id)?;

    let export = ctx
        .run_blocking(move |core| {
            let _busy = if crate::ai::is_original_language(language.code) {
                None
            } else {
                Some(core.busy().begin(format!(
                    "TRANSLATING EXTRACTION TO {}...",
                    language.code.to_uppercase()
                )))
            };
            Ok(archive::export_markdown(core.ai().as_ref(), &record, language.code)?)
        })
        .await?;

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/markdown; charset=utf-8")),
            attachment(&export.file_name),
        ],
        export.content,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct FormScriptRequest {
    pub language: Option<String>,
}

/// `POST /api/records/:id/form-script`: Apps Script source that builds the form.
pub async fn form_script(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(request): Json<FormScriptRequest>,
) -> Result<Json<FormScriptExport>, ApiError> {
    let language = parse_language(request.language.as_deref())?;
    let record = find_record(&ctx, &id)?;

    let export = ctx
        .run_blocking(move |core| {
            let _busy = core.busy().begin(format!(
                "ARCHITECTING GOOGLE FORM IN {}...",
                language.code.to_uppercase()
            ));
            Ok(archive::export_form_script(core.ai().as_ref(), &record, language.code)?)
        })
        .await?;
    Ok(Json(export))
}
