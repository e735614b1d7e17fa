//! Archive browsing: list/search, detail, selection, deletion.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::archive;
use crate::models::{AssessmentRecord, RecordSummary};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// `GET /api/records?q=`: newest first, filtered by the search term.
pub async fn list(
    State(ctx): State<ApiContext>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<RecordSummary>>, ApiError> {
    let summaries: Vec<RecordSummary> = ctx.core.with_records(|records| {
        archive::search(records, &query.q)
            .into_iter()
            .map(AssessmentRecord::summary)
            .collect()
    })?;
    Ok(Json(summaries))
}

/// `GET /api/records/:id`: full record including the file payload.
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<AssessmentRecord>, ApiError> {
    ctx.core
        .record(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Record not found: {id}")))
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

/// `DELETE /api/records/:id`: store first, then the working set.
/// Deleting an unknown id succeeds with `deleted: false`.
pub async fn delete(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let deleted = ctx
        .run_blocking(move |core| {
            let _busy = core.busy().begin("DELETING RECORD...");
            Ok(core.delete_record(&id)?)
        })
        .await?;
    Ok(Json(DeleteResponse { deleted }))
}

/// `POST /api/records/:id/select`
pub async fn select(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<RecordSummary>, ApiError> {
    if !ctx.core.select(&id)? {
        return Err(ApiError::NotFound(format!("Record not found: {id}")));
    }
    ctx.core
        .record(&id)?
        .map(|r| Json(r.summary()))
        .ok_or_else(|| ApiError::NotFound(format!("Record not found: {id}")))
}

/// `GET /api/active`: the selected record, or `null`.
pub async fn active(
    State(ctx): State<ApiContext>,
) -> Result<Json<Option<AssessmentRecord>>, ApiError> {
    Ok(Json(ctx.core.active_record()?))
}
