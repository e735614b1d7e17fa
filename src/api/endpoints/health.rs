//! Health, status and language list.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::archive::{ArchiveStats, Language, LANGUAGES};

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub name: &'static str,
    pub version: &'static str,
}

/// `GET /api/health`
pub async fn check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: crate::config::APP_NAME,
        version: crate::config::APP_VERSION,
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub busy: bool,
    /// Status message of the operation in flight.
    pub message: Option<String>,
    pub pending: usize,
    pub active_id: Option<String>,
    pub stats: ArchiveStats,
}

/// `GET /api/status`: busy indicator and dashboard counters.
pub async fn status(State(ctx): State<ApiContext>) -> Result<Json<StatusResponse>, ApiError> {
    let core = &ctx.core;
    let message = core.busy().current();
    let stats = core.with_records(|records| ArchiveStats::compute(records, core.session_started_at))?;

    Ok(Json(StatusResponse {
        busy: message.is_some(),
        message,
        pending: core.pending()?.len(),
        active_id: core.active_record()?.map(|r| r.id),
        stats,
    }))
}

/// `GET /api/languages`
pub async fn languages() -> Json<&'static [Language]> {
    Json(LANGUAGES)
}
