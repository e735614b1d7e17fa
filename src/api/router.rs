//! API router.
//!
//! Returns a composable `Router` with every route nested under `/api/`.
//! CORS is open so a front-end served from another origin can call it.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

use crate::api::endpoints::{export, health, import, records};
use crate::api::types::ApiContext;
use crate::core_state::CoreState;
use crate::pipeline::import::MAX_FILE_SIZE_BYTES;

/// Files per upload request times the per-file ceiling, plus multipart overhead.
const MAX_UPLOAD_FILES: usize = 10;
const MAX_UPLOAD_BODY_BYTES: usize = MAX_UPLOAD_FILES * MAX_FILE_SIZE_BYTES + 64 * 1024;

pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(health::check))
        .route("/status", get(health::status))
        .route("/languages", get(health::languages))
        .route("/records", get(records::list))
        .route("/records/:id", get(records::detail).delete(records::delete))
        .route("/records/:id/original", get(export::original))
        .route("/records/:id/markdown", get(export::markdown))
        .route("/records/:id/form-script", post(export::form_script))
        .route("/records/:id/select", post(records::select))
        .route("/active", get(records::active))
        .route(
            "/import",
            post(import::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BODY_BYTES)),
        )
        .route("/pending", get(import::pending))
        .route("/pending/:id", delete(import::discard))
        .route("/pending/:id/confirm", post(import::confirm))
        .with_state(ctx);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new().nest("/api", routes).layer(cors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::ai::{AiError, MockAssessmentAi};
    use crate::db::{RecordStore, SqliteRecordStore};
    use crate::models::{AnalysisResult, AssessmentRecord, UploadedFile};

    const BOUNDARY: &str = "----vault-test-boundary";

    fn analysis(name: &str, canonical: &str, items: u32) -> AnalysisResult {
        AnalysisResult {
            contains_test: true,
            test_name: name.into(),
            canonical_name: canonical.into(),
            item_count: items,
            administration_mode: "Self-report".into(),
            test_type: "Questionnaire".into(),
            test_purpose: format!("{name} purpose"),
            is_self_report: true,
            extracted_content: "1. Item".into(),
            ..Default::default()
        }
    }

    fn seeded(name: &str) -> AssessmentRecord {
        AssessmentRecord::from_analysis(
            analysis(name, name, 10),
            &UploadedFile {
                file_name: format!("{}.pdf", name.to_lowercase()),
                mime_type: "application/pdf".into(),
                bytes: b"%PDF-1.4 original".to_vec(),
            },
        )
    }

    fn test_core(ai: MockAssessmentAi, seed: &[AssessmentRecord]) -> (Arc<SqliteRecordStore>, Arc<CoreState>) {
        let store = Arc::new(SqliteRecordStore::in_memory());
        for record in seed {
            store.save(record).unwrap();
        }
        let core = CoreState::load(store.clone(), Arc::new(ai)).unwrap();
        (store, Arc::new(core))
    }

    fn multipart_body(files: &[(&str, &str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, mime, content) in files {
            body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"files\"; filename=\"{name}\"\r\n").as_bytes(),
            );
            body.extend_from_slice(format!("Content-Type: {mime}\r\n\r\n").as_bytes());
            body.extend_from_slice(content.as_bytes());
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn import_request(files: &[(&str, &str, &str)]) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/import")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(Body::from(multipart_body(files)))
            .unwrap()
    }

    fn request(method: &str, uri: &str) -> Request<Body> {
        Request::builder().method(method).uri(uri).body(Body::empty()).unwrap()
    }

    async fn json(response: axum::response::Response) -> serde_json::Value {
        let body = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn health_ok() {
        let (_, core) = test_core(MockAssessmentAi::new(), &[]);
        let response = api_router(core).oneshot(request("GET", "/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn unknown_route_404() {
        let (_, core) = test_core(MockAssessmentAi::new(), &[]);
        let response = api_router(core).oneshot(request("GET", "/api/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn languages_listed() {
        let (_, core) = test_core(MockAssessmentAi::new(), &[]);
        let response = api_router(core).oneshot(request("GET", "/api/languages")).await.unwrap();
        let body = json(response).await;
        assert_eq!(body.as_array().unwrap().len(), 9);
        assert_eq!(body[0]["code"], "original");
    }

    #[tokio::test]
    async fn records_search_filters() {
        let beck = seeded("Beck Depression Inventory");
        let hamilton = seeded("Hamilton Anxiety Scale");
        let (_, core) = test_core(MockAssessmentAi::new(), &[beck, hamilton]);

        let response = api_router(core.clone())
            .oneshot(request("GET", "/api/records?q=beck"))
            .await
            .unwrap();
        let body = json(response).await;
        let list = body.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["testName"], "Beck Depression Inventory");
        assert!(list[0].get("fileData").is_none());

        let response = api_router(core).oneshot(request("GET", "/api/records")).await.unwrap();
        assert_eq!(json(response).await.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn record_detail_and_missing() {
        let beck = seeded("Beck");
        let id = beck.id.clone();
        let (_, core) = test_core(MockAssessmentAi::new(), &[beck]);

        let response = api_router(core.clone())
            .oneshot(request("GET", &format!("/api/records/{id}")))
            .await
            .unwrap();
        assert_eq!(json(response).await["id"], id.as_str());

        let response = api_router(core).oneshot(request("GET", "/api/records/missing")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn original_download_is_byte_exact() {
        let beck = seeded("Beck");
        let id = beck.id.clone();
        let (_, core) = test_core(MockAssessmentAi::new(), &[beck]);

        let response = api_router(core)
            .oneshot(request("GET", &format!("/api/records/{id}/original")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"%PDF-1.4 original");
    }

    #[tokio::test]
    async fn markdown_original_and_translated() {
        let beck = seeded("Beck Depression Inventory");
        let id = beck.id.clone();
        let ai = MockAssessmentAi::new().with_translation(Ok("# Inventario".into()));
        let (_, core) = test_core(ai, &[beck]);

        let response = api_router(core.clone())
            .oneshot(request("GET", &format!("/api/records/{id}/markdown")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response.headers()[header::CONTENT_DISPOSITION].to_str().unwrap().to_string();
        assert!(disposition.contains("Beck_Depression_Inventory_ORIGINAL.md"));
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Clinical Specifications"));

        let response = api_router(core.clone())
            .oneshot(request("GET", &format!("/api/records/{id}/markdown?lang=Spanish")))
            .await
            .unwrap();
        let body = to_bytes(response.into_body(), 64 * 1024).await.unwrap();
        assert_eq!(&body[..], b"# Inventario");

        let response = api_router(core)
            .oneshot(request("GET", &format!("/api/records/{id}/markdown?lang=Klingon")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn form_script_quota_error() {
        let beck = seeded("Beck");
        let id = beck.id.clone();
        let ai = MockAssessmentAi::new().with_form_script(Err(AiError::QuotaExhausted));
        let (_, core) = test_core(ai, &[beck]);

        let response = api_router(core.clone())
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/records/{id}/form-script"))
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"language":"French"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json(response).await["error"]["code"], "QUOTA_EXHAUSTED");
        assert!(!core.busy().is_busy());
    }

    #[tokio::test]
    async fn import_confirm_flow() {
        let ai = MockAssessmentAi::new().with_analysis(Ok(analysis("PHQ-9", "Patient Health Questionnaire", 9)));
        let (store, core) = test_core(ai, &[]);

        let response = api_router(core.clone())
            .oneshot(import_request(&[
                ("notes.docx", "application/msword", "PK"),
                ("phq9.pdf", "application/pdf", "%PDF-1.7"),
            ]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report = json(response).await;
        assert_eq!(report["files"][0]["status"], "skipped");
        assert_eq!(report["files"][1]["status"], "pending");
        let pending_id = report["files"][1]["record"]["id"].as_str().unwrap().to_string();
        assert!(store.list_all().unwrap().is_empty());

        let response = api_router(core.clone()).oneshot(request("GET", "/api/pending")).await.unwrap();
        assert_eq!(json(response).await.as_array().unwrap().len(), 1);

        let response = api_router(core.clone())
            .oneshot(request("POST", &format!("/api/pending/{pending_id}/confirm")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(store.list_all().unwrap().len(), 1);

        let response = api_router(core).oneshot(request("GET", "/api/active")).await.unwrap();
        assert_eq!(json(response).await["id"], pending_id.as_str());
    }

    #[tokio::test]
    async fn import_discard_flow() {
        let ai = MockAssessmentAi::new().with_analysis(Ok(analysis("PHQ-9", "Patient Health Questionnaire", 9)));
        let (store, core) = test_core(ai, &[]);

        let response = api_router(core.clone())
            .oneshot(import_request(&[("phq9.txt", "text/plain", "1. Little interest")]))
            .await
            .unwrap();
        let report = json(response).await;
        let pending_id = report["files"][0]["record"]["id"].as_str().unwrap().to_string();

        let response = api_router(core.clone())
            .oneshot(request("DELETE", &format!("/api/pending/{pending_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(store.list_all().unwrap().is_empty());

        let response = api_router(core)
            .oneshot(request("POST", &format!("/api/pending/{pending_id}/confirm")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn import_without_files_is_bad_request() {
        let (_, core) = test_core(MockAssessmentAi::new(), &[]);
        let response = api_router(core).oneshot(import_request(&[])).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_moves_selection() {
        let older = seeded("Older");
        let mut newer = seeded("Newer");
        newer.uploaded_at = older.uploaded_at + chrono::Duration::seconds(5);
        let (older_id, newer_id) = (older.id.clone(), newer.id.clone());
        let (store, core) = test_core(MockAssessmentAi::new(), &[older, newer]);
        assert_eq!(core.active_record().unwrap().unwrap().id, newer_id);

        let response = api_router(core.clone())
            .oneshot(request("DELETE", &format!("/api/records/{newer_id}")))
            .await
            .unwrap();
        assert_eq!(json(response).await["deleted"], true);
        assert_eq!(core.active_record().unwrap().unwrap().id, older_id);

        let response = api_router(core)
            .oneshot(request("DELETE", &format!("/api/records/{newer_id}")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json(response).await["deleted"], false);
        assert_eq!(store.list_all().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn select_and_status() {
        let older = seeded("Older");
        let mut newer = seeded("Newer");
        newer.uploaded_at = older.uploaded_at + chrono::Duration::seconds(5);
        let older_id = older.id.clone();
        let (_, core) = test_core(MockAssessmentAi::new(), &[older, newer]);

        let response = api_router(core.clone())
            .oneshot(request("POST", &format!("/api/records/{older_id}/select")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = api_router(core.clone()).oneshot(request("GET", "/api/status")).await.unwrap();
        let status = json(response).await;
        assert_eq!(status["busy"], false);
        assert_eq!(status["activeId"], older_id.as_str());
        assert_eq!(status["stats"]["total"], 2);
        assert_eq!(status["stats"]["selfReport"], 2);

        let response = api_router(core)
            .oneshot(request("POST", "/api/records/missing/select"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
