//! Remote record store: a PostgREST-style table service over HTTP.
//!
//! Records travel as JSON rows whose column names are the lower-cased
//! camelCase field names (`testName` ↔ `testname`). The column table below
//! is the single source of truth for that mapping, so every field including
//! `containsTest` survives the round trip.

use std::time::Duration;

use serde_json::{Map, Value};

use super::{RecordStore, StoreError};
use crate::models::AssessmentRecord;

/// Request timeout for remote store calls.
pub const REMOTE_TIMEOUT_SECS: u64 = 30;

/// Serialized record field names, in column order.
pub const RECORD_FIELDS: &[&str] = &[
    "id",
    "testName",
    "canonicalName",
    "itemCount",
    "fileName",
    "fileData",
    "mimeType",
    "description",
    "testType",
    "administrationMethod",
    "testPurpose",
    "ageTarget",
    "isSelfReport",
    "extractedContent",
    "uploadedAt",
    "containsTest",
];

/// HTTP client for a remote table of assessment records.
pub struct RemoteTableStore {
    base_url: String,
    api_key: Option<String>,
    table: String,
    client: reqwest::blocking::Client,
}

impl RemoteTableStore {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        table: &str,
        timeout_secs: u64,
    ) -> Result<Self, StoreError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            table: table.to_string(),
            client,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.api_key {
            Some(key) => request.header("apikey", key).bearer_auth(key),
            None => request,
        }
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> Result<reqwest::blocking::Response, StoreError> {
        let response = self
            .authorize(request)
            .send()
            .map_err(|e| StoreError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            tracing::warn!(status = status.as_u16(), table = %self.table, "Remote store request failed");
            return Err(StoreError::Remote {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

impl RecordStore for RemoteTableStore {
    fn list_all(&self) -> Result<Vec<AssessmentRecord>, StoreError> {
        let order = format!("{}.desc", to_column("uploadedAt"));
        let request = self
            .client
            .get(self.table_url())
            .query(&[("select", "*"), ("order", order.as_str())]);

        let rows: Vec<Value> = self
            .send(request)?
            .json()
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        rows.into_iter().map(record_from_row).collect()
    }

    fn save(&self, record: &AssessmentRecord) -> Result<(), StoreError> {
        let row = record_to_row(record)?;
        let request = self
            .client
            .post(self.table_url())
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&vec![row]);

        self.send(request)?;
        tracing::debug!(record_id = %record.id, "Record saved to remote store");
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        let filter = format!("eq.{id}");
        let request = self
            .client
            .delete(self.table_url())
            .query(&[("id", filter.as_str())]);

        self.send(request)?;
        Ok(())
    }
}

/// Column name for a record field.
pub fn to_column(field: &str) -> String {
    field.to_ascii_lowercase()
}

/// Record field for a column name, if the column belongs to the record.
pub fn to_field(column: &str) -> Option<&'static str> {
    RECORD_FIELDS
        .iter()
        .copied()
        .find(|field| field.eq_ignore_ascii_case(column))
}

/// Serialize a record into a row keyed by column names.
pub fn record_to_row(record: &AssessmentRecord) -> Result<Value, StoreError> {
    let value = serde_json::to_value(record).map_err(|e| StoreError::Malformed(e.to_string()))?;
    let Value::Object(fields) = value else {
        return Err(StoreError::Malformed("record did not serialize to an object".into()));
    };

    let row: Map<String, Value> = fields
        .into_iter()
        .map(|(field, v)| (to_column(&field), v))
        .collect();
    Ok(Value::Object(row))
}

/// Parse a row keyed by column names back into a record.
/// Columns that are not record fields (e.g. `created_at` defaults) are ignored.
pub fn record_from_row(row: Value) -> Result<AssessmentRecord, StoreError> {
    let Value::Object(columns) = row else {
        return Err(StoreError::Malformed("row is not a JSON object".into()));
    };

    let fields: Map<String, Value> = columns
        .into_iter()
        .filter_map(|(column, v)| to_field(&column).map(|field| (field.to_string(), v)))
        .collect();

    serde_json::from_value(Value::Object(fields)).map_err(|e| StoreError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::extract::State;
    use axum::http::{HeaderMap, Method, StatusCode, Uri};
    use axum::Router;

    use super::*;
    use crate::models::{AnalysisResult, UploadedFile};

    fn sample() -> AssessmentRecord {
        let analysis = AnalysisResult {
            contains_test: true,
            test_name: "Beck Depression Inventory".into(),
            canonical_name: "Beck Depression Inventory".into(),
            item_count: 21,
            administration_mode: "Self-report".into(),
            test_type: "Self-report".into(),
            administration_method: "Questionnaire".into(),
            test_purpose: "Depression severity.".into(),
            age_target: "13-80".into(),
            is_self_report: true,
            extracted_content: "1. Sadness".into(),
        };
        AssessmentRecord::from_analysis(
            analysis,
            &UploadedFile {
                file_name: "bdi.txt".into(),
                mime_type: "text/plain".into(),
                bytes: b"Sadness\n".to_vec(),
            },
        )
    }

    #[test]
    fn row_uses_lowercase_columns() {
        let row = record_to_row(&sample()).unwrap();
        assert_eq!(row["testname"], "Beck Depression Inventory");
        assert_eq!(row["containstest"], true);
        assert_eq!(row["isselfreport"], true);
        assert!(row.get("testName").is_none());
    }

    #[test]
    fn row_round_trip_is_exact() {
        let record = sample();
        let row = record_to_row(&record).unwrap();
        assert_eq!(record_from_row(row).unwrap(), record);
    }

    #[test]
    fn field_table_covers_every_serialized_field() {
        let value = serde_json::to_value(sample()).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), RECORD_FIELDS.len());
        for key in object.keys() {
            assert!(RECORD_FIELDS.contains(&key.as_str()), "missing field {key}");
        }
    }

    #[test]
    fn unknown_columns_ignored() {
        let mut row = record_to_row(&sample()).unwrap();
        row.as_object_mut()
            .unwrap()
            .insert("created_at".into(), Value::String("2026-01-01".into()));
        assert!(record_from_row(row).is_ok());
    }

    #[test]
    fn missing_column_is_malformed() {
        let mut row = record_to_row(&sample()).unwrap();
        row.as_object_mut().unwrap().remove("containstest");
        assert!(matches!(record_from_row(row), Err(StoreError::Malformed(_))));
    }

    #[test]
    fn remote_timestamp_with_offset_parses() {
        let mut row = record_to_row(&sample()).unwrap();
        row.as_object_mut()
            .unwrap()
            .insert("uploadedat".into(), Value::String("2026-10-18T09:30:00.250+00:00".into()));
        let record = record_from_row(row).unwrap();
        assert_eq!(record.uploaded_at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn table_url_trims_trailing_slash() {
        let store = RemoteTableStore::new("https://db.example.org/", None, "tests", 5).unwrap();
        assert_eq!(store.table_url(), "https://db.example.org/rest/v1/tests");
    }

    // ── HTTP contract against a local table service ─────────

    #[derive(Debug, Clone)]
    struct Captured {
        method: Method,
        path: String,
        query: String,
        apikey: Option<String>,
        authorization: Option<String>,
        prefer: Option<String>,
        body: String,
    }

    #[derive(Clone)]
    struct Stub {
        status: StatusCode,
        reply: String,
        seen: Arc<Mutex<Vec<Captured>>>,
    }

    fn header(headers: &HeaderMap, name: &str) -> Option<String> {
        headers.get(name).and_then(|v| v.to_str().ok()).map(String::from)
    }

    async fn record_request(
        State(stub): State<Stub>,
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: String,
    ) -> (StatusCode, String) {
        stub.seen.lock().unwrap().push(Captured {
            method,
            path: uri.path().to_string(),
            query: uri.query().unwrap_or_default().to_string(),
            apikey: header(&headers, "apikey"),
            authorization: header(&headers, "authorization"),
            prefer: header(&headers, "prefer"),
            body,
        });
        (stub.status, stub.reply.clone())
    }

    /// Serve `reply` with `status` for every request; returns the base URL,
    /// the captured requests and the runtime that keeps the server alive.
    fn table_service(
        status: StatusCode,
        reply: String,
    ) -> (String, Arc<Mutex<Vec<Captured>>>, tokio::runtime::Runtime) {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()
            .unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stub = Stub {
            status,
            reply,
            seen: seen.clone(),
        };
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap();
        let app = Router::new().fallback(record_request).with_state(stub);
        runtime.spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen, runtime)
    }

    fn single(seen: &Arc<Mutex<Vec<Captured>>>) -> Captured {
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        seen[0].clone()
    }

    #[test]
    fn list_orders_newest_first_and_authenticates() {
        let record = sample();
        let rows = serde_json::to_string(&vec![record_to_row(&record).unwrap()]).unwrap();
        let (url, seen, _runtime) = table_service(StatusCode::OK, rows);
        let store = RemoteTableStore::new(&url, Some("anon-key".into()), "assessments", 5).unwrap();

        assert_eq!(store.list_all().unwrap(), vec![record]);

        let request = single(&seen);
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/rest/v1/assessments");
        assert!(request.query.contains("select=*"), "{}", request.query);
        assert!(request.query.contains("order=uploadedat.desc"), "{}", request.query);
        assert_eq!(request.apikey.as_deref(), Some("anon-key"));
        assert_eq!(request.authorization.as_deref(), Some("Bearer anon-key"));
    }

    #[test]
    fn save_upserts_lowercase_row() {
        let (url, seen, _runtime) = table_service(StatusCode::CREATED, String::new());
        let store = RemoteTableStore::new(&url, Some("k".into()), "assessments", 5).unwrap();
        let record = sample();

        store.save(&record).unwrap();

        let request = single(&seen);
        assert_eq!(request.method, Method::POST);
        assert!(request
            .prefer
            .as_deref()
            .unwrap_or_default()
            .contains("resolution=merge-duplicates"));
        let body: Value = serde_json::from_str(&request.body).unwrap();
        assert_eq!(body[0]["id"], record.id.as_str());
        assert_eq!(body[0]["testname"], "Beck Depression Inventory");
        assert_eq!(body[0]["containstest"], true);
    }

    #[test]
    fn delete_filters_by_id() {
        let (url, seen, _runtime) = table_service(StatusCode::NO_CONTENT, String::new());
        let store = RemoteTableStore::new(&url, None, "assessments", 5).unwrap();

        store.delete("abc-123").unwrap();

        let request = single(&seen);
        assert_eq!(request.method, Method::DELETE);
        assert_eq!(request.query, "id=eq.abc-123");
        assert!(request.apikey.is_none());
        assert!(request.authorization.is_none());
    }

    #[test]
    fn error_status_maps_to_remote_error() {
        let (url, _seen, _runtime) =
            table_service(StatusCode::INTERNAL_SERVER_ERROR, "relation does not exist".into());
        let store = RemoteTableStore::new(&url, None, "assessments", 5).unwrap();

        match store.save(&sample()) {
            Err(StoreError::Remote { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "relation does not exist");
            }
            other => panic!("unexpected result {other:?}"),
        }
        assert!(matches!(store.list_all(), Err(StoreError::Remote { status: 500, .. })));
        assert!(matches!(store.delete("x"), Err(StoreError::Remote { status: 500, .. })));
    }

    #[test]
    fn unreachable_service_is_transport_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        drop(listener);
        let store = RemoteTableStore::new(&url, None, "assessments", 2).unwrap();
        assert!(matches!(store.list_all(), Err(StoreError::Transport(_))));
    }

    #[test]
    fn to_field_maps_back() {
        assert_eq!(to_field("administrationmethod"), Some("administrationMethod"));
        assert_eq!(to_field("nope"), None);
    }
}
