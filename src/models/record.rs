use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One persisted, analyzed assessment document.
///
/// JSON field names follow the camelCase convention shared by the browser
/// front-end and the extraction payload. `description` carries the
/// administration-mode label ("Self-report" / "Dependent of operator").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssessmentRecord {
    pub id: String,
    pub test_name: String,
    pub canonical_name: String,
    pub item_count: u32,
    pub file_name: String,
    /// Original file bytes, standard base64.
    pub file_data: String,
    pub mime_type: String,
    #[serde(rename = "description")]
    pub administration_mode: String,
    pub test_type: String,
    pub administration_method: String,
    pub test_purpose: String,
    pub age_target: String,
    pub is_self_report: bool,
    /// Markdown rendering of the questions, scoring and instructions.
    pub extracted_content: String,
    pub uploaded_at: DateTime<Utc>,
    pub contains_test: bool,
}

/// Structured payload returned by the extraction service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisResult {
    pub contains_test: bool,
    pub test_name: String,
    pub canonical_name: String,
    pub item_count: u32,
    #[serde(rename = "description")]
    pub administration_mode: String,
    pub test_type: String,
    pub administration_method: String,
    pub test_purpose: String,
    pub age_target: String,
    pub is_self_report: bool,
    pub extracted_content: String,
}

/// A file handed to the import workflow.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Record without the file payload, for list views.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSummary {
    pub id: String,
    pub test_name: String,
    pub canonical_name: String,
    pub item_count: u32,
    pub file_name: String,
    pub mime_type: String,
    #[serde(rename = "description")]
    pub administration_mode: String,
    pub test_type: String,
    pub test_purpose: String,
    pub age_target: String,
    pub is_self_report: bool,
    pub uploaded_at: DateTime<Utc>,
}

impl AssessmentRecord {
    /// Build a candidate record from an analysis and the file it came from.
    /// Generates a fresh identifier and a millisecond-precision timestamp.
    pub fn from_analysis(analysis: AnalysisResult, file: &UploadedFile) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            test_name: analysis.test_name,
            canonical_name: analysis.canonical_name,
            item_count: analysis.item_count,
            file_name: file.file_name.clone(),
            file_data: base64::engine::general_purpose::STANDARD.encode(&file.bytes),
            mime_type: file.mime_type.clone(),
            administration_mode: analysis.administration_mode,
            test_type: analysis.test_type,
            administration_method: analysis.administration_method,
            test_purpose: analysis.test_purpose,
            age_target: analysis.age_target,
            is_self_report: analysis.is_self_report,
            extracted_content: analysis.extracted_content,
            uploaded_at: now_millis(),
            contains_test: analysis.contains_test,
        }
    }

    /// Decode the stored file payload.
    pub fn file_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        base64::engine::general_purpose::STANDARD.decode(&self.file_data)
    }

    pub fn summary(&self) -> RecordSummary {
        RecordSummary {
            id: self.id.clone(),
            test_name: self.test_name.clone(),
            canonical_name: self.canonical_name.clone(),
            item_count: self.item_count,
            file_name: self.file_name.clone(),
            mime_type: self.mime_type.clone(),
            administration_mode: self.administration_mode.clone(),
            test_type: self.test_type.clone(),
            test_purpose: self.test_purpose.clone(),
            age_target: self.age_target.clone(),
            is_self_report: self.is_self_report,
            uploaded_at: self.uploaded_at,
        }
    }
}

/// Current time truncated to milliseconds, the precision both stores keep.
pub fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
