//! Archive view over the working set: search, markdown and form-script
//! exports, original-file download and dashboard counters.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::ai::{is_original_language, AiError, AssessmentAi, ORIGINAL_LANGUAGE};
use crate::models::AssessmentRecord;

static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// An export language offered to the user.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct Language {
    pub code: &'static str,
    pub name: &'static str,
}

pub const LANGUAGES: &[Language] = &[
    Language { code: ORIGINAL_LANGUAGE, name: "Original" },
    Language { code: "English", name: "English" },
    Language { code: "Spanish", name: "Spanish" },
    Language { code: "French", name: "French" },
    Language { code: "German", name: "German" },
    Language { code: "Italian", name: "Italian" },
    Language { code: "Portuguese", name: "Portuguese" },
    Language { code: "Japanese", name: "Japanese" },
    Language { code: "Chinese", name: "Chinese" },
];

/// Look up a language by code or display name, ignoring case.
pub fn find_language(code: &str) -> Option<&'static Language> {
    let code = code.trim();
    LANGUAGES
        .iter()
        .find(|l| l.code.eq_ignore_ascii_case(code) || l.name.eq_ignore_ascii_case(code))
}

// ═══════════════════════════════════════════════════════════
// Search
// ═══════════════════════════════════════════════════════════

/// Case-insensitive substring match on formal name, purpose and filename.
pub fn matches_term(record: &AssessmentRecord, term: &str) -> bool {
    let term = term.to_lowercase();
    record.test_name.to_lowercase().contains(&term)
        || record.test_purpose.to_lowercase().contains(&term)
        || record.file_name.to_lowercase().contains(&term)
}

/// Records matching `term`, order preserved. An empty term matches everything.
pub fn search<'a>(records: &'a [AssessmentRecord], term: &str) -> Vec<&'a AssessmentRecord> {
    records.iter().filter(|r| matches_term(r, term)).collect()
}

// ═══════════════════════════════════════════════════════════
// Markdown export
// ═══════════════════════════════════════════════════════════

/// Specification header placed above the extracted content.
pub fn summary_header(record: &AssessmentRecord) -> String {
    format!(
        "\n# {name} - Clinical Specifications\n\n\
         ## Specifications Summary\n\
         - **Test Type:** {test_type}\n\
         - **Item Count:** {items}\n\
         - **Target Age:** {age}\n\
         - **Administration Mode:** {mode}\n\
         - **Purpose:** {purpose}\n\n\
         ## Administration Methods\n\
         {method}\n\n\
         ---\n\n\
         ## Test Content & Instructions\n",
        name = record.test_name,
        test_type = record.test_type,
        items = record.item_count,
        age = record.age_target,
        mode = record.administration_mode,
        purpose = record.test_purpose,
        method = record.administration_method,
    )
}

/// Header followed directly by the extracted content, untranslated.
pub fn render_markdown(record: &AssessmentRecord) -> String {
    format!("{}{}", summary_header(record), record.extracted_content)
}

/// `Beck Depression Inventory` + `Spanish` → `Beck_Depression_Inventory_SPANISH.md`
pub fn markdown_filename(record: &AssessmentRecord, language: &str) -> String {
    let stem: String = WHITESPACE_RUN
        .replace_all(&record.test_name, "_")
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'))
        .collect();
    let stem = if stem.is_empty() { "assessment".to_string() } else { stem };
    format!("{stem}_{}.md", language.trim().to_uppercase())
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MarkdownExport {
    pub file_name: String,
    pub content: String,
}

/// Render a record as markdown, translated unless `language` is "original".
///
/// Header and content are translated in a single call.
pub fn export_markdown(
    ai: &dyn AssessmentAi,
    record: &AssessmentRecord,
    language: &str,
) -> Result<MarkdownExport, AiError> {
    let content = if is_original_language(language) {
        render_markdown(record)
    } else {
        tracing::info!(record_id = %record.id, language, "Translating markdown export");
        let source = format!("{}\n{}", summary_header(record), record.extracted_content);
        ai.translate(&source, language)?
    };

    Ok(MarkdownExport {
        file_name: markdown_filename(record, language),
        content,
    })
}

// ═══════════════════════════════════════════════════════════
// Form script export
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FormScriptExport {
    pub test_name: String,
    pub language: String,
    pub script: String,
}

pub fn export_form_script(
    ai: &dyn AssessmentAi,
    record: &AssessmentRecord,
    language: &str,
) -> Result<FormScriptExport, AiError> {
    tracing::info!(record_id = %record.id, language, "Generating form script");
    let script = ai.generate_form_script(record, language)?;
    Ok(FormScriptExport {
        test_name: record.test_name.clone(),
        language: language.to_string(),
        script,
    })
}

// ═══════════════════════════════════════════════════════════
// Original file
// ═══════════════════════════════════════════════════════════

/// The uploaded file, byte for byte.
pub struct OriginalFile {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub fn original_file(record: &AssessmentRecord) -> Result<OriginalFile, base64::DecodeError> {
    Ok(OriginalFile {
        file_name: record.file_name.clone(),
        mime_type: record.mime_type.clone(),
        bytes: record.file_bytes()?,
    })
}

// ═══════════════════════════════════════════════════════════
// Dashboard counters
// ═══════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveStats {
    pub total: usize,
    /// Records uploaded since `session_start`.
    pub session: usize,
    pub self_report: usize,
    pub clinician_led: usize,
}

impl ArchiveStats {
    pub fn compute(records: &[AssessmentRecord], session_start: DateTime<Utc>) -> Self {
        let self_report = records.iter().filter(|r| r.is_self_report).count();
        Self {
            total: records.len(),
            session: records.iter().filter(|r| r.uploaded_at >= session_start).count(),
            self_report,
            clinician_led: records.len() - self_report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::MockAssessmentAi;
    use crate::models::{AnalysisResult, UploadedFile};
    use chrono::Duration;

    fn record(test_name: &str, purpose: &str, file_name: &str, self_report: bool) -> AssessmentRecord {
        AssessmentRecord::from_analysis(
            AnalysisResult {
                contains_test: true,
                test_name: test_name.into(),
                canonical_name: test_name.into(),
                item_count: 21,
                administration_mode: "Self-report".into(),
                test_type: "Questionnaire".into(),
                administration_method: "Paper and pencil".into(),
                test_purpose: purpose.into(),
                age_target: "13-80".into(),
                is_self_report: self_report,
                extracted_content: "1. Sadness\n2. Pessimism".into(),
            },
            &UploadedFile {
                file_name: file_name.into(),
                mime_type: "application/pdf".into(),
                bytes: vec![0x25, 0x50, 0x44, 0x46, 0x00, 0xFF],
            },
        )
    }

    fn archive() -> Vec<AssessmentRecord> {
        vec![
            record("Beck Depression Inventory", "Depression severity", "bdi.pdf", true),
            record("Hamilton Anxiety Scale", "Anxiety severity", "ham-a.pdf", false),
        ]
    }

    #[test]
    fn search_filters_by_name() {
        let records = archive();
        let hits = search(&records, "beck");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].test_name, "Beck Depression Inventory");
    }

    #[test]
    fn search_covers_purpose_and_filename() {
        let records = archive();
        assert_eq!(search(&records, "ANXIETY")[0].test_name, "Hamilton Anxiety Scale");
        assert_eq!(search(&records, "ham-a")[0].test_name, "Hamilton Anxiety Scale");
        assert!(search(&records, "inventory 2").is_empty());
    }

    #[test]
    fn empty_term_matches_all() {
        let records = archive();
        assert_eq!(search(&records, "").len(), 2);
    }

    #[test]
    fn markdown_layout() {
        let r = record("Beck Depression Inventory", "Depression severity", "bdi.pdf", true);
        let md = render_markdown(&r);
        assert!(md.starts_with("\n# Beck Depression Inventory - Clinical Specifications\n"));
        assert!(md.contains("- **Item Count:** 21\n"));
        assert!(md.contains("- **Administration Mode:** Self-report\n"));
        assert!(md.contains("## Administration Methods\nPaper and pencil\n\n---\n"));
        assert!(md.ends_with("## Test Content & Instructions\n1. Sadness\n2. Pessimism"));
    }

    #[test]
    fn filename_replaces_whitespace_runs() {
        let r = record("Beck  Depression\tInventory", "", "bdi.pdf", true);
        assert_eq!(markdown_filename(&r, "original"), "Beck_Depression_Inventory_ORIGINAL.md");
        assert_eq!(markdown_filename(&r, "Spanish"), "Beck_Depression_Inventory_SPANISH.md");
    }

    #[test]
    fn filename_strips_path_characters() {
        let r = record("A/B: Scale?", "", "x.pdf", true);
        assert_eq!(markdown_filename(&r, "French"), "AB_Scale_FRENCH.md");
    }

    #[test]
    fn original_export_makes_no_ai_call() {
        let ai = MockAssessmentAi::new();
        let r = record("Beck Depression Inventory", "", "bdi.pdf", true);
        let export = export_markdown(&ai, &r, "original").unwrap();
        assert_eq!(export.content, render_markdown(&r));
        assert!(ai.translation_calls().is_empty());
    }

    #[test]
    fn translated_export_sends_header_and_content() {
        let ai = MockAssessmentAi::new();
        let r = record("Beck Depression Inventory", "", "bdi.pdf", true);
        let export = export_markdown(&ai, &r, "German").unwrap();
        assert_eq!(ai.translation_calls(), vec!["German".to_string()]);
        assert_eq!(export.content, format!("{}\n{}", summary_header(&r), r.extracted_content));
        assert_eq!(export.file_name, "Beck_Depression_Inventory_GERMAN.md");
    }

    #[test]
    fn translation_error_propagates() {
        let ai = MockAssessmentAi::new().with_translation(Err(AiError::QuotaExhausted));
        let r = record("Beck Depression Inventory", "", "bdi.pdf", true);
        assert_eq!(export_markdown(&ai, &r, "Italian").unwrap_err(), AiError::QuotaExhausted);
    }

    #[test]
    fn form_script_export() {
        let ai = MockAssessmentAi::new().with_form_script(Ok("function createBDIForm() {}".into()));
        let r = record("BDI", "", "bdi.pdf", true);
        let export = export_form_script(&ai, &r, "English").unwrap();
        assert_eq!(export.script, "function createBDIForm() {}");
        assert_eq!(export.language, "English");
    }

    #[test]
    fn original_file_is_byte_exact() {
        let r = record("BDI", "", "bdi.pdf", true);
        let file = original_file(&r).unwrap();
        assert_eq!(file.bytes, vec![0x25, 0x50, 0x44, 0x46, 0x00, 0xFF]);
        assert_eq!(file.file_name, "bdi.pdf");
        assert_eq!(file.mime_type, "application/pdf");
    }

    #[test]
    fn languages_lookup() {
        assert_eq!(LANGUAGES.len(), 9);
        assert_eq!(find_language("ORIGINAL").map(|l| l.name), Some("Original"));
        assert_eq!(find_language("japanese").map(|l| l.code), Some("Japanese"));
        assert!(find_language("Klingon").is_none());
    }

    #[test]
    fn stats_count_session_and_mode() {
        let mut records = archive();
        records[1].uploaded_at = records[1].uploaded_at - Duration::days(3);
        let session_start = records[0].uploaded_at - Duration::hours(1);

        let stats = ArchiveStats::compute(&records, session_start);
        assert_eq!(
            stats,
            ArchiveStats { total: 2, session: 1, self_report: 1, clinician_led: 1 }
        );
    }
}
