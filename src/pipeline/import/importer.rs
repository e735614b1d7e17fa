use serde::{Deserialize, Serialize};

use super::duplicate::find_duplicate;
use super::format::{is_supported_mime, normalize_mime, sanitize_filename};
use super::ImportError;
use crate::ai::AiErrorKind;
use crate::core_state::CoreState;
use crate::models::{AssessmentRecord, RecordSummary, UploadedFile};

/// Inline payload ceiling of the extraction service.
pub const MAX_FILE_SIZE_BYTES: usize = 20 * 1024 * 1024;

/// What happened to one file of a batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    /// Not sent for analysis (unsupported type, empty, or too large).
    Skipped { notice: String },
    /// Analyzed, but no assessment was found in the document.
    Rejected { notice: String },
    /// Analysis failed with a non-blocking error; the batch went on.
    Failed { kind: AiErrorKind, notice: String },
    /// Matches a record already in the archive; dropped.
    Duplicate {
        candidate: RecordSummary,
        existing_id: String,
        notice: String,
    },
    /// Awaiting explicit confirmation.
    Pending { record: RecordSummary },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file_name: String,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

/// A blocking error that stopped the batch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BatchHalt {
    pub file_name: String,
    pub kind: AiErrorKind,
    pub notice: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub files: Vec<FileReport>,
    pub halted: Option<BatchHalt>,
    /// Files never analyzed because of the halt.
    pub not_attempted: Vec<String>,
}

impl ImportReport {
    pub fn pending_ids(&self) -> Vec<String> {
        self.files
            .iter()
            .filter_map(|f| match &f.outcome {
                FileOutcome::Pending { record } => Some(record.id.clone()),
                _ => None,
            })
            .collect()
    }
}

/// Drives uploads through extraction, duplicate checks and confirmation.
pub struct ImportWorkflow<'a> {
    state: &'a CoreState,
}

impl<'a> ImportWorkflow<'a> {
    pub fn new(state: &'a CoreState) -> Self {
        Self { state }
    }

    /// Process a batch of uploads one after another.
    ///
    /// Authentication and quota failures halt the batch; the files after the
    /// failing one are listed in `not_attempted` and never analyzed. Nothing
    /// here writes to the store.
    pub fn run_batch(&self, uploads: Vec<UploadedFile>) -> Result<ImportReport, ImportError> {
        let total = uploads.len();
        let mut report = ImportReport::default();
        if total == 0 {
            return Ok(report);
        }

        let busy = self.state.busy().begin("PROCESSING");
        let mut uploads = uploads.into_iter().enumerate();

        while let Some((index, mut upload)) = uploads.next() {
            upload.file_name = sanitize_filename(&upload.file_name);
            upload.mime_type = normalize_mime(&upload.mime_type);

            if let Some(notice) = precheck(&upload) {
                tracing::info!(file = %upload.file_name, mime = %upload.mime_type, "Skipping upload");
                report.files.push(FileReport {
                    file_name: upload.file_name,
                    outcome: FileOutcome::Skipped { notice },
                });
                continue;
            }

            self.state.busy().set_message(format!(
                "PROCESSING: [{}/{}] - \"{}\"",
                index + 1,
                total,
                upload.file_name
            ));

            tracing::info!(file = %upload.file_name, index = index + 1, total, "Analyzing upload");
            let analysis = match self.state.ai().analyze(&upload.bytes, &upload.mime_type) {
                Ok(analysis) => analysis,
                Err(e) if e.is_blocking() => {
                    tracing::warn!(file = %upload.file_name, error = %e, "Batch halted");
                    report.halted = Some(BatchHalt {
                        notice: e.notice(Some(&upload.file_name)),
                        kind: e.kind(),
                        file_name: upload.file_name,
                    });
                    report.not_attempted = uploads.by_ref().map(|(_, rest)| rest.file_name).collect();
                    break;
                }
                Err(e) => {
                    tracing::warn!(file = %upload.file_name, error = %e, "Analysis failed, continuing");
                    report.files.push(FileReport {
                        outcome: FileOutcome::Failed {
                            kind: e.kind(),
                            notice: e.notice(Some(&upload.file_name)),
                        },
                        file_name: upload.file_name,
                    });
                    continue;
                }
            };

            if !analysis.contains_test {
                tracing::info!(file = %upload.file_name, "No assessment detected");
                report.files.push(FileReport {
                    outcome: FileOutcome::Rejected {
                        notice: format!(
                            "INVALID DOCUMENT: \"{}\" does not appear to contain a clinical test.",
                            upload.file_name
                        ),
                    },
                    file_name: upload.file_name,
                });
                continue;
            }

            let candidate = AssessmentRecord::from_analysis(analysis, &upload);
            let existing_id = self.state.with_records(|records| {
                find_duplicate(&candidate, records).map(|r| r.id.clone())
            })?;

            let outcome = match existing_id {
                Some(existing_id) => {
                    tracing::info!(file = %upload.file_name, existing = %existing_id, "Duplicate detected");
                    FileOutcome::Duplicate {
                        notice: format!(
                            "DUPLICATE DETECTED: \"{}\" is already in the archive.",
                            candidate.test_name
                        ),
                        candidate: candidate.summary(),
                        existing_id,
                    }
                }
                None => {
                    let record = candidate.summary();
                    self.state.push_pending(candidate)?;
                    tracing::info!(file = %upload.file_name, record_id = %record.id, "Candidate awaiting confirmation");
                    FileOutcome::Pending { record }
                }
            };
            report.files.push(FileReport {
                file_name: upload.file_name,
                outcome,
            });
        }

        drop(busy);
        Ok(report)
    }

    /// Persist a pending candidate and make it the active record.
    ///
    /// Duplicates are checked again against the current working set, since
    /// other candidates may have been confirmed in the meantime. Confirms run
    /// one at a time from that check until the record is in the working set.
    pub fn confirm(&self, pending_id: &str) -> Result<AssessmentRecord, ImportError> {
        let _commit = self.state.commit_lock()?;
        let candidate = self
            .state
            .pending_record(pending_id)?
            .ok_or_else(|| ImportError::PendingNotFound(pending_id.to_string()))?;

        let existing_id = self.state.with_records(|records| {
            find_duplicate(&candidate, records).map(|r| r.id.clone())
        })?;
        if let Some(existing_id) = existing_id {
            self.state.take_pending(pending_id)?;
            tracing::info!(record_id = %pending_id, existing = %existing_id, "Pending candidate became a duplicate");
            return Err(ImportError::Duplicate { existing_id });
        }

        let _busy = self.state.busy().begin("SAVING TO ARCHIVE");
        self.state.store().save(&candidate)?;

        self.state.take_pending(pending_id)?;
        self.state.insert_persisted(candidate.clone())?;
        tracing::info!(record_id = %candidate.id, "Record persisted");
        Ok(candidate)
    }

    /// Drop a pending candidate without touching the store.
    pub fn discard(&self, pending_id: &str) -> Result<(), ImportError> {
        self.state
            .take_pending(pending_id)?
            .ok_or_else(|| ImportError::PendingNotFound(pending_id.to_string()))?;
        tracing::info!(record_id = %pending_id, "Pending candidate discarded");
        Ok(())
    }
}

fn precheck(upload: &UploadedFile) -> Option<String> {
    if !is_supported_mime(&upload.mime_type) {
        return Some(format!(
            "UNSUPPORTED FORMAT: \"{}\" ({}) was skipped.",
            upload.file_name, upload.mime_type
        ));
    }
    if upload.bytes.is_empty() {
        return Some(format!("EMPTY FILE: \"{}\" was skipped.", upload.file_name));
    }
    if upload.bytes.len() > MAX_FILE_SIZE_BYTES {
        return Some(format!(
            "FILE TOO LARGE: \"{}\" is {:.1}MB, the limit is {}MB.",
            upload.file_name,
            upload.bytes.len() as f64 / (1024.0 * 1024.0),
            MAX_FILE_SIZE_BYTES / (1024 * 1024)
        ));
    }
    None
}
