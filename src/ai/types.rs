use super::AiError;
use crate::models::{AnalysisResult, AssessmentRecord};

/// Document-understanding and text-generation capability.
///
/// Implementations classify every failure into `AiError`; they never
/// swallow an error or substitute a default on their own.
pub trait AssessmentAi: Send + Sync {
    /// Decide whether a document holds an assessment and extract its metadata and content.
    fn analyze(&self, file_bytes: &[u8], mime_type: &str) -> Result<AnalysisResult, AiError>;

    /// Re-render text in the target language, keeping its formatting.
    fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError>;

    /// Generate a form-builder script from a record's extracted content.
    fn generate_form_script(
        &self,
        record: &AssessmentRecord,
        target_language: &str,
    ) -> Result<String, AiError>;
}
