use std::collections::VecDeque;
use std::sync::Mutex;

use super::types::AssessmentAi;
use super::AiError;
use crate::models::{AnalysisResult, AssessmentRecord};

/// Mock AI client for testing: replays scripted analysis outcomes in order
/// and records every call it receives.
pub struct MockAssessmentAi {
    analyses: Mutex<VecDeque<Result<AnalysisResult, AiError>>>,
    translation: Result<String, AiError>,
    form_script: Result<String, AiError>,
    analyzed: Mutex<Vec<Vec<u8>>>,
    translations: Mutex<Vec<String>>,
}

impl MockAssessmentAi {
    pub fn new() -> Self {
        Self {
            analyses: Mutex::new(VecDeque::new()),
            translation: Ok(String::new()),
            form_script: Ok("function createForm() {}".to_string()),
            analyzed: Mutex::new(Vec::new()),
            translations: Mutex::new(Vec::new()),
        }
    }

    /// Queue the outcome of the next `analyze` call.
    pub fn with_analysis(self, outcome: Result<AnalysisResult, AiError>) -> Self {
        if let Ok(mut queue) = self.analyses.lock() {
            queue.push_back(outcome);
        }
        self
    }

    /// Fixed translation outcome. `Ok("")` echoes the input back.
    pub fn with_translation(mut self, outcome: Result<String, AiError>) -> Self {
        self.translation = outcome;
        self
    }

    pub fn with_form_script(mut self, outcome: Result<String, AiError>) -> Self {
        self.form_script = outcome;
        self
    }

    /// File payloads passed to `analyze`, in call order.
    pub fn analyzed_files(&self) -> Vec<Vec<u8>> {
        self.analyzed.lock().map(|v| v.clone()).unwrap_or_default()
    }

    /// Target languages passed to `translate`, in call order.
    pub fn translation_calls(&self) -> Vec<String> {
        self.translations.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Default for MockAssessmentAi {
    fn default() -> Self {
        Self::new()
    }
}

impl AssessmentAi for MockAssessmentAi {
    fn analyze(&self, file_bytes: &[u8], _mime_type: &str) -> Result<AnalysisResult, AiError> {
        if let Ok(mut calls) = self.analyzed.lock() {
            calls.push(file_bytes.to_vec());
        }
        self.analyses
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front())
            .unwrap_or_else(|| Err(AiError::GenericFailure("no scripted analysis".into())))
    }

    fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError> {
        if let Ok(mut calls) = self.translations.lock() {
            calls.push(target_language.to_string());
        }
        match &self.translation {
            Ok(t) if t.is_empty() => Ok(text.to_string()),
            other => other.clone(),
        }
    }

    fn generate_form_script(
        &self,
        _record: &AssessmentRecord,
        _target_language: &str,
    ) -> Result<String, AiError> {
        self.form_script.clone()
    }
}
