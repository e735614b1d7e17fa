use std::time::Duration;

use base64::Engine as _;

use super::gemini_types::*;
use super::prompt::*;
use super::types::AssessmentAi;
use super::{classify_upstream, AiError};
use crate::config::{AiConfig, DEFAULT_AI_TIMEOUT_SECS, DEFAULT_API_BASE, DEFAULT_MODEL};
use crate::models::{AnalysisResult, AssessmentRecord};

/// HTTP client for the Gemini `generateContent` REST API.
pub struct GeminiClient {
    api_key: Option<String>,
    model: String,
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AiError::GenericFailure(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            model: config.model.clone(),
            base_url: config.api_base.trim_end_matches('/').to_string(),
            client,
            timeout_secs: config.timeout_secs,
        })
    }

    /// Client against the public endpoint with the default model.
    pub fn with_key(api_key: Option<String>) -> Result<Self, AiError> {
        Self::new(&AiConfig {
            api_key,
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
            timeout_secs: DEFAULT_AI_TIMEOUT_SECS,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn credential(&self) -> Result<&str, AiError> {
        self.api_key.as_deref().ok_or(AiError::AuthenticationRequired)
    }

    /// Send a request and return the first candidate's text.
    fn generate(&self, request: &GenerateContentRequest) -> Result<String, AiError> {
        let key = self.credential()?;

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", key)
            .json(request)
            .send()
            .map_err(|e| {
                tracing::error!(error = %e, model = %self.model, "AI request transport failure");
                if e.is_connect() {
                    AiError::ServiceUnavailable(format!("Cannot reach {}", self.base_url))
                } else if e.is_timeout() {
                    AiError::ServiceUnavailable(format!(
                        "Request timed out after {}s",
                        self.timeout_secs
                    ))
                } else {
                    AiError::GenericFailure(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            let upstream = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|envelope| envelope.error)
                .unwrap_or_else(|_| UpstreamError {
                    code: Some(status.as_u16()),
                    message: body.clone(),
                    status: String::new(),
                });
            tracing::error!(
                http_status = status.as_u16(),
                code = ?upstream.code,
                api_status = %upstream.status,
                message = %upstream.message,
                "AI service returned an error"
            );
            return Err(classify_upstream(
                Some(status.as_u16()),
                &upstream.status,
                &upstream.message,
            ));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| AiError::GenericFailure(format!("Unreadable AI response: {e}")))?;

        Ok(parsed.text())
    }
}

impl AssessmentAi for GeminiClient {
    fn analyze(&self, file_bytes: &[u8], mime_type: &str) -> Result<AnalysisResult, AiError> {
        let _span = tracing::info_span!(
            "analyze_document",
            model = %self.model,
            mime_type,
            size = file_bytes.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let request = GenerateContentRequest::user(vec![
            Part::Inline {
                inline_data: InlineData {
                    mime_type: mime_type.to_string(),
                    data: base64::engine::general_purpose::STANDARD.encode(file_bytes),
                },
            },
            Part::Text {
                text: ANALYSIS_PROMPT.to_string(),
            },
        ])
        .with_json_schema(analysis_response_schema());

        let text = self.generate(&request)?;
        let analysis = parse_analysis(&text)?;

        tracing::info!(
            elapsed_ms = %start.elapsed().as_millis(),
            contains_test = analysis.contains_test,
            item_count = analysis.item_count,
            "Document analyzed"
        );
        Ok(analysis)
    }

    fn translate(&self, text: &str, target_language: &str) -> Result<String, AiError> {
        let request = GenerateContentRequest::user(vec![Part::Text {
            text: build_translation_prompt(text, target_language),
        }]);

        let translated = self.generate(&request)?;
        if translated.trim().is_empty() {
            tracing::warn!(target_language, "Empty translation, keeping source text");
            return Ok(text.to_string());
        }
        Ok(translated)
    }

    fn generate_form_script(
        &self,
        record: &AssessmentRecord,
        target_language: &str,
    ) -> Result<String, AiError> {
        let request = GenerateContentRequest::user(vec![Part::Text {
            text: build_form_script_prompt(record, target_language),
        }]);

        let script = strip_code_fences(&self.generate(&request)?);
        if script.is_empty() {
            return Err(AiError::GenericFailure("Empty response from AI".into()));
        }
        Ok(script)
    }
}

/// Parse the structured analysis payload. Tolerates a stray code fence.
pub fn parse_analysis(text: &str) -> Result<AnalysisResult, AiError> {
    let cleaned = strip_code_fences(text);
    let json = if cleaned.is_empty() { "{}" } else { cleaned.as_str() };
    serde_json::from_str(json)
        .map_err(|e| AiError::GenericFailure(format!("Could not extract test content: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(key: Option<&str>) -> AiConfig {
        AiConfig {
            api_key: key.map(String::from),
            model: "gemini-test".into(),
            api_base: "http://127.0.0.1:9/v1beta/".into(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn endpoint_includes_model() {
        let client = GeminiClient::new(&config(Some("k"))).unwrap();
        assert_eq!(
            client.endpoint(),
            "http://127.0.0.1:9/v1beta/models/gemini-test:generateContent"
        );
    }

    #[test]
    fn missing_key_is_authentication_required() {
        let client = GeminiClient::new(&config(None)).unwrap();
        assert_eq!(
            client.analyze(b"data", "text/plain").unwrap_err(),
            AiError::AuthenticationRequired
        );
        assert_eq!(
            client.translate("x", "French").unwrap_err(),
            AiError::AuthenticationRequired
        );
    }

    #[test]
    fn blank_key_is_authentication_required() {
        let client = GeminiClient::new(&config(Some("  "))).unwrap();
        assert_eq!(
            client.analyze(b"data", "text/plain").unwrap_err(),
            AiError::AuthenticationRequired
        );
    }

    #[test]
    fn unreachable_service_is_unavailable() {
        // Port 9 (discard) on loopback refuses connections.
        let client = GeminiClient::new(&config(Some("k"))).unwrap();
        assert!(matches!(
            client.analyze(b"data", "text/plain").unwrap_err(),
            AiError::ServiceUnavailable(_)
        ));
    }

    #[test]
    fn parse_analysis_accepts_fenced_json() {
        let parsed = parse_analysis("```json\n{\"containsTest\": true, \"itemCount\": 7}\n```").unwrap();
        assert!(parsed.contains_test);
        assert_eq!(parsed.item_count, 7);
    }

    #[test]
    fn parse_analysis_rejects_garbage() {
        assert!(matches!(
            parse_analysis("not json at all"),
            Err(AiError::GenericFailure(_))
        ));
    }

    #[test]
    fn parse_analysis_empty_is_not_a_test() {
        let parsed = parse_analysis("").unwrap();
        assert!(!parsed.contains_test);
    }
}
