use std::sync::LazyLock;

use regex::Regex;

use crate::models::AssessmentRecord;

/// Language code meaning "keep the source language".
pub const ORIGINAL_LANGUAGE: &str = "original";

pub const ANALYSIS_PROMPT: &str = r#"You are a clinical psychometrics expert. Analyze this document.
1. Determine if it contains a psychological, educational, or clinical test/assessment.
2. If it DOES NOT contain a test, set containsTest to false and provide placeholder values for other fields.
3. If it DOES contain a test, set containsTest to true and identify:
   - Formal name of the test (in the language of the document).
   - Canonical Name: the formal name of the test in English (e.g., if the test is "Escala de Depresión de Beck", the canonical name is "Beck Depression Inventory"). This is used for duplicate detection.
   - Item Count: the total number of questions or items in the test.
   - Test Type (e.g., Self-report, Employee test, Checklist, Performance-based, etc.).
   - Administration Method (brief summary of how it is administered).
   - Target age.
   - Brief purpose.
4. Extract the entire test content (questions, scoring, instructions) as Markdown.
Return ONLY JSON."#;

/// Response schema for the analysis call. Every field is required.
pub fn analysis_response_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "OBJECT",
        "properties": {
            "containsTest": { "type": "BOOLEAN", "description": "True if the document contains a clinical/psychological test, false otherwise." },
            "testName": { "type": "STRING" },
            "canonicalName": { "type": "STRING", "description": "The formal name of the test in English for duplicate detection." },
            "itemCount": { "type": "INTEGER", "description": "The total number of questions or items in the test." },
            "testType": { "type": "STRING", "description": "The category of the test (e.g. Self-report, Checklist, etc.)." },
            "administrationMethod": { "type": "STRING", "description": "Brief summary of how the test is administered." },
            "description": { "type": "STRING", "description": "Strictly 'Self-report' or 'Dependent of operator'." },
            "testPurpose": { "type": "STRING", "description": "1-2 sentence explanation of clinical/educational use." },
            "ageTarget": { "type": "STRING" },
            "isSelfReport": { "type": "BOOLEAN" },
            "extractedContent": { "type": "STRING", "description": "Markdown formatted test content including instructions." }
        },
        "required": [
            "containsTest", "testName", "canonicalName", "itemCount", "testType",
            "administrationMethod", "description", "testPurpose", "ageTarget",
            "isSelfReport", "extractedContent"
        ]
    })
}

pub fn is_original_language(language: &str) -> bool {
    language.trim().eq_ignore_ascii_case(ORIGINAL_LANGUAGE)
}

pub fn build_translation_prompt(content: &str, target_language: &str) -> String {
    format!(
        "Translate the following psychological test into {target_language}. Maintain exact formatting.\n\n\
         CONTENT:\n{content}"
    )
}

/// Generated function name: `create` + test name stripped to ASCII alphanumerics + `Form`.
pub fn form_function_name(test_name: &str) -> String {
    let stem: String = test_name.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    format!("create{stem}Form")
}

pub fn build_form_script_prompt(record: &AssessmentRecord, target_language: &str) -> String {
    let translation_instruction = if is_original_language(target_language) {
        "Keep the content in its original language.".to_string()
    } else {
        format!(
            "CRITICAL: Translate all user-facing strings (test name, description, question labels, \
             option choices) into {target_language}."
        )
    };
    let function_name = form_function_name(&record.test_name);

    format!(
        r#"Task: Convert the following psychological test into a Google Apps Script that creates a Google Form.

Test Content:
{content}

Translation Instructions:
{translation_instruction}

Requirements for the Script:
1. Function name must be '{function_name}'.
2. Use 'FormApp.create("{title}")' (translated if required).
3. Include '.setDescription("{purpose}")' (translated if required).
4. Map questions to appropriate types: .addMultipleChoiceItem(), .addTextItem(), .addCheckboxItem(), or .addScaleItem().
5. Handle section headers using .addPageBreakItem().
6. Ensure questions are set as required where appropriate.
7. Return ONLY the code block."#,
        content = record.extracted_content,
        title = record.test_name,
        purpose = record.test_purpose,
    )
}

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```[A-Za-z]*").unwrap());

/// Remove Markdown code-fence markers and surrounding whitespace.
pub fn strip_code_fences(text: &str) -> String {
    CODE_FENCE.replace_all(text, "").trim().to_string()
}
