use std::path::Path;

use serde::{Deserialize, Serialize};

/// MIME types the extraction service accepts.
pub const SUPPORTED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "text/plain",
];

const GENERIC_MIME: &str = "application/octet-stream";

/// Broad file categories we handle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Pdf,
    Image,
    PlainText,
    Unsupported,
}

impl FileCategory {
    pub fn from_mime(mime_type: &str) -> Self {
        match normalize_mime(mime_type).as_str() {
            "application/pdf" => Self::Pdf,
            "image/jpeg" | "image/png" => Self::Image,
            "text/plain" => Self::PlainText,
            _ => Self::Unsupported,
        }
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Self::Unsupported)
    }
}

/// Lower-case a MIME type and drop any parameters (`text/plain; charset=utf-8`).
pub fn normalize_mime(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn is_supported_mime(mime_type: &str) -> bool {
    FileCategory::from_mime(mime_type).is_supported()
}

/// Resolve the MIME type of an upload.
///
/// The declared type wins unless it is missing or generic; then the filename
/// extension is consulted, then the leading magic bytes.
pub fn resolve_mime(file_name: &str, declared: Option<&str>, bytes: &[u8]) -> String {
    if let Some(declared) = declared.map(normalize_mime) {
        if !declared.is_empty() && declared != GENERIC_MIME {
            return declared;
        }
    }

    let guessed = mime_guess::from_path(file_name)
        .first()
        .map(|m| m.essence_str().to_string());
    if let Some(guessed) = guessed {
        return guessed;
    }

    sniff_mime(bytes).unwrap_or(GENERIC_MIME).to_string()
}

/// Detect a supported format from magic bytes.
pub fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => Some("application/pdf"),
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => Some("image/png"),
        _ if is_likely_text(bytes) => Some("text/plain"),
        _ => None,
    }
}

/// Valid UTF-8 in the first 4 KB and at least 80% printable characters.
fn is_likely_text(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(4096)];
    if head.is_empty() {
        return false;
    }
    let text = match std::str::from_utf8(head) {
        Ok(t) => t,
        Err(e) if e.valid_up_to() > 0 && head.len() - e.valid_up_to() < 4 => {
            // Truncated multi-byte sequence at the 4 KB boundary
            match std::str::from_utf8(&head[..e.valid_up_to()]) {
                Ok(t) => t,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    let ratio = printable as f64 / text.chars().count().max(1) as f64;
    ratio > 0.80
}

/// Sanitize a filename: strip path components, limit length
pub fn sanitize_filename(original: &str) -> String {
    let name = Path::new(original)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("document");

    let clean: String = name
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .take(255)
        .collect();

    if clean.is_empty() {
        "document".to_string()
    } else {
        clean
    }
}
