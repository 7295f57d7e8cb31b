//! Owner file uploads folded into the bot's knowledge base.

use std::path::Path;

use thiserror::Error;

/// Shown to the owner when an upload cannot be used.
pub const UPLOAD_ERROR: &str = "فشل رفع الملف. تأكد من الصيغة ❌";

#[derive(Debug, Error)]
pub enum KnowledgeError {
    #[error("unsupported file type: {0}")]
    Unsupported(String),

    #[error("could not read {name}: {reason}")]
    Unreadable { name: String, reason: String },

    #[error("{0} contains no text")]
    Empty(String),
}

/// Pulls plain text out of an uploaded file. Text-like files must be UTF-8;
/// PDFs go through text extraction.
pub fn extract_text(file_name: &str, bytes: &[u8]) -> Result<String, KnowledgeError> {
    let extension = Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    let text = match extension.as_str() {
        "txt" | "md" | "csv" => String::from_utf8(bytes.to_vec()).map_err(|e| {
            KnowledgeError::Unreadable {
                name: file_name.to_string(),
                reason: e.to_string(),
            }
        })?,
        "pdf" => pdf_extract::extract_text_from_mem(bytes).map_err(|e| {
            KnowledgeError::Unreadable {
                name: file_name.to_string(),
                reason: e.to_string(),
            }
        })?,
        other => return Err(KnowledgeError::Unsupported(other.to_string())),
    };

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(KnowledgeError::Empty(file_name.to_string()));
    }
    Ok(text)
}

/// The block appended to `knowledgeBase` for one uploaded file.
pub fn knowledge_entry(file_name: &str, content: &str) -> String {
    format!("\n\n=== ملف جديد من المالك ({file_name}) ===\n{content}")
}
