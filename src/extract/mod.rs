//! Raw text extraction from uploaded files.
//!
//! Extraction is a collaborator of the ingestion pipeline: the pipeline
//! only sees `extract(path, file_type) -> String`. Supported types are
//! fixed; anything else is rejected before chunking starts.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::core::errors::ApiError;

/// File types accepted for ingestion (extension without the dot).
pub const ALLOWED_TYPES: [&str; 5] = ["pdf", "doc", "docx", "txt", "md"];

/// Lower-cased extension of a file name, if it is on the allow-list.
pub fn allowed_file_type(file_name: &str) -> Result<String, ApiError> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    if ALLOWED_TYPES.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(ApiError::Validation(format!(
            "unsupported file type \"{}\", supported: {}",
            ext,
            ALLOWED_TYPES.join(", ")
        )))
    }
}

#[async_trait]
pub trait TextExtractor: Send + Sync {
    /// Extract plain text from the file at `path`. `file_type` is a value
    /// from [`ALLOWED_TYPES`].
    async fn extract(&self, path: &Path, file_type: &str) -> Result<String, ApiError>;
}

/// Filesystem-backed extractor for the supported formats.
pub struct FileExtractor;

#[async_trait]
impl TextExtractor for FileExtractor {
    async fn extract(&self, path: &Path, file_type: &str) -> Result<String, ApiError> {
        let path: PathBuf = path.to_path_buf();
        let file_type = file_type.to_string();

        // Format parsers are synchronous; keep them off the request path.
        tokio::task::spawn_blocking(move || extract_sync(&path, &file_type))
            .await
            .map_err(ApiError::internal)?
    }
}

fn extract_sync(path: &Path, file_type: &str) -> Result<String, ApiError> {
    match file_type {
        "txt" | "md" => read_text_file(path),
        "pdf" => extract_pdf(path),
        "doc" | "docx" => extract_docx(path),
        other => Err(ApiError::Validation(format!(
            "unsupported file type \"{}\"",
            other
        ))),
    }
}

fn read_text_file(path: &Path) -> Result<String, ApiError> {
    let bytes = std::fs::read(path).map_err(ApiError::internal)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn extract_pdf(path: &Path) -> Result<String, ApiError> {
    pdf_extract::extract_text(path)
        .map_err(|e| ApiError::Validation(format!("failed to parse PDF: {}", e)))
}

/// DOCX is a ZIP archive; the document body lives in `word/document.xml`.
/// Paragraph markers become blank lines, remaining tags are stripped.
fn extract_docx(path: &Path) -> Result<String, ApiError> {
    let file = std::fs::File::open(path).map_err(ApiError::internal)?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ApiError::Validation(format!("failed to open document archive: {}", e)))?;

    let mut entry = archive
        .by_name("word/document.xml")
        .map_err(|_| ApiError::Validation("document archive has no body".to_string()))?;

    let mut xml = String::new();
    entry
        .read_to_string(&mut xml)
        .map_err(ApiError::internal)?;

    Ok(plaintext_from_document_xml(&xml))
}

fn plaintext_from_document_xml(xml: &str) -> String {
    static PARAGRAPH_END: OnceLock<Regex> = OnceLock::new();
    static TAG: OnceLock<Regex> = OnceLock::new();

    let paragraph_end = PARAGRAPH_END.get_or_init(|| Regex::new(r"</w:p>").unwrap());
    let tag = TAG.get_or_init(|| Regex::new(r"<[^>]+>").unwrap());

    let with_breaks = paragraph_end.replace_all(xml, "\n\n");
    let text = tag.replace_all(&with_breaks, "");

    text.replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn allow_list_accepts_known_types() {
        assert_eq!(allowed_file_type("report.PDF").unwrap(), "pdf");
        assert_eq!(allowed_file_type("notes.md").unwrap(), "md");
        assert_eq!(allowed_file_type("essay.docx").unwrap(), "docx");
    }

    #[test]
    fn allow_list_rejects_unknown_types() {
        assert!(allowed_file_type("archive.zip").is_err());
        assert!(allowed_file_type("no_extension").is_err());
        assert!(allowed_file_type("image.png").is_err());
    }

    #[tokio::test]
    async fn extracts_plain_text() {
        let mut file = tempfile::NamedTempFile::with_suffix(".txt").unwrap();
        writeln!(file, "hello extraction").unwrap();

        let text = FileExtractor
            .extract(file.path(), "txt")
            .await
            .unwrap();
        assert!(text.contains("hello extraction"));
    }

    #[test]
    fn document_xml_becomes_paragraphs() {
        let xml = r#"<w:document><w:p><w:r><w:t>First paragraph.</w:t></w:r></w:p><w:p><w:r><w:t>Second &amp; last.</w:t></w:r></w:p></w:document>"#;
        let text = plaintext_from_document_xml(xml);
        assert!(text.starts_with("First paragraph."));
        assert!(text.contains("\n\n"));
        assert!(text.contains("Second & last."));
    }
}
