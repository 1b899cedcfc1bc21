//! Format loaders that normalize files into [`Document`] records.
//!
//! Dispatch is by file extension. Binary formats are decoded by third-party
//! crates; this module only shapes their output into a stable text layout.

mod docx;
mod excel;
mod ooxml;
mod pdf;
mod pptx;
mod text;
pub mod types;

pub use docx::load_docx;
pub use excel::load_excel;
pub use pdf::{PdfText, load_pdf};
pub use pptx::load_pptx;
pub use text::load_txt;
pub use types::{Document, DocumentKind, LoadError, LoadResult, Metadata, MetadataValue};

use std::path::Path;

use crate::config::LoaderConfig;

/// Limits applied while loading.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    pub pdf_max_chars: usize,
    pub excel_max_rows: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self::from(&LoaderConfig::default())
    }
}

impl From<&LoaderConfig> for LoaderOptions {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            pdf_max_chars: config.pdf_max_chars,
            excel_max_rows: config.excel_max_rows,
        }
    }
}

/// Load a file with default limits.
pub fn load_file(path: &Path) -> LoadResult<Document> {
    load_file_with(path, &LoaderOptions::default())
}

/// Load a file, choosing the decoder from its extension.
pub fn load_file_with(path: &Path, options: &LoaderOptions) -> LoadResult<Document> {
    let kind =
        DocumentKind::from_path(path).ok_or_else(|| LoadError::Unsupported(path.to_path_buf()))?;

    let (content, metadata) = match kind {
        DocumentKind::Txt => (load_txt(path)?, Metadata::new()),
        DocumentKind::Pdf => {
            let pdf = load_pdf(path, options.pdf_max_chars)?;
            pdf_content(path, pdf, options.pdf_max_chars)
        }
        DocumentKind::Docx => load_docx(path)?,
        DocumentKind::Xlsx | DocumentKind::Xls => load_excel(path, options.excel_max_rows)?,
        DocumentKind::Pptx => load_pptx(path)?,
    };

    if content.trim().is_empty() {
        return Err(LoadError::Empty(path.to_path_buf()));
    }

    crate::debug_event!(
        "loader",
        "loaded",
        "{} ({kind}, {} chars)",
        path.display(),
        content.chars().count()
    );
    Ok(Document::new(content, kind, metadata))
}

/// PDF text, flagged `truncated` when the character limit cut it.
fn pdf_content(path: &Path, pdf: PdfText, max_chars: usize) -> (String, Metadata) {
    let mut metadata = Metadata::new();
    if pdf.truncated {
        tracing::warn!(
            target: "loader",
            "[loader] {} truncated to {max_chars} characters",
            path.display()
        );
        metadata.insert("truncated".into(), true.into());
    }
    (pdf.text, metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_txt_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.TXT");
        std::fs::write(&path, "Quarterly numbers look good").unwrap();

        let doc = load_file(&path).unwrap();
        assert_eq!(doc.kind, DocumentKind::Txt);
        assert_eq!(doc.content, "Quarterly numbers look good");
        assert_eq!(doc.metadata["size"], MetadataValue::Int(27));
    }

    #[test]
    fn test_truncated_pdf_text_is_flagged() {
        let path = Path::new("long.pdf");

        let (text, metadata) = pdf_content(path, pdf::limit_text("abcdefgh".to_string(), 4), 4);
        assert_eq!(text, "abcd");
        assert_eq!(metadata["truncated"], MetadataValue::Bool(true));

        let (text, metadata) = pdf_content(path, pdf::limit_text("abc".to_string(), 4), 4);
        assert_eq!(text, "abc");
        assert!(!metadata.contains_key("truncated"));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("image.png");
        std::fs::write(&path, [0u8, 1, 2]).unwrap();
        assert!(matches!(load_file(&path), Err(LoadError::Unsupported(_))));
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("blank.txt");
        std::fs::write(&path, "  \n\t ").unwrap();
        assert!(matches!(load_file(&path), Err(LoadError::Empty(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = load_file(&dir.path().join("gone.txt")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
