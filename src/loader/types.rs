//! Uniform document record produced by every loader.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File formats the loaders understand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Txt,
    Pdf,
    Docx,
    Xlsx,
    Xls,
    Pptx,
}

impl DocumentKind {
    /// All supported kinds, in the order their loaders are documented.
    pub const ALL: [DocumentKind; 6] = [
        DocumentKind::Txt,
        DocumentKind::Pdf,
        DocumentKind::Docx,
        DocumentKind::Xlsx,
        DocumentKind::Xls,
        DocumentKind::Pptx,
    ];

    /// Resolve from a file extension, case-insensitively, with or without the dot.
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim_start_matches('.');
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(ext))
    }

    /// Resolve from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Txt => "txt",
            DocumentKind::Pdf => "pdf",
            DocumentKind::Docx => "docx",
            DocumentKind::Xlsx => "xlsx",
            DocumentKind::Xls => "xls",
            DocumentKind::Pptx => "pptx",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scalar metadata value.
///
/// Serialized untagged so metadata reads as a plain JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetadataValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view used for ordering comparisons.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            MetadataValue::Int(i) => Some(*i as f64),
            MetadataValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Int(value)
    }
}

impl From<usize> for MetadataValue {
    fn from(value: usize) -> Self {
        MetadataValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<u64> for MetadataValue {
    fn from(value: u64) -> Self {
        MetadataValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Float(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Ordered metadata map; ordering keeps serialized records stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// A normalized document ready for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Extracted text.
    pub content: String,

    /// Source format.
    #[serde(rename = "type")]
    pub kind: DocumentKind,

    /// Format-specific facts plus `type`, `size` and `status`.
    pub metadata: Metadata,
}

impl Document {
    /// Create a document and stamp the standard metadata keys.
    pub fn new(content: String, kind: DocumentKind, mut metadata: Metadata) -> Self {
        let size = content.chars().count();
        metadata.insert("type".to_string(), kind.as_str().into());
        metadata.insert("size".to_string(), size.into());
        metadata.insert("status".to_string(), "success".into());
        Self {
            content,
            kind,
            metadata,
        }
    }

    /// Content length in characters.
    pub fn size(&self) -> usize {
        self.content.chars().count()
    }

    /// Set or replace a metadata entry.
    pub fn set_meta(&mut self, key: &str, value: impl Into<MetadataValue>) {
        self.metadata.insert(key.to_string(), value.into());
    }
}

/// Errors from loading a file into a [`Document`].
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Unsupported file type: {}", .0.display())]
    Unsupported(PathBuf),

    #[error("IO error reading {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("Spreadsheet decoding failed: {0}")]
    Spreadsheet(String),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("No extractable text in {}", .0.display())]
    Empty(PathBuf),
}

impl LoadError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result type for loader operations.
pub type LoadResult<T> = Result<T, LoadError>;
