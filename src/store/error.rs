use tantivy::directory::error::OpenDirectoryError;
use thiserror::Error;

use super::filter::FilterError;
use crate::identity::IdentityError;
use crate::vector::VectorError;

/// Errors from document index operations.
#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tantivy error: {0}")]
    Tantivy(#[from] tantivy::TantivyError),

    #[error("Directory error: {0}")]
    Directory(#[from] OpenDirectoryError),

    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid document id: {0}")]
    Identity(#[from] IdentityError),

    #[error("Invalid filter: {0}")]
    Filter(#[from] FilterError),

    #[error(
        "Index at {path} was built with {index_model} ({index_dimension} dims), \
         current embedder produces {dimension} dims"
    )]
    DimensionMismatch {
        path: String,
        index_model: String,
        index_dimension: usize,
        dimension: usize,
    },

    #[error("Query must not be empty")]
    EmptyQuery,

    #[error("Stored record is malformed: {0}")]
    Corrupt(String),
}

impl IndexError {
    /// Errors caused by the caller's input rather than the index.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            IndexError::Identity(_) | IndexError::Filter(_) | IndexError::EmptyQuery
        )
    }
}

/// Result type for document index operations.
pub type IndexResult<T> = Result<T, IndexError>;
