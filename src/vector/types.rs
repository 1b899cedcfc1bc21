use std::fmt;
use thiserror::Error;

/// Dimension of the default sentence-transformer model.
pub const VECTOR_DIMENSION_384: usize = 384;

/// Errors from embedding generation and vector storage.
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Invalid vector dimension {dimension}: {reason}")]
    InvalidDimension { dimension: usize, reason: String },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt vector storage: {0}")]
    Corrupt(String),

    #[error("Failed to initialize embedding model: {0}")]
    ModelInit(String),

    #[error("Unknown embedding model: {0}")]
    UnknownModel(String),

    #[error("Failed to generate embeddings: {0}")]
    EmbeddingFailed(String),
}

/// Non-zero vector dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VectorDimension(usize);

impl VectorDimension {
    pub fn new(dimension: usize) -> Result<Self, VectorError> {
        if dimension == 0 {
            return Err(VectorError::InvalidDimension {
                dimension,
                reason: "dimension must be greater than zero".to_string(),
            });
        }
        if u32::try_from(dimension).is_err() {
            return Err(VectorError::InvalidDimension {
                dimension,
                reason: "dimension does not fit the storage header".to_string(),
            });
        }
        Ok(Self(dimension))
    }

    pub fn dimension_384() -> Self {
        Self(VECTOR_DIMENSION_384)
    }

    #[inline]
    pub fn get(&self) -> usize {
        self.0
    }

    /// Check that a vector has exactly this many components.
    pub fn validate_vector(&self, vector: &[f32]) -> Result<(), VectorError> {
        if vector.len() != self.0 {
            return Err(VectorError::DimensionMismatch {
                expected: self.0,
                actual: vector.len(),
            });
        }
        Ok(())
    }
}

impl Default for VectorDimension {
    fn default() -> Self {
        Self::dimension_384()
    }
}

impl fmt::Display for VectorDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
