//! Embedding generation and vector storage.

mod embedding;
mod similarity;
mod storage;
mod types;

pub use embedding::{
    EmbeddingGenerator, FastEmbedGenerator, HASHING_MODEL, HashingEmbedder,
    embedder_from_settings, model_to_string, parse_embedding_model,
};
pub use similarity::{cosine_similarity, normalize};
pub use storage::MmapVectorStorage;
pub use types::{VECTOR_DIMENSION_384, VectorDimension, VectorError};
