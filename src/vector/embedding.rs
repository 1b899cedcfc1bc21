//! Embedding generators.
//!
//! [`FastEmbedGenerator`] runs a local sentence-transformer through fastembed.
//! [`HashingEmbedder`] is a model-free fallback that needs no download; it
//! captures lexical overlap only.

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use parking_lot::Mutex;

use super::similarity::normalize;
use super::types::{VectorDimension, VectorError};
use crate::config::SemanticSearchConfig;

/// Model name that selects [`HashingEmbedder`].
pub const HASHING_MODEL: &str = "hashing";

/// Turns text into fixed-size vectors.
pub trait EmbeddingGenerator: Send + Sync {
    /// Embed each text; output order matches input order.
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError>;

    fn dimension(&self) -> VectorDimension;

    /// Stable name recorded in the index manifest.
    fn model_name(&self) -> &str;
}

/// Parse a model name as written in settings.
pub fn parse_embedding_model(name: &str) -> Result<EmbeddingModel, VectorError> {
    match name {
        "AllMiniLML6V2" | "all-MiniLM-L6-v2" | "sentence-transformers/all-MiniLM-L6-v2" => {
            Ok(EmbeddingModel::AllMiniLML6V2)
        }
        "AllMiniLML12V2" | "all-MiniLM-L12-v2" => Ok(EmbeddingModel::AllMiniLML12V2),
        "BGESmallENV15" | "bge-small-en-v1.5" => Ok(EmbeddingModel::BGESmallENV15),
        "BGEBaseENV15" | "bge-base-en-v1.5" => Ok(EmbeddingModel::BGEBaseENV15),
        "MultilingualE5Small" | "multilingual-e5-small" => Ok(EmbeddingModel::MultilingualE5Small),
        "ParaphraseMLMiniLML12V2" | "paraphrase-multilingual-MiniLM-L12-v2" => {
            Ok(EmbeddingModel::ParaphraseMLMiniLML12V2)
        }
        other => Err(VectorError::UnknownModel(other.to_string())),
    }
}

/// Canonical settings name of a model.
pub fn model_to_string(model: &EmbeddingModel) -> String {
    match model {
        EmbeddingModel::AllMiniLML6V2 => "AllMiniLML6V2".to_string(),
        EmbeddingModel::AllMiniLML12V2 => "AllMiniLML12V2".to_string(),
        EmbeddingModel::BGESmallENV15 => "BGESmallENV15".to_string(),
        EmbeddingModel::BGEBaseENV15 => "BGEBaseENV15".to_string(),
        EmbeddingModel::MultilingualE5Small => "MultilingualE5Small".to_string(),
        EmbeddingModel::ParaphraseMLMiniLML12V2 => "ParaphraseMLMiniLML12V2".to_string(),
        other => format!("{other:?}"),
    }
}

/// Build the generator named by the semantic search settings.
pub fn embedder_from_settings(
    config: &SemanticSearchConfig,
) -> Result<Box<dyn EmbeddingGenerator>, VectorError> {
    if config.model.eq_ignore_ascii_case(HASHING_MODEL) {
        return Ok(Box::new(HashingEmbedder::default()));
    }
    Ok(Box::new(FastEmbedGenerator::from_settings(
        &config.model,
        config.show_download_progress,
    )?))
}

/// fastembed-backed sentence embeddings.
pub struct FastEmbedGenerator {
    /// fastembed needs `&mut` to embed
    model: Mutex<TextEmbedding>,
    dimension: VectorDimension,
    model_name: String,
}

impl FastEmbedGenerator {
    /// Load a model by its configured name, e.g. `AllMiniLML6V2`.
    pub fn from_settings(model_name: &str, show_progress: bool) -> Result<Self, VectorError> {
        Self::with_model(parse_embedding_model(model_name)?, show_progress)
    }

    pub fn with_model(model: EmbeddingModel, show_progress: bool) -> Result<Self, VectorError> {
        let model_name = model_to_string(&model);
        tracing::info!(target: "store", "[store] loading embedding model {model_name}");

        let mut text_model = TextEmbedding::try_new(
            InitOptions::new(model).with_show_download_progress(show_progress),
        )
        .map_err(|e| VectorError::ModelInit(e.to_string()))?;

        // Get dimensions by generating a test embedding
        let sample = text_model
            .embed(vec!["test"], None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;
        let dimension = sample
            .first()
            .map(Vec::len)
            .ok_or_else(|| VectorError::ModelInit("model returned no embedding".to_string()))?;

        Ok(Self {
            model: Mutex::new(text_model),
            dimension: VectorDimension::new(dimension)?,
            model_name,
        })
    }
}

impl EmbeddingGenerator for FastEmbedGenerator {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self
            .model
            .lock()
            .embed(texts.to_vec(), None)
            .map_err(|e| VectorError::EmbeddingFailed(e.to_string()))?;
        if embeddings.len() != texts.len() {
            return Err(VectorError::EmbeddingFailed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

/// Deterministic feature-hashing embedder.
///
/// Lower-cased word tokens and their character bigrams are hashed (FNV-1a)
/// into signed buckets; the result is L2-normalized.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: VectorDimension,
}

impl HashingEmbedder {
    pub fn new(dimension: VectorDimension) -> Self {
        Self { dimension }
    }

    pub fn embed(&self, text: &str) -> Vec<f32> {
        let dim = self.dimension.get();
        let mut vector = vec![0.0f32; dim];
        let lowered = text.to_lowercase();

        for word in lowered.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            add_feature(&mut vector, "w", word, 1.0);

            let chars: Vec<char> = word.chars().collect();
            for pair in chars.windows(2) {
                let bigram: String = pair.iter().collect();
                add_feature(&mut vector, "b", &bigram, 0.5);
            }
            if chars.len() == 1 {
                add_feature(&mut vector, "b", word, 0.5);
            }
        }

        normalize(&mut vector);
        vector
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(VectorDimension::dimension_384())
    }
}

fn add_feature(vector: &mut [f32], namespace: &str, feature: &str, weight: f32) {
    let hash = fnv1a(namespace.as_bytes(), feature.as_bytes());
    let bucket = (hash % vector.len() as u64) as usize;
    let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
    vector[bucket] += sign * weight;
}

fn fnv1a(namespace: &[u8], feature: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;
    namespace
        .iter()
        .chain(b":")
        .chain(feature)
        .fold(OFFSET, |hash, byte| (hash ^ u64::from(*byte)).wrapping_mul(PRIME))
}

impl EmbeddingGenerator for HashingEmbedder {
    fn generate_embeddings(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, VectorError> {
        Ok(texts.iter().map(|text| self.embed(text)).collect())
    }

    fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    fn model_name(&self) -> &str {
        HASHING_MODEL
    }
}
