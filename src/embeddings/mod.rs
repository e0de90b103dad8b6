// Embeddings Module
//
// The embedding model is a collaborator outside this crate: anything that
// turns text into fixed-dimension vectors can back the index. The built-in
// HashEmbedder is deterministic and dependency-free, which is what offline
// indexing runs on and what the tests assert against.

pub mod vector_store;

use crate::errors::{Result, VestigeError};
use crate::extractors::CodeElement;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0100_0000_01b3;
const MIN_TOKEN_LEN: usize = 2;

/// Default dimensionality, matching the small sentence-embedding models the
/// index is normally paired with.
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Boundary trait for the embedding collaborator.
///
/// Implementations must be deterministic for identical input text; search
/// reproducibility depends on it.
pub trait TextEmbedder: Send + Sync {
    /// Dimensionality of every vector this embedder produces.
    fn dimensions(&self) -> usize;

    /// Identifier recorded for provenance.
    fn model_name(&self) -> &str;

    /// Embed one text into exactly `dimensions()` entries.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts. The default implementation loops.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Deterministic hashing embedder.
///
/// Tokenizes on non-alphanumeric boundaries, folds each token into a bucket
/// via FNV-1a with a sign bit, and L2-normalizes the result. No model
/// download, no inference runtime, identical output on every platform.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl TextEmbedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        "hash-fnv1a"
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if self.dimensions == 0 {
            return Err(VestigeError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }

        let mut vector = vec![0.0f32; self.dimensions];
        for token in tokenize(text) {
            let hash = fnv1a(token.as_bytes());
            let index = (hash % self.dimensions as u64) as usize;
            let sign = if (hash >> 63) == 1 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }

        l2_normalize(&mut vector);
        Ok(vector)
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.len() >= MIN_TOKEN_LEN)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

fn l2_normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}

/// Compose the text embedded for a code element.
///
/// Less noise gives a stronger signal in the limited dimensions, so this
/// stays minimal: name and kind, then documentation and content when
/// present.
pub fn build_element_text(element: &CodeElement) -> String {
    let mut parts = vec![element.name.clone(), element.kind.to_string()];

    if let Some(doc) = &element.doc_comment {
        parts.push(doc.clone());
    }
    if !element.content.is_empty() {
        parts.push(element.content.clone());
    }

    parts.join(" ")
}

/// Calculate cosine similarity between two embedding vectors
pub fn cosine_similarity(vec_a: &[f32], vec_b: &[f32]) -> f32 {
    if vec_a.len() != vec_b.len() {
        return 0.0;
    }

    let dot_product: f32 = vec_a.iter().zip(vec_b.iter()).map(|(a, b)| a * b).sum();
    let norm_a: f32 = vec_a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = vec_b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Similarity search result
#[derive(Debug, Clone)]
pub struct SimilarityResult {
    pub element_id: String,
    pub similarity_score: f32,
}
